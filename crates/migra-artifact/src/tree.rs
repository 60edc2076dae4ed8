//! Flat path list <-> file tree conversion
//!
//! Scaffold plans arrive as flat path lists; the generation phase works on
//! a tree whose file nodes are mutated in place.

use crate::error::ArtifactError;
use crate::node::{FileNode, NodeKind};
use crate::paths;
use std::collections::HashSet;

/// Build a tree from a flat list of file paths
///
/// Paths are normalized, intermediate directories are created, duplicates
/// collapse. Each level is sorted directories first, then by name.
pub fn build_tree<I, S>(flat: I) -> Vec<FileNode>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut roots = Vec::new();
    for raw in flat {
        let path = paths::normalize(raw.as_ref());
        if path.is_empty() {
            continue;
        }
        insert_file(&mut roots, &path);
    }
    sort_level(&mut roots);
    roots
}

fn insert_file(roots: &mut Vec<FileNode>, path: &str) {
    let segments: Vec<&str> = path.split('/').collect();
    let mut level = roots;
    let mut prefix = String::new();

    for (i, segment) in segments.iter().enumerate() {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        let is_leaf = i + 1 == segments.len();

        let idx = match level.iter().position(|n| n.name == *segment) {
            Some(idx) => idx,
            None => {
                level.push(if is_leaf {
                    FileNode::file(prefix.clone())
                } else {
                    FileNode::directory(prefix.clone())
                });
                level.len() - 1
            }
        };

        if is_leaf {
            return;
        }

        let node = &mut level[idx];
        if node.kind == NodeKind::File {
            // A file path reused as a directory prefix becomes a directory.
            node.kind = NodeKind::Directory;
            node.content = None;
        }
        level = node.children.get_or_insert_with(Vec::new);
    }
}

fn sort_level(nodes: &mut [FileNode]) {
    nodes.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.name.cmp(&b.name))
    });
    for node in nodes.iter_mut() {
        if let Some(children) = node.children.as_mut() {
            sort_level(children);
        }
    }
}

/// Depth-first list of file nodes
#[must_use]
pub fn flatten_files(tree: &[FileNode]) -> Vec<&FileNode> {
    let mut out = Vec::new();
    collect_files(tree, &mut out);
    out
}

fn collect_files<'a>(nodes: &'a [FileNode], out: &mut Vec<&'a FileNode>) {
    for node in nodes {
        match node.kind {
            NodeKind::File => out.push(node),
            NodeKind::Directory => collect_files(node.children(), out),
        }
    }
}

/// Depth-first list of mutable file nodes
pub fn flatten_files_mut(tree: &mut [FileNode]) -> Vec<&mut FileNode> {
    let mut out = Vec::new();
    collect_files_mut(tree, &mut out);
    out
}

fn collect_files_mut<'a>(nodes: &'a mut [FileNode], out: &mut Vec<&'a mut FileNode>) {
    for node in nodes {
        if node.kind == NodeKind::File {
            out.push(node);
        } else if let Some(children) = node.children.as_mut() {
            collect_files_mut(children, out);
        }
    }
}

/// Find a node by path
#[must_use]
pub fn find<'a>(tree: &'a [FileNode], path: &str) -> Option<&'a FileNode> {
    for node in tree {
        if node.path == path {
            return Some(node);
        }
        if is_ancestor(&node.path, path) {
            return find(node.children(), path);
        }
    }
    None
}

/// Find a node by path, mutably
pub fn find_mut<'a>(tree: &'a mut [FileNode], path: &str) -> Option<&'a mut FileNode> {
    for node in tree {
        if node.path == path {
            return Some(node);
        }
        if is_ancestor(&node.path, path) {
            return node
                .children
                .as_mut()
                .and_then(|children| find_mut(children, path));
        }
    }
    None
}

fn is_ancestor(dir: &str, path: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

/// Validate tree invariants
///
/// # Errors
/// - [`ArtifactError::InvalidPath`] for non-normalized paths
/// - [`ArtifactError::DuplicatePath`] when two nodes share a path
/// - [`ArtifactError::MissingParent`] when a non-root path has no parent node
/// - [`ArtifactError::FileWithChildren`] when a file carries children
pub fn validate_tree(tree: &[FileNode]) -> Result<(), ArtifactError> {
    let mut seen = HashSet::new();
    let mut directories = HashSet::new();
    let mut stack: Vec<&FileNode> = tree.iter().collect();
    let mut all = Vec::new();

    while let Some(node) = stack.pop() {
        if node.path.is_empty() {
            return Err(ArtifactError::EmptyPath);
        }
        if paths::normalize(&node.path) != node.path {
            return Err(ArtifactError::InvalidPath(node.path.clone()));
        }
        if !seen.insert(node.path.as_str()) {
            return Err(ArtifactError::DuplicatePath(node.path.clone()));
        }
        match node.kind {
            NodeKind::Directory => {
                directories.insert(node.path.as_str());
                stack.extend(node.children());
            }
            NodeKind::File => {
                if !node.children().is_empty() {
                    return Err(ArtifactError::FileWithChildren(node.path.clone()));
                }
            }
        }
        all.push(node);
    }

    for node in all {
        if let Some(parent) = paths::parent(&node.path) {
            if !directories.contains(parent) {
                return Err(ArtifactError::MissingParent {
                    path: node.path.clone(),
                    parent: parent.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn builds_intermediate_directories() {
        let tree = build_tree(["src/components/Header.tsx", "src/app.tsx"]);
        assert_eq!(tree.len(), 1);
        let src = &tree[0];
        assert_eq!(src.path, "src");
        assert!(src.is_directory());
        assert_eq!(src.children()[0].path, "src/components");
        assert_eq!(src.children()[1].path, "src/app.tsx");
        assert!(validate_tree(&tree).is_ok());
    }

    #[test]
    fn duplicates_collapse() {
        let tree = build_tree(["a/b.ts", "./a/b.ts", "a//b.ts"]);
        assert_eq!(flatten_files(&tree).len(), 1);
    }

    #[test]
    fn find_nested_node() {
        let mut tree = build_tree(["src/lib/db.ts", "src/libs/x.ts"]);
        assert!(find(&tree, "src/lib/db.ts").is_some());
        assert!(find(&tree, "src/libs/x.ts").is_some());
        assert!(find(&tree, "src/lib/none.ts").is_none());

        find_mut(&mut tree, "src/lib/db.ts").unwrap().content = Some("x".into());
        assert_eq!(find(&tree, "src/lib/db.ts").unwrap().content_str(), "x");
    }

    #[test]
    fn validate_detects_missing_parent() {
        let tree = vec![FileNode::file("src/orphan.ts")];
        assert!(matches!(
            validate_tree(&tree),
            Err(ArtifactError::MissingParent { .. })
        ));
    }

    #[test]
    fn validate_detects_duplicates() {
        let tree = vec![FileNode::file("a.ts"), FileNode::file("a.ts")];
        assert_eq!(
            validate_tree(&tree),
            Err(ArtifactError::DuplicatePath("a.ts".to_string()))
        );
    }

    #[test]
    fn flatten_mut_updates_in_place() {
        let mut tree = build_tree(["x/a.ts", "x/b.ts"]);
        for node in flatten_files_mut(&mut tree) {
            node.content = Some(node.name.clone());
        }
        assert_eq!(find(&tree, "x/b.ts").unwrap().content_str(), "b.ts");
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        (
            prop::collection::vec("[a-z]{1,4}", 0..3),
            "[a-z]{1,6}",
            prop::sample::select(vec!["ts", "tsx", "js", "json"]),
        )
            .prop_map(|(dirs, stem, ext)| {
                let mut parts = dirs;
                parts.push(format!("{stem}.{ext}"));
                parts.join("/")
            })
    }

    proptest! {
        #[test]
        fn tree_round_trip(paths in prop::collection::vec(path_strategy(), 0..24)) {
            let tree = build_tree(&paths);
            prop_assert!(validate_tree(&tree).is_ok());

            let flat: Vec<&str> = flatten_files(&tree).into_iter().map(|n| n.path.as_str()).collect();
            let unique: BTreeSet<&str> = flat.iter().copied().collect();
            prop_assert_eq!(unique.len(), flat.len());

            let expected: BTreeSet<&str> = paths.iter().map(String::as_str).collect();
            prop_assert_eq!(unique, expected);
        }
    }
}
