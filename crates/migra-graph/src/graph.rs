//! File dependency graph
//!
//! Provides [`DependencyGraph`]: path -> ordered list of resolved relative
//! import paths. Built once per phase from a fixed snapshot of contents and
//! immutable afterwards.

use crate::imports::{ImportScanner, RegexImportScanner};
use crate::lookup;
use indexmap::IndexMap;
use migra_artifact::paths;
use std::collections::{HashSet, VecDeque};

/// Directed file-to-file dependency graph
///
/// Keys are exactly the files that had non-empty content at build time.
/// Import targets are resolved to repo-relative paths with no `.`/`..`
/// segments but are not matched to keys; use [`DependencyGraph::resolve`]
/// for that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: IndexMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build with the default regex scanner
    pub fn build<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        Self::build_with(&RegexImportScanner, files)
    }

    /// Build with a custom import scanner
    pub fn build_with<S, I, P, C>(scanner: &S, files: I) -> Self
    where
        S: ImportScanner + ?Sized,
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut edges = IndexMap::new();
        for (path, content) in files {
            let path = paths::normalize(path.as_ref());
            let content = content.as_ref();
            if path.is_empty() || content.trim().is_empty() {
                continue;
            }

            let mut targets: Vec<String> = Vec::new();
            for spec in scanner.scan(&path, content) {
                if !paths::is_relative_specifier(&spec) {
                    continue;
                }
                let resolved = paths::resolve_relative(&path, &spec);
                if !resolved.is_empty() && resolved != path && !targets.contains(&resolved) {
                    targets.push(resolved);
                }
            }
            edges.insert(path, targets);
        }

        let graph = Self { edges };
        tracing::debug!(
            "Built dependency graph: {} files, {} edges",
            graph.len(),
            graph.edge_count()
        );
        graph
    }

    /// Number of files (keys)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Check if graph has no files
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Total number of import edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Check if a path is a key
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.edges.contains_key(path)
    }

    /// Keys in build order
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// (path, imports) pairs in build order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.edges.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Resolved import targets of a file (empty if not a key)
    #[inline]
    #[must_use]
    pub fn dependencies(&self, path: &str) -> &[String] {
        self.edges.get(path).map_or(&[], Vec::as_slice)
    }

    /// Match an import target (or any path) to a canonical key
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<&str> {
        let found = lookup::resolve_target(target, |candidate| self.contains(candidate))?;
        self.edges.get_key_value(found.as_str()).map(|(k, _)| k.as_str())
    }

    /// Direct dependencies matched to keys where possible
    ///
    /// Targets with no matching key are kept as best-effort paths.
    #[must_use]
    pub fn resolved_dependencies(&self, path: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for target in self.dependencies(path) {
            let resolved = self.resolve(target).unwrap_or(target).to_string();
            if !out.contains(&resolved) {
                out.push(resolved);
            }
        }
        out
    }

    /// Bounded breadth-first set of related files
    ///
    /// Returns up to `limit` distinct paths reachable from `start`, in
    /// discovery order, never including `start` itself. Targets without a
    /// matching key are reported but not expanded.
    #[must_use]
    pub fn related_files(&self, start: &str, limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        if limit == 0 {
            return out;
        }
        let Some(start) = self.resolve(start) else {
            return out;
        };

        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut queue: VecDeque<&str> = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for target in self.dependencies(current) {
                let key = self.resolve(target);
                let related = key.unwrap_or(target.as_str());
                if !visited.insert(related) {
                    continue;
                }
                out.push(related.to_string());
                if out.len() >= limit {
                    return out;
                }
                if let Some(key) = key {
                    queue.push_back(key);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn scenario_graph() -> DependencyGraph {
        DependencyGraph::build([
            (
                "src/app.js",
                "import utils from './utils';\nimport Header from './components/Header';",
            ),
            ("src/utils.js", "import { LIMIT } from './constants';"),
            ("src/components/Header.js", "export default function Header() {}"),
            ("src/constants.js", "export const LIMIT = 10;"),
        ])
    }

    #[test]
    fn related_files_walks_transitively() {
        let graph = scenario_graph();
        let related = graph.related_files("src/app.js", 10);
        assert!(related.contains(&"src/utils.js".to_string()));
        assert!(related.contains(&"src/components/Header.js".to_string()));
        assert!(related.contains(&"src/constants.js".to_string()));
        assert_eq!(related.len(), 3);
    }

    #[test]
    fn related_files_respects_limit() {
        let graph = scenario_graph();
        assert_eq!(graph.related_files("src/app.js", 1).len(), 1);
        assert!(graph.related_files("src/app.js", 0).is_empty());
    }

    #[test]
    fn related_files_never_includes_start() {
        let graph = DependencyGraph::build([
            ("a.js", "import b from './b';"),
            ("b.js", "import a from './a';"),
        ]);
        assert_eq!(graph.related_files("a.js", 10), vec!["b.js".to_string()]);
    }

    #[test]
    fn unresolved_targets_are_reported_not_expanded() {
        let graph = DependencyGraph::build([("src/a.js", "import x from './missing';")]);
        assert_eq!(graph.related_files("src/a.js", 5), vec!["src/missing".to_string()]);
    }

    #[test]
    fn empty_files_are_not_keys() {
        let graph = DependencyGraph::build([("a.js", "   "), ("b.js", "const b = 1;")]);
        assert!(!graph.contains("a.js"));
        assert!(graph.contains("b.js"));
    }

    #[test]
    fn parent_relative_imports_resolve() {
        let graph = DependencyGraph::build([(
            "src/pages/home.js",
            "import h from '../components/Header';\nimport s from './../styles/x.css';",
        )]);
        assert_eq!(
            graph.dependencies("src/pages/home.js"),
            &["src/components/Header".to_string(), "src/styles/x.css".to_string()]
        );
    }

    #[test]
    fn resolved_dependencies_use_keys() {
        let graph = scenario_graph();
        assert_eq!(
            graph.resolved_dependencies("src/app.js"),
            vec!["src/utils.js".to_string(), "src/components/Header.js".to_string()]
        );
    }

    fn file_strategy() -> impl Strategy<Value = (String, String)> {
        let name = prop::collection::vec("[a-c]{1,2}", 1..4).prop_map(|s| s.join("/") + ".js");
        let import = prop::sample::select(vec!["./", "../", "../../", "./x/../"])
            .prop_flat_map(|prefix| "[a-c]{1,2}".prop_map(move |n| format!("{prefix}{n}")));
        let body = prop::collection::vec(import, 0..4).prop_map(|specs| {
            specs
                .iter()
                .map(|s| format!("import v from '{s}';"))
                .collect::<Vec<_>>()
                .join("\n")
        });
        (name, body)
    }

    proptest! {
        #[test]
        fn keys_are_non_empty_files_and_targets_are_normalized(
            files in prop::collection::vec(file_strategy(), 0..12)
        ) {
            let graph = DependencyGraph::build(files.iter().map(|(p, c)| (p.as_str(), c.as_str())));

            let expected: HashSet<&str> = files
                .iter()
                .filter(|(_, c)| !c.trim().is_empty())
                .map(|(p, _)| p.as_str())
                .collect();
            let keys: HashSet<&str> = graph.keys().collect();
            prop_assert_eq!(keys, expected);

            for (_, targets) in graph.iter() {
                for target in targets {
                    prop_assert!(target.split('/').all(|seg| seg != "." && seg != ".." && !seg.is_empty()));
                }
            }
        }
    }
}
