//! Import target lookup
//!
//! Graph keys are canonical file paths; import targets are patterns that
//! match a key by exact path, by an appended known extension, or as a
//! directory containing an index file.

/// Extensions tried when an import target has none
pub const KNOWN_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "vue", "svelte", "json", "css", "scss",
];

/// Stem of directory index files
pub const INDEX_STEM: &str = "index";

/// Candidate concrete paths for an import target, in lookup order
#[must_use]
pub fn candidate_paths(target: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(1 + KNOWN_EXTENSIONS.len() * 2);
    out.push(target.to_string());
    out.extend(KNOWN_EXTENSIONS.iter().map(|ext| format!("{target}.{ext}")));
    out.extend(
        KNOWN_EXTENSIONS
            .iter()
            .map(|ext| format!("{target}/{INDEX_STEM}.{ext}")),
    );
    out
}

/// First candidate path accepted by `exists`
pub fn resolve_target<F>(target: &str, exists: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    if target.is_empty() {
        return None;
    }
    candidate_paths(target).into_iter().find(|c| exists(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn keys(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_wins() {
        let known = keys(&["src/utils", "src/utils.js"]);
        assert_eq!(
            resolve_target("src/utils", |p| known.contains(p)).as_deref(),
            Some("src/utils")
        );
    }

    #[test]
    fn appended_extension() {
        let known = keys(&["src/utils.ts"]);
        assert_eq!(
            resolve_target("src/utils", |p| known.contains(p)).as_deref(),
            Some("src/utils.ts")
        );
    }

    #[test]
    fn directory_index() {
        let known = keys(&["src/components/index.tsx"]);
        assert_eq!(
            resolve_target("src/components", |p| known.contains(p)).as_deref(),
            Some("src/components/index.tsx")
        );
    }

    #[test]
    fn unknown_target() {
        let known = keys(&["a.ts"]);
        assert!(resolve_target("b", |p| known.contains(p)).is_none());
        assert!(resolve_target("", |_| true).is_none());
    }
}
