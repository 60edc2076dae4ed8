//! Slash-delimited, root-relative path helpers
//!
//! All paths in a migration are repository-relative strings using `/` as the
//! separator, regardless of host platform. These helpers never touch the
//! filesystem.

use std::collections::BTreeSet;

/// Normalize a path: drop empty and `.` segments, fold `..` segments
///
/// A `..` that would climb above the root is dropped.
///
/// # Examples
/// - `./src//app.js` -> `src/app.js`
/// - `src/lib/../utils` -> `src/utils`
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Parent path, `None` for root-level entries
#[inline]
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Directory part of a path, empty for root-level entries
#[inline]
#[must_use]
pub fn dirname(path: &str) -> &str {
    parent(path).unwrap_or("")
}

/// Last segment of a path
#[inline]
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension of the last segment, without the dot
///
/// Dot-files such as `.env` have no extension.
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Path with the extension of its last segment removed
#[must_use]
pub fn strip_extension(path: &str) -> &str {
    match extension(path) {
        Some(ext) => &path[..path.len() - ext.len() - 1],
        None => path,
    }
}

/// Extension-stripped last segment
#[inline]
#[must_use]
pub fn file_stem(path: &str) -> &str {
    strip_extension(file_name(path))
}

/// Join a directory and a relative path, then normalize
#[must_use]
pub fn join(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        normalize(rel)
    } else {
        normalize(&format!("{dir}/{rel}"))
    }
}

/// Whether an import specifier is relative (`./` or `../`)
#[inline]
#[must_use]
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolve a relative specifier against the importing file's directory
///
/// The result never contains `.` or `..` segments.
#[inline]
#[must_use]
pub fn resolve_relative(from_file: &str, specifier: &str) -> String {
    join(dirname(from_file), specifier)
}

/// Whether `path` ends with `suffix` on a segment boundary
///
/// `src/lib/utils` ends with `lib/utils` and `utils`, but not with `tils`.
#[must_use]
pub fn ends_with_segments(path: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    if path == suffix {
        return true;
    }
    path.len() > suffix.len()
        && path.ends_with(suffix)
        && path.as_bytes()[path.len() - suffix.len() - 1] == b'/'
}

/// Lower-cased path tokens, split on `/`, `_`, `.` and `-`
#[must_use]
pub fn tokens(path: &str) -> BTreeSet<String> {
    path.split(['/', '_', '.', '-'])
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Directory segments of a path (the file name excluded)
#[inline]
pub fn dir_segments(path: &str) -> impl Iterator<Item = &str> {
    dirname(path).split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_dot_segments() {
        assert_eq!(normalize("./src//app.js"), "src/app.js");
        assert_eq!(normalize("src/lib/../utils"), "src/utils");
        assert_eq!(normalize("../../outside"), "outside");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn parent_and_dirname() {
        assert_eq!(parent("src/app.js"), Some("src"));
        assert_eq!(parent("app.js"), None);
        assert_eq!(dirname("app.js"), "");
    }

    #[test]
    fn extension_handling() {
        assert_eq!(extension("src/app.test.ts"), Some("ts"));
        assert_eq!(extension(".env"), None);
        assert_eq!(extension("src/utils"), None);
        assert_eq!(strip_extension("src/app.test.ts"), "src/app.test");
        assert_eq!(strip_extension("src.v2/utils"), "src.v2/utils");
        assert_eq!(file_stem("src/components/Header.tsx"), "Header");
    }

    #[test]
    fn resolve_relative_specifiers() {
        assert_eq!(resolve_relative("src/app.js", "./utils"), "src/utils");
        assert_eq!(
            resolve_relative("src/pages/home.js", "../components/Header"),
            "src/components/Header"
        );
        assert_eq!(resolve_relative("app.js", "./lib/db"), "lib/db");
    }

    #[test]
    fn relative_specifier_detection() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../a"));
        assert!(!is_relative_specifier("react"));
        assert!(!is_relative_specifier("@/lib/a"));
    }

    #[test]
    fn segment_suffix() {
        assert!(ends_with_segments("src/lib/utils", "lib/utils"));
        assert!(ends_with_segments("src/lib/utils", "utils"));
        assert!(!ends_with_segments("src/lib/utils", "tils"));
        assert!(ends_with_segments("utils", "utils"));
        assert!(!ends_with_segments("utils", ""));
    }

    #[test]
    fn tokenize_path() {
        let t = tokens("src/user-profile/User_Card.tsx");
        let expected: BTreeSet<String> = ["src", "user", "profile", "card", "tsx"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(t, expected);
    }
}
