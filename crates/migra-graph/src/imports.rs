//! Import specifier scanning
//!
//! Pattern-based approximation of "which files does this file reference".
//! Recognized forms:
//!
//! ```text
//! import x from './a'        import './side-effect'
//! export { y } from '../b'   const c = require('./c')
//! await import('./d')        @import './theme.css';
//! ```

use migra_artifact::paths;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static IMPORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"\bimport\s+(?:[^'";]*?\s*from\s*)?['"]([^'"\n]+)['"]"#,
        r#"\bexport\s+[^'";]*?\s*from\s*['"]([^'"\n]+)['"]"#,
        r#"\brequire\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#,
        r#"\bimport\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#,
        r#"@import\s+(?:url\(\s*)?['"]([^'"\n]+)['"]"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Scanner trait for import discovery
///
/// Implement this to replace the regex approximation with a real parser for
/// a source dialect without changing graph consumers.
pub trait ImportScanner: Send + Sync {
    /// Import specifiers in first-occurrence order, duplicates collapsed
    fn scan(&self, path: &str, content: &str) -> Vec<String>;
}

/// Default regex-based scanner
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexImportScanner;

impl ImportScanner for RegexImportScanner {
    fn scan(&self, _path: &str, content: &str) -> Vec<String> {
        scan_imports(content)
    }
}

/// All import specifiers in a file, first-occurrence order
#[must_use]
pub fn scan_imports(content: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    for pattern in IMPORT_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str()));
            }
        }
    }
    found.sort_by_key(|(offset, _)| *offset);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .map(|(_, spec)| spec.trim())
        .filter(|spec| !spec.is_empty() && seen.insert(*spec))
        .map(str::to_string)
        .collect()
}

/// Relative (`./`, `../`) import specifiers only
#[must_use]
pub fn relative_imports(content: &str) -> Vec<String> {
    scan_imports(content)
        .into_iter()
        .filter(|spec| paths::is_relative_specifier(spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scans_es_module_forms() {
        let src = r#"
import React from 'react';
import { a,
  b } from "./lib/ab";
import './styles.css';
export * from '../shared/types';
"#;
        assert_eq!(
            scan_imports(src),
            vec!["react", "./lib/ab", "./styles.css", "../shared/types"]
        );
    }

    #[test]
    fn scans_require_and_dynamic_import() {
        let src = r#"
const db = require('./db');
const lazy = () => import("./pages/Lazy");
"#;
        assert_eq!(scan_imports(src), vec!["./db", "./pages/Lazy"]);
    }

    #[test]
    fn scans_css_import() {
        assert_eq!(scan_imports("@import './theme.css';"), vec!["./theme.css"]);
    }

    #[test]
    fn duplicates_collapse_in_order() {
        let src = "import a from './a';\nconst a2 = require('./a');\nimport b from './b';";
        assert_eq!(relative_imports(src), vec!["./a", "./b"]);
    }

    #[test]
    fn relative_filter_ignores_packages() {
        let src = "import x from 'lodash';\nimport y from '@/alias';\nimport z from '../z';";
        assert_eq!(relative_imports(src), vec!["../z"]);
    }

    #[test]
    fn scanner_trait_delegates() {
        let scanner = RegexImportScanner;
        assert_eq!(scanner.scan("a.js", "import './x';"), vec!["./x"]);
    }
}
