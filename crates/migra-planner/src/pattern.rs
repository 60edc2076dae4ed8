//! Path patterns for explicit mapping hints
//!
//! Analysis output names files loosely: `app.js`, `src/app`, `pages/*.jsx`.
//! [`PathPattern`] resolves such a hint against a concrete candidate list.

use migra_artifact::paths;
use regex::Regex;

/// Compiled mapping pattern
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Literal path, matched by equality, segment suffix or basename
    Literal(String),
    /// Glob with `*` wildcards, anchored at both ends
    Glob(Regex),
}

impl PathPattern {
    /// Compile a raw pattern
    ///
    /// A pattern containing `*` becomes a glob where every other character is
    /// literal; anything else is a normalized literal path.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('*') {
            let body = raw
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            if let Ok(re) = Regex::new(&format!("^{body}$")) {
                return Self::Glob(re);
            }
        }
        Self::Literal(paths::normalize(raw))
    }

    /// Check a candidate path against this pattern
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Glob(re) => re.is_match(candidate),
            Self::Literal(pattern) => literal_match(pattern, candidate),
        }
    }

    /// Candidates matched by this pattern, in input order
    pub fn resolve<'a, I>(&self, candidates: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().filter(|c| self.matches(c)).collect()
    }
}

fn literal_match(pattern: &str, candidate: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if pattern == candidate {
        return true;
    }
    let stripped_pattern = paths::strip_extension(pattern);
    let stripped_candidate = paths::strip_extension(candidate);
    if paths::ends_with_segments(stripped_candidate, stripped_pattern) {
        return true;
    }
    if paths::ends_with_segments(candidate, pattern) {
        return true;
    }
    paths::file_stem(pattern) == paths::file_stem(candidate)
}
