//! Semantic file mapper
//!
//! Associates every scaffolded target path with the legacy source files it
//! should be generated from. Two passes:
//!
//! 1. Explicit mapping hints from analysis, resolved through [`PathPattern`]
//! 2. Path-similarity fallback for targets the hints did not cover

use crate::pattern::PathPattern;
use crate::priority::is_api_path;
use indexmap::IndexMap;
use migra_artifact::{paths, ExplicitMapping, SemanticMatch};
use std::collections::{BTreeMap, BTreeSet};

/// Minimum fallback score for a candidate to be accepted
pub const FALLBACK_THRESHOLD: f64 = 0.18;

/// Bonus when extension-stripped basenames match exactly
pub const BASENAME_BONUS: f64 = 0.35;

/// Bonus when both paths agree on living under an API-like directory
pub const API_BONUS: f64 = 0.05;

/// Target -> match table, ordered by target path
pub type MatchTable = BTreeMap<String, SemanticMatch>;

/// Semantic file mapper
#[derive(Debug, Clone)]
pub struct SemanticFileMapper {
    threshold: f64,
}

impl Default for SemanticFileMapper {
    fn default() -> Self {
        Self {
            threshold: FALLBACK_THRESHOLD,
        }
    }
}

/// Explicit-pass accumulator for one target
#[derive(Default)]
struct ExplicitState<'a> {
    scores: IndexMap<&'a str, f64>,
    confidence: f64,
}

impl SemanticFileMapper {
    /// Mapper with the default fallback threshold
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the fallback acceptance threshold
    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Fallback acceptance threshold
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Map every target to its legacy sources
    ///
    /// The result has exactly one entry per distinct target. Running it again
    /// on the same inputs yields the same table.
    #[must_use]
    pub fn map<T, S>(&self, targets: &[T], sources: &[S], mappings: &[ExplicitMapping]) -> MatchTable
    where
        T: AsRef<str>,
        S: AsRef<str>,
    {
        let targets: BTreeSet<&str> = targets.iter().map(AsRef::as_ref).collect();
        let sources: BTreeSet<&str> = sources.iter().map(AsRef::as_ref).collect();

        let explicit = Self::explicit_pass(&targets, &sources, mappings);

        let mut table = MatchTable::new();
        let mut fallback = 0usize;
        for target in &targets {
            let matched = match explicit.get(target) {
                Some(state) => state.to_match(),
                None => {
                    let found = self.best_candidate(target, &sources);
                    if found.is_matched() {
                        fallback += 1;
                    }
                    found
                }
            };
            table.insert((*target).to_string(), matched);
        }

        tracing::debug!(
            "Mapped {} targets: {} explicit, {} by similarity, {} unmatched",
            table.len(),
            explicit.len(),
            fallback,
            table.values().filter(|m| !m.is_matched()).count()
        );
        table
    }

    fn explicit_pass<'a>(
        targets: &BTreeSet<&'a str>,
        sources: &BTreeSet<&'a str>,
        mappings: &[ExplicitMapping],
    ) -> BTreeMap<&'a str, ExplicitState<'a>> {
        let mut states: BTreeMap<&str, ExplicitState<'_>> = BTreeMap::new();
        for mapping in mappings {
            let matched_sources = PathPattern::new(&mapping.source_path).resolve(sources.iter().copied());
            if matched_sources.is_empty() {
                continue;
            }
            let matched_targets = PathPattern::new(&mapping.target_path).resolve(targets.iter().copied());
            let confidence = mapping.effective_confidence();

            for target in matched_targets {
                let state = states.entry(target).or_default();
                for &source in &matched_sources {
                    let score = state.scores.entry(source).or_insert(confidence);
                    if confidence > *score {
                        *score = confidence;
                    }
                }
                if confidence >= state.confidence {
                    state.confidence = confidence;
                }
            }
        }
        states
    }

    fn best_candidate(&self, target: &str, sources: &BTreeSet<&str>) -> SemanticMatch {
        // BTreeSet iteration is lexicographic; strict `>` keeps the smallest on ties
        let mut best: Option<(&str, f64)> = None;
        for &source in sources {
            let score = similarity(target, source);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((source, score));
            }
        }
        match best {
            Some((source, score)) if score >= self.threshold => {
                SemanticMatch::with_primary(source, score.min(1.0))
            }
            _ => SemanticMatch::unmatched(),
        }
    }
}

impl ExplicitState<'_> {
    fn to_match(&self) -> SemanticMatch {
        let mut primary: Option<(&str, f64)> = None;
        for (&source, &score) in &self.scores {
            if primary.map_or(true, |(_, best)| score > best) {
                primary = Some((source, score));
            }
        }
        SemanticMatch {
            primary_source_path: primary.map(|(p, _)| p.to_string()),
            source_paths: self.scores.keys().map(|s| (*s).to_string()).collect(),
            confidence: self.confidence.clamp(0.0, 1.0),
        }
    }
}

/// Fallback similarity score between a target and a source path
///
/// Jaccard similarity of lower-cased path tokens, plus [`BASENAME_BONUS`]
/// for equal extension-stripped basenames, plus [`API_BONUS`] when both or
/// neither live under an API-like directory.
#[must_use]
pub fn similarity(target: &str, source: &str) -> f64 {
    let a = paths::tokens(target);
    let b = paths::tokens(source);
    let union = a.union(&b).count();
    #[allow(clippy::cast_precision_loss)]
    let mut score = if union == 0 {
        0.0
    } else {
        a.intersection(&b).count() as f64 / union as f64
    };
    if paths::file_stem(target) == paths::file_stem(source) {
        score += BASENAME_BONUS;
    }
    if is_api_path(target) == is_api_path(source) {
        score += API_BONUS;
    }
    score
}
