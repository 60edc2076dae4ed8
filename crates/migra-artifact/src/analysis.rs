//! Analysis, matching and reporting types
//!
//! - [`AnalysisResult`]: produced once per run by the analysis phase
//! - [`SemanticMatch`]: target file -> legacy source association
//! - [`GenerationProgress`]: per-run progress counter
//! - [`VerificationResult`]: outcome of the verification loop

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Complexity tier of a legacy project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Complexity {
    /// Small, conventional project
    #[serde(alias = "low", alias = "LOW")]
    Low,
    /// Neutral default
    #[default]
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    /// Large or unconventional project
    #[serde(alias = "high", alias = "HIGH")]
    High,
}

impl Complexity {
    /// Parse a free-form label, falling back to `Medium`
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" | "simple" => Self::Low,
            "high" | "complex" => Self::High,
            _ => Self::Medium,
        }
    }
}

/// Explicit source -> target mapping hint from the analysis call
///
/// Paths are patterns: they may be extension-less or contain `*` wildcards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitMapping {
    /// Legacy path pattern
    pub source_path: String,
    /// Target path pattern
    pub target_path: String,
    /// Why the files correspond
    #[serde(default)]
    pub rationale: String,
    /// Declared confidence (0.0 - 1.0)
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ExplicitMapping {
    /// Confidence used when the hint does not declare one
    pub const DEFAULT_CONFIDENCE: f64 = 0.8;

    /// Create a mapping hint
    #[inline]
    #[must_use]
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            rationale: String::new(),
            confidence: None,
        }
    }

    /// With confidence
    #[inline]
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Declared confidence clamped to [0, 1], or the default
    #[inline]
    #[must_use]
    pub fn effective_confidence(&self) -> f64 {
        match self.confidence {
            Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
            _ => Self::DEFAULT_CONFIDENCE,
        }
    }
}

/// Result of the analysis phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    /// Human-readable summary
    pub summary: String,
    /// Complexity tier
    pub complexity: Complexity,
    /// Notable third-party dependencies
    pub dependencies: Vec<String>,
    /// Architectural patterns in use
    pub patterns: Vec<String>,
    /// Migration risks
    pub risks: Vec<String>,
    /// Detected legacy framework
    #[serde(alias = "detectedFramework")]
    pub source_framework: String,
    /// Recommended target stack
    pub recommended_target: String,
    /// Architecture description
    pub architecture: String,
    /// Explicit mapping hints
    #[serde(alias = "fileMappings")]
    pub mappings: Vec<ExplicitMapping>,
    /// Free-form migration notes
    pub migration_notes: Option<String>,
}

impl AnalysisResult {
    /// Create an analysis with a summary only
    #[inline]
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// With mapping hints
    #[inline]
    #[must_use]
    pub fn with_mappings(mut self, mappings: Vec<ExplicitMapping>) -> Self {
        self.mappings = mappings;
        self
    }
}

/// Association between a target file and legacy sources
///
/// Invariant: `primary_source_path`, when present, is a member of
/// `source_paths`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticMatch {
    /// Most relevant source
    pub primary_source_path: Option<String>,
    /// All relevant sources
    pub source_paths: BTreeSet<String>,
    /// Confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl SemanticMatch {
    /// Match with no sources
    #[inline]
    #[must_use]
    pub fn unmatched() -> Self {
        Self::default()
    }

    /// Match with a single primary source
    #[inline]
    #[must_use]
    pub fn with_primary(source: impl Into<String>, confidence: f64) -> Self {
        let source = source.into();
        Self {
            source_paths: BTreeSet::from([source.clone()]),
            primary_source_path: Some(source),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Check if any source is associated
    #[inline]
    #[must_use]
    pub fn is_matched(&self) -> bool {
        !self.source_paths.is_empty()
    }

    /// Check the primary-membership invariant
    #[inline]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.primary_source_path
            .as_ref()
            .map_or(true, |p| self.source_paths.contains(p))
    }

    /// Sources with the primary first, the rest in path order
    pub fn ordered_sources(&self) -> impl Iterator<Item = &str> {
        let primary = self.primary_source_path.as_deref();
        primary.into_iter().chain(
            self.source_paths
                .iter()
                .map(String::as_str)
                .filter(move |s| Some(*s) != primary),
        )
    }
}

/// Generation progress counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    /// Files processed so far
    pub current: usize,
    /// Files scheduled
    pub total: usize,
    /// File currently being processed
    pub current_file: String,
}

impl GenerationProgress {
    /// Fresh counter for a generation phase
    #[inline]
    #[must_use]
    pub fn start(total: usize) -> Self {
        Self {
            current: 0,
            total,
            current_file: String::new(),
        }
    }

    /// Mark a file as the one being processed
    #[inline]
    pub fn begin(&mut self, file: impl Into<String>) {
        self.current_file = file.into();
    }

    /// Count the current file as processed
    #[inline]
    pub fn complete(&mut self) {
        self.current = (self.current + 1).min(self.total);
    }
}

/// Outcome of the verification loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Final verdict
    pub passed: bool,
    /// Every issue seen across passes, duplicates collapsed
    pub issues: Vec<String>,
    /// Issues that decided a failing verdict
    pub unresolved: Vec<String>,
    /// Total file contents replaced by the loop
    pub fixed_files_applied: usize,
    /// Passes executed
    pub passes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_from_label() {
        assert_eq!(Complexity::from_label(" HIGH "), Complexity::High);
        assert_eq!(Complexity::from_label("low"), Complexity::Low);
        assert_eq!(Complexity::from_label("unknown"), Complexity::Medium);
    }

    #[test]
    fn mapping_confidence_defaults_and_clamps() {
        let m = ExplicitMapping::new("a.js", "a.ts");
        assert_eq!(m.effective_confidence(), ExplicitMapping::DEFAULT_CONFIDENCE);
        assert_eq!(m.clone().with_confidence(1.7).effective_confidence(), 1.0);
        assert_eq!(m.with_confidence(f64::NAN).effective_confidence(), 0.8);
    }

    #[test]
    fn analysis_deserializes_with_defaults() {
        let json = r#"{"summary":"legacy app","complexity":"high","detectedFramework":"jquery"}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.complexity, Complexity::High);
        assert_eq!(result.source_framework, "jquery");
        assert!(result.mappings.is_empty());
    }

    #[test]
    fn ordered_sources_primary_first() {
        let mut m = SemanticMatch::with_primary("z.js", 0.9);
        m.source_paths.insert("a.js".to_string());
        let order: Vec<&str> = m.ordered_sources().collect();
        assert_eq!(order, vec!["z.js", "a.js"]);
    }

    #[test]
    fn progress_is_monotonic_and_bounded() {
        let mut p = GenerationProgress::start(2);
        p.begin("a.ts");
        p.complete();
        p.complete();
        p.complete();
        assert_eq!(p.current, 2);
        assert_eq!(p.current_file, "a.ts");
    }
}
