//! Migration configuration
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! [models]
//! analysis = "gemini-2.5-pro"
//!
//! [retry]
//! maxRetries = 5
//!
//! [scope]
//! include = ["src/**"]
//! ```

use crate::error::ConfigError;
use migra_artifact::paths;
use migra_planner::{ContextLimits, PathPattern, FALLBACK_THRESHOLD};
use migra_remote::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model identifiers per remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    /// Analysis call
    pub analysis: String,
    /// Scaffold structure call
    pub structure: String,
    /// Per-file generation
    pub generation: String,
    /// Verification passes
    pub verification: String,
    /// Architecture diagram
    pub diagram: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            analysis: "gemini-2.5-pro".to_string(),
            structure: "gemini-2.5-pro".to_string(),
            generation: "gemini-2.5-flash".to_string(),
            verification: "gemini-2.5-pro".to_string(),
            diagram: "gemini-2.5-flash-image".to_string(),
        }
    }
}

/// Thinking budgets per remote call (reasoning tokens)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThinkingBudgets {
    /// Analysis call
    pub analysis: u32,
    /// Scaffold structure call
    pub structure: u32,
    /// Per-file generation
    pub generation: u32,
    /// Verification passes
    pub verification: u32,
}

impl Default for ThinkingBudgets {
    fn default() -> Self {
        Self {
            analysis: 4_096,
            structure: 2_048,
            generation: 1_024,
            verification: 4_096,
        }
    }
}

/// Which legacy files the run considers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeConfig {
    /// Keep only files matching one of these patterns (empty = all)
    pub include: Vec<String>,
    /// Drop files matching any of these patterns
    pub exclude: Vec<String>,
}

impl ScopeConfig {
    /// Check if no filter is configured
    #[inline]
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Check a legacy path against the filters
    ///
    /// A pattern ending in `/` or `/**` matches everything below that
    /// directory. A pattern with `*` is a [`PathPattern`] glob. Anything else
    /// is a literal path matching exactly or as a whole-segment suffix, so
    /// `config.json` matches `app/config.json` but not `src/config.ts`.
    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        let hit = |patterns: &[String]| patterns.iter().any(|p| scope_match(p, path));
        (self.include.is_empty() || hit(&self.include)) && !hit(&self.exclude)
    }
}

fn scope_match(pattern: &str, path: &str) -> bool {
    let trimmed = pattern.trim();
    let dir = trimmed
        .strip_suffix("/**")
        .or_else(|| trimmed.strip_suffix('/'));
    if let Some(dir) = dir {
        let dir = dir.trim_start_matches("./");
        return dir.is_empty() || path == dir || path.starts_with(&format!("{dir}/"));
    }
    if trimmed.contains('*') {
        return PathPattern::new(trimmed).matches(path);
    }
    let literal = paths::normalize(trimmed);
    paths::ends_with_segments(path, &literal)
}

/// Top-level migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationConfig {
    /// Model identifiers
    pub models: ModelConfig,
    /// Thinking budgets
    pub thinking: ThinkingBudgets,
    /// Retry policy for every remote call
    pub retry: RetryPolicy,
    /// Context size ceilings
    pub context: ContextLimits,
    /// Legacy files read for the scaffold phase
    pub scaffold_file_limit: usize,
    /// Verification passes (always all run)
    pub verification_passes: u32,
    /// Minimum similarity for fallback matching
    pub fallback_threshold: f64,
    /// Legacy scope filters
    pub scope: ScopeConfig,
    /// Generate an architecture diagram during analysis
    pub generate_diagram: bool,
    /// Target stack hint passed to analysis and generation
    pub target_stack: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            thinking: ThinkingBudgets::default(),
            retry: RetryPolicy::default(),
            context: ContextLimits::default(),
            scaffold_file_limit: 60,
            verification_passes: 2,
            fallback_threshold: FALLBACK_THRESHOLD,
            scope: ScopeConfig::default(),
            generate_diagram: true,
            target_stack: None,
        }
    }
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Serialize to TOML
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verification_passes == 0 {
            return Err(ConfigError::invalid("verificationPasses", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.fallback_threshold) {
            return Err(ConfigError::invalid("fallbackThreshold", "must be within [0, 1]"));
        }
        let models = [
            ("models.analysis", &self.models.analysis),
            ("models.structure", &self.models.structure),
            ("models.generation", &self.models.generation),
            ("models.verification", &self.models.verification),
            ("models.diagram", &self.models.diagram),
        ];
        for (field, model) in models {
            if model.trim().is_empty() {
                return Err(ConfigError::invalid(field, "model name is empty"));
            }
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::invalid("retry.jitter", "must be within [0, 1]"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::invalid("retry.maxDelayMs", "below baseDelayMs"));
        }
        if self.context.related_file_chars == 0 || self.context.primary_file_chars == 0 {
            return Err(ConfigError::invalid("context", "unit ceilings must be positive"));
        }
        Ok(())
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With context limits
    #[inline]
    #[must_use]
    pub fn with_context_limits(mut self, context: ContextLimits) -> Self {
        self.context = context;
        self
    }

    /// With verification pass count
    #[inline]
    #[must_use]
    pub fn with_verification_passes(mut self, passes: u32) -> Self {
        self.verification_passes = passes;
        self
    }

    /// With scope filters
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, scope: ScopeConfig) -> Self {
        self.scope = scope;
        self
    }

    /// With diagram generation toggle
    #[inline]
    #[must_use]
    pub fn with_diagram(mut self, enabled: bool) -> Self {
        self.generate_diagram = enabled;
        self
    }

    /// With scaffold read limit
    #[inline]
    #[must_use]
    pub fn with_scaffold_file_limit(mut self, limit: usize) -> Self {
        self.scaffold_file_limit = limit;
        self
    }

    /// With target stack hint
    #[inline]
    #[must_use]
    pub fn with_target_stack(mut self, stack: impl Into<String>) -> Self {
        self.target_stack = Some(stack.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.scaffold_file_limit, 60);
        assert_eq!(config.verification_passes, 2);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.context.related_file_count, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(MigrationConfig::from_toml_str("").unwrap(), MigrationConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = MigrationConfig::from_toml_str(
            r#"
scaffoldFileLimit = 10
generateDiagram = false

[models]
generation = "small-model"

[retry]
maxRetries = 5

[scope]
include = ["src/**"]
"#,
        )
        .unwrap();
        assert_eq!(config.scaffold_file_limit, 10);
        assert!(!config.generate_diagram);
        assert_eq!(config.models.generation, "small-model");
        assert_eq!(config.models.analysis, ModelConfig::default().analysis);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.scope.include, vec!["src/**"]);
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(matches!(
            MigrationConfig::from_toml_str("verificationPasses = 0"),
            Err(ConfigError::Invalid { field: "verificationPasses", .. })
        ));
        assert!(MigrationConfig::from_toml_str("fallbackThreshold = 1.5").is_err());
        assert!(MigrationConfig::from_toml_str("[models]\nanalysis = \" \"").is_err());
        for jitter in ["nan", "inf", "1.5", "-0.1"] {
            assert!(matches!(
                MigrationConfig::from_toml_str(&format!("[retry]\njitter = {jitter}")),
                Err(ConfigError::Invalid { field: "retry.jitter", .. })
            ));
        }
        assert!(matches!(
            MigrationConfig::from_toml_str("scaffoldFileLimit = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn toml_round_trip() {
        let config = MigrationConfig::default().with_target_stack("Next.js");
        let text = config.to_toml_string().unwrap();
        assert_eq!(MigrationConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn scope_filters() {
        let scope = ScopeConfig {
            include: vec!["src/**".into(), "*.html".into()],
            exclude: vec!["src/vendor/".into()],
        };
        assert!(scope.allows("src/app.js"));
        assert!(scope.allows("index.html"));
        assert!(!scope.allows("src/vendor/jquery.js"));
        assert!(!scope.allows("docs/readme.md"));
        assert!(ScopeConfig::default().allows("anything"));
    }

    #[test]
    fn literal_scope_patterns_match_whole_segments() {
        let scope = ScopeConfig {
            include: Vec::new(),
            exclude: vec!["config.json".into(), "./js/legacy.js".into()],
        };
        assert!(!scope.allows("config.json"));
        assert!(!scope.allows("app/config.json"));
        assert!(scope.allows("src/config.ts"));
        assert!(scope.allows("lib/config.yml"));
        assert!(scope.allows("app/myconfig.json"));
        assert!(!scope.allows("js/legacy.js"));
        assert!(scope.allows("js/legacy.ts"));

        let include = ScopeConfig {
            include: vec!["src/app".into()],
            exclude: Vec::new(),
        };
        assert!(include.allows("src/app"));
        assert!(!include.allows("src/app.js"));
    }
}
