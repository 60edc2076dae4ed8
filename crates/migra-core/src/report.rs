//! Migration report
//!
//! Summary of a run: per-phase timings, generated and failed files and the
//! verification verdict, rendered to markdown for hosts that export it.

use crate::events::Phase;
use crate::orchestrator::MigrationRun;
use migra_artifact::{Complexity, VerificationResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Human-readable duration, rounded down
///
/// - under a minute: `{s}s`
/// - under an hour: `{m}m {s}s`
/// - otherwise: `{h}h {m}m`
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3_600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3_600, (secs % 3_600) / 60)
    }
}

/// Duration of one completed phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTiming {
    /// Phase
    pub phase: Phase,
    /// Wall-clock time
    pub elapsed: Duration,
}

impl PhaseTiming {
    /// Timing for `phase`
    #[inline]
    #[must_use]
    pub fn new(phase: Phase, elapsed: Duration) -> Self {
        Self { phase, elapsed }
    }
}

/// Run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Run identifier, when run through a session
    pub run_id: Option<String>,
    /// Legacy repository URL
    pub repo_url: String,
    /// Detected legacy framework
    pub source_framework: String,
    /// Target stack
    pub recommended_target: String,
    /// Complexity tier
    pub complexity: Complexity,
    /// Scaffolded files
    pub total_files: usize,
    /// Successfully generated files
    pub generated: usize,
    /// Files that failed generation
    pub failed: Vec<String>,
    /// Completed phase durations
    pub timings: Vec<PhaseTiming>,
    /// Verification verdict
    pub verification: Option<VerificationResult>,
}

impl MigrationReport {
    /// Summarize a run
    #[must_use]
    pub fn from_run(run: &MigrationRun) -> Self {
        let (generated, failed) = run
            .generation
            .as_ref()
            .map_or((0, Vec::new()), |g| (g.generated.len(), g.failed.clone()));
        Self {
            run_id: None,
            repo_url: run.repo_url.clone(),
            source_framework: run.analysis.source_framework.clone(),
            recommended_target: run.analysis.recommended_target.clone(),
            complexity: run.analysis.complexity,
            total_files: run.targets.len(),
            generated,
            failed,
            timings: run.timings.clone(),
            verification: run.verification.clone(),
        }
    }

    /// With run identifier
    #[inline]
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Sum of phase durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.timings.iter().map(|t| t.elapsed).sum()
    }

    /// Render as markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Migration Report\n\n");
        if let Some(id) = &self.run_id {
            let _ = writeln!(out, "- Run: `{id}`");
        }
        let _ = writeln!(out, "- Repository: {}", self.repo_url);
        let _ = writeln!(
            out,
            "- Stack: {} -> {}",
            or_unknown(&self.source_framework),
            or_unknown(&self.recommended_target)
        );
        let _ = writeln!(out, "- Complexity: {:?}", self.complexity);
        let _ = writeln!(
            out,
            "- Files: {} generated, {} failed, {} planned",
            self.generated,
            self.failed.len(),
            self.total_files
        );
        let _ = writeln!(out, "- Duration: {}", format_duration(self.total_duration()));

        if !self.timings.is_empty() {
            out.push_str("\n## Phases\n\n| Phase | Duration |\n|---|---|\n");
            for timing in &self.timings {
                let _ = writeln!(out, "| {} | {} |", timing.phase, format_duration(timing.elapsed));
            }
        }

        if !self.failed.is_empty() {
            out.push_str("\n## Failed files\n\n");
            for path in &self.failed {
                let _ = writeln!(out, "- `{path}`");
            }
        }

        if let Some(v) = &self.verification {
            let verdict = if v.passed { "passed" } else { "failed" };
            let _ = writeln!(
                out,
                "\n## Verification\n\n{verdict} after {} passes, {} fixes applied",
                v.passes, v.fixed_files_applied
            );
            if !v.unresolved.is_empty() {
                out.push_str("\nUnresolved:\n");
                for issue in &v.unresolved {
                    let _ = writeln!(out, "- {issue}");
                }
            }
        }
        out
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
