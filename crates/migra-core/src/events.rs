//! Run events
//!
//! Phases report to the caller through an [`EventSink`]: structured log
//! entries, per-file status and content, the progress counter, applied fixes
//! and the verification verdict. Every log entry is mirrored to `tracing` at
//! the matching level.

use chrono::{DateTime, Utc};
use migra_artifact::{FileStatus, GenerationProgress, VerificationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Step completed
    Success,
    /// Non-fatal problem
    Warning,
    /// Failure
    Error,
}

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Legacy analysis
    Analyze,
    /// Target structure planning
    Scaffold,
    /// File generation
    Generate,
    /// Cross-file verification
    Verify,
    /// Single-file regeneration
    Regenerate,
}

impl Phase {
    /// Lower-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Scaffold => "scaffold",
            Self::Generate => "generate",
            Self::Verify => "verify",
            Self::Regenerate => "regenerate",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was created
    pub timestamp: DateTime<Utc>,
    /// Message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Emitting phase
    pub phase: Phase,
}

impl LogEntry {
    /// Entry stamped now
    pub fn new(message: impl Into<String>, severity: Severity, phase: Phase) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            severity,
            phase,
        }
    }
}

/// Event emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MigrationEvent {
    /// Log line
    Log(LogEntry),
    /// Target file status changed
    FileStatus {
        /// Target path
        path: String,
        /// New status
        status: FileStatus,
    },
    /// Target file content changed
    FileContent {
        /// Target path
        path: String,
        /// Content so far
        content: String,
        /// Still streaming
        partial: bool,
    },
    /// Generation progress
    Progress(GenerationProgress),
    /// Verification replaced a file
    FixApplied {
        /// Target path
        path: String,
        /// Pass number (1-based)
        pass: usize,
    },
    /// Verification finished
    Verification(VerificationResult),
}

/// Receiver of run events
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: MigrationEvent);
}

impl<F> EventSink for F
where
    F: Fn(MigrationEvent) + Send + Sync,
{
    fn emit(&self, event: MigrationEvent) {
        self(event);
    }
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: MigrationEvent) {}
}

/// Phase-scoped event helper
#[derive(Clone, Copy)]
pub(crate) struct Emitter<'a> {
    sink: &'a dyn EventSink,
    phase: Phase,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(sink: &'a dyn EventSink, phase: Phase) -> Self {
        Self { sink, phase }
    }

    pub(crate) fn log(&self, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry::new(message, severity, self.phase);
        match severity {
            Severity::Info | Severity::Success => {
                tracing::info!(phase = %self.phase, "{}", entry.message);
            }
            Severity::Warning => tracing::warn!(phase = %self.phase, "{}", entry.message),
            Severity::Error => tracing::error!(phase = %self.phase, "{}", entry.message),
        }
        self.sink.emit(MigrationEvent::Log(entry));
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub(crate) fn success(&self, message: impl Into<String>) {
        self.log(Severity::Success, message);
    }

    pub(crate) fn warn(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub(crate) fn file_status(&self, path: &str, status: FileStatus) {
        self.sink.emit(MigrationEvent::FileStatus {
            path: path.to_string(),
            status,
        });
    }

    pub(crate) fn file_content(&self, path: &str, content: &str, partial: bool) {
        self.sink.emit(MigrationEvent::FileContent {
            path: path.to_string(),
            content: content.to_string(),
            partial,
        });
    }

    pub(crate) fn progress(&self, progress: &GenerationProgress) {
        self.sink.emit(MigrationEvent::Progress(progress.clone()));
    }

    pub(crate) fn fix_applied(&self, path: &str, pass: usize) {
        tracing::debug!("Fix applied to {} in pass {}", path, pass);
        self.sink.emit(MigrationEvent::FixApplied {
            path: path.to_string(),
            pass,
        });
    }

    pub(crate) fn verification(&self, result: &VerificationResult) {
        self.sink.emit(MigrationEvent::Verification(result.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |event: MigrationEvent| seen.lock().unwrap().push(event)
        };
        let emitter = Emitter::new(&sink, Phase::Verify);
        emitter.warn("import unresolved");
        emitter.fix_applied("src/a.ts", 1);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        match &seen[0] {
            MigrationEvent::Log(entry) => {
                assert_eq!(entry.severity, Severity::Warning);
                assert_eq!(entry.phase, Phase::Verify);
                assert_eq!(entry.message, "import unresolved");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn events_serialize_tagged() {
        let event = MigrationEvent::FileStatus {
            path: "src/a.ts".into(),
            status: FileStatus::Done,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fileStatus");
        assert_eq!(json["path"], "src/a.ts");
        assert_eq!(Phase::Regenerate.to_string(), "regenerate");
    }
}
