//! Run session
//!
//! A [`MigrationSession`] owns one orchestrator and at most one active run.
//! Beginning a run cancels the previous run's signal; a cancelled run ends
//! `Idle`, any other failure ends `Failed` with a readable message.

use crate::error::MigrationError;
use crate::events::{Emitter, EventSink, Phase};
use crate::orchestrator::{MigrationRun, Orchestrator};
use crate::report::MigrationReport;
use migra_artifact::VerificationResult;
use migra_remote::AbortSignal;
use std::fmt;
use ulid::Ulid;

/// Session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    /// No run in progress
    #[default]
    Idle,
    /// Phase in progress
    Running(Phase),
    /// Last run finished
    Completed,
    /// Last run failed
    Failed(String),
}

impl RunState {
    /// Check if a phase is executing
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running(phase) => write!(f, "running ({phase})"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Migration session
#[derive(Debug)]
pub struct MigrationSession {
    orchestrator: Orchestrator,
    state: RunState,
    run_id: Option<Ulid>,
    signal: AbortSignal,
    armed: bool,
    run: Option<MigrationRun>,
}

impl MigrationSession {
    /// Idle session
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            state: RunState::Idle,
            run_id: None,
            signal: AbortSignal::new(),
            armed: false,
            run: None,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Identifier of the current or last run
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> Option<Ulid> {
        self.run_id
    }

    /// State of the current or last run
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&MigrationRun> {
        self.run.as_ref()
    }

    /// Orchestrator
    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Start a new run, cancelling the previous one
    ///
    /// The returned signal cancels the new run from outside the session.
    pub fn begin_run(&mut self) -> AbortSignal {
        self.signal.cancel();
        self.signal = AbortSignal::new();
        let id = Ulid::new();
        tracing::info!("Beginning migration run {}", id);
        self.run_id = Some(id);
        self.armed = true;
        self.run = None;
        self.state = RunState::Idle;
        self.signal.clone()
    }

    /// Cancel the active run
    pub fn cancel(&mut self) {
        self.signal.cancel();
        self.state = RunState::Idle;
    }

    /// Signal for a follow-up operation on the current run
    fn follow_up_signal(&mut self) -> AbortSignal {
        if self.signal.is_aborted() {
            self.signal = AbortSignal::new();
        }
        self.signal.clone()
    }

    fn settle<T>(&mut self, result: Result<T, MigrationError>) -> Result<T, MigrationError> {
        match &result {
            Ok(_) => self.state = RunState::Completed,
            Err(err) if err.is_cancelled() => {
                tracing::info!("Run cancelled");
                self.state = RunState::Idle;
            }
            Err(err) => {
                tracing::error!("Run failed: {}", err);
                self.state = RunState::Failed(err.to_string());
            }
        }
        result
    }

    /// Run every phase for `repo_url`
    ///
    /// Uses the signal from a preceding [`begin_run`](Self::begin_run), or
    /// begins a new run. State the phases completed is kept even on failure.
    ///
    /// # Errors
    ///
    /// Returns the first phase error.
    pub async fn run(&mut self, repo_url: &str, sink: &dyn EventSink) -> Result<&MigrationRun, MigrationError> {
        let signal = if self.armed && !self.signal.is_aborted() {
            self.signal.clone()
        } else {
            self.begin_run()
        };
        self.armed = false;
        let result = self.run_phases(repo_url, &signal, sink).await;
        self.settle(result)?;
        self.run
            .as_ref()
            .ok_or_else(|| MigrationError::InvalidState("run finished without state".into()))
    }

    async fn run_phases(
        &mut self,
        repo_url: &str,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<(), MigrationError> {
        let orch = self.orchestrator.clone();

        self.state = RunState::Running(Phase::Analyze);
        let run = self.run.insert(orch.analyze(repo_url, signal, sink).await?);

        self.state = RunState::Running(Phase::Scaffold);
        orch.scaffold(run, signal, sink).await?;

        self.state = RunState::Running(Phase::Generate);
        orch.generate(run, signal, sink).await?;

        self.state = RunState::Running(Phase::Verify);
        if run.generated_files().is_empty() {
            Emitter::new(sink, Phase::Verify).warn("Nothing was generated, skipping verification");
        } else {
            orch.verify(run, signal, sink).await?;
        }
        Ok(())
    }

    /// Re-run verification on the current run
    ///
    /// # Errors
    ///
    /// - [`MigrationError::InvalidState`] without a generated run
    /// - [`MigrationError::Cancelled`] if the session is cancelled meanwhile
    pub async fn verify(&mut self, sink: &dyn EventSink) -> Result<VerificationResult, MigrationError> {
        let signal = self.follow_up_signal();
        let orch = self.orchestrator.clone();
        let Some(run) = self.run.as_mut() else {
            return Err(MigrationError::InvalidState("no run to verify".into()));
        };
        self.state = RunState::Running(Phase::Verify);
        let result = orch.verify(run, &signal, sink).await;
        self.settle(result)
    }

    /// Regenerate one file of the current run
    ///
    /// # Errors
    ///
    /// - [`MigrationError::InvalidState`] without a scaffolded run
    /// - [`MigrationError::UnknownTarget`] for paths outside the scaffold
    /// - [`MigrationError::Cancelled`] if the session is cancelled meanwhile
    pub async fn regenerate_file(
        &mut self,
        path: &str,
        instructions: Option<&str>,
        sink: &dyn EventSink,
    ) -> Result<bool, MigrationError> {
        let signal = self.follow_up_signal();
        let orch = self.orchestrator.clone();
        let Some(run) = self.run.as_mut() else {
            return Err(MigrationError::InvalidState("no run to regenerate in".into()));
        };
        self.state = RunState::Running(Phase::Regenerate);
        let result = orch.regenerate_file(run, path, instructions, &signal, sink).await;
        self.settle(result)
    }

    /// Report for the current or last run
    #[must_use]
    pub fn report(&self) -> Option<MigrationReport> {
        let run = self.run.as_ref()?;
        let report = MigrationReport::from_run(run);
        Some(match self.run_id {
            Some(id) => report.with_run_id(id.to_string()),
            None => report,
        })
    }
}
