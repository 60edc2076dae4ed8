//! Migra Core - migration phase orchestration
//!
//! Turns a legacy repository into a modern scaffold through four phases:
//! - Analyze: read the legacy tree and ask for a migration plan
//! - Scaffold: design the target file layout from prioritized legacy sources
//! - Generate: produce every target file in dependency order, streaming
//! - Verify: bounded cross-file review passes with fixes applied
//!
//! Every phase is cancellable through an [`AbortSignal`] and reports through
//! an [`EventSink`].
//!
//! # Core Concepts
//!
//! - [`Orchestrator`]: Phase runner over a generation service and a repository
//! - [`MigrationRun`]: State handed from phase to phase
//! - [`MigrationSession`]: One active run at a time, with a [`RunState`]
//! - [`MigrationConfig`]: TOML-backed models, budgets, limits and scope
//!
//! # Example
//!
//! ```rust,ignore
//! use migra_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     service: Arc<dyn migra_remote::GenerationService>,
//! #     repository: Arc<dyn RepositoryProvider>,
//! # ) -> Result<(), MigrationError> {
//! let config = MigrationConfig::load("migra.toml")?;
//! let orchestrator = Orchestrator::new(service, repository).with_config(config);
//! let mut session = MigrationSession::new(orchestrator);
//!
//! let run = session.run("https://github.com/acme/legacy-shop", &NullSink).await?;
//! println!("Generated {} files", run.generated_files().len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod orchestrator;
pub mod prompts;
pub mod report;
pub mod repository;
pub mod response;
pub mod session;
pub mod verify;

pub use cache::{CacheStats, SourceCache};
pub use config::{MigrationConfig, ModelConfig, ScopeConfig, ThinkingBudgets};
pub use error::{ConfigError, MigrationError};
pub use events::{EventSink, LogEntry, MigrationEvent, NullSink, Phase, Severity};
pub use generation::{FileGenerator, GenerationInputs, GenerationOutcome};
pub use orchestrator::{MigrationRun, Orchestrator};
pub use report::{format_duration, MigrationReport, PhaseTiming};
pub use repository::{find_readme, RepoError, RepositoryProvider};
pub use response::{parse_analysis, parse_structure, parse_verification, strip_code_fences};
pub use session::{MigrationSession, RunState};
pub use verify::{static_check, ProjectFiles, VerificationOutcome, Verifier};

pub use migra_remote::AbortSignal;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a migration
    pub use crate::{
        AbortSignal, EventSink, MigrationConfig, MigrationError, MigrationEvent, MigrationReport,
        MigrationRun, MigrationSession, NullSink, Orchestrator, Phase, RepositoryProvider,
        RunState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
