//! Error types for Migra Core
//!
//! Provides error handling for:
//! - Cancellation (always propagated, never retried)
//! - Remote failures that outlived their retry budget
//! - Repository access failures
//! - Phase-level fatal conditions (empty scope, empty scaffold plan)
//! - Configuration and session state errors

use crate::repository::RepoError;
use migra_remote::RemoteError;

/// Main migration error type
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Run was cancelled
    #[error("migration cancelled")]
    Cancelled,

    /// Remote call failed after retries
    #[error("remote call failed: {0}")]
    Remote(RemoteError),

    /// Repository collaborator failed
    #[error("repository error: {0}")]
    Repository(#[from] RepoError),

    /// Scope filters matched nothing
    #[error("no files matched the scope filters: {0}")]
    EmptyScope(String),

    /// Structure call produced no target files
    #[error("scaffold plan is empty")]
    EmptyScaffold,

    /// Regenerate requested for a path outside the scaffold
    #[error("not a scaffolded file: {0}")]
    UnknownTarget(String),

    /// Phase called out of order
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<RemoteError> for MigrationError {
    fn from(err: RemoteError) -> Self {
        if err.is_abort() {
            Self::Cancelled
        } else {
            Self::Remote(err)
        }
    }
}

impl MigrationError {
    /// Check if the run was cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the error aborts the whole run
    ///
    /// Everything except cancellation is fatal at phase level; cancellation
    /// ends the run idle instead.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_cancelled()
    }

    /// Check if a caller-driven restart might succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(err) => err.is_retryable(),
            Self::Repository(err) => matches!(err, RepoError::RateLimited(_)),
            _ => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid TOML: {0}")]
    Parse(String),

    /// A field failed validation
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
