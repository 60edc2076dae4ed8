//! Remote call errors
//!
//! Failures are classified for the retry executor:
//! - Cancellation: never retried
//! - Retryable status codes and transient transport messages: retried
//! - Everything else: returned immediately

use once_cell::sync::Lazy;
use regex::Regex;

/// HTTP-like status codes worth retrying
pub const RETRYABLE_STATUS: &[u16] = &[408, 429, 500, 502, 503, 504];

static TRANSIENT_MESSAGE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)network|timeout|timed out|connection (?:reset|refused)|socket hang up|fetch failed|temporarily unavailable|overloaded|ECONNRESET|ETIMEDOUT",
    )
    .ok()
});

/// Remote call error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Run was cancelled
    #[error("operation aborted")]
    Aborted,

    /// Service answered with an error status
    #[error("service returned status {code}: {message}")]
    Status {
        /// Status code
        code: u16,
        /// Error message from the service
        message: String,
    },

    /// Request never completed (connection, DNS, timeout ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Response could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Service is missing configuration such as an API key
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Error with a status code
    #[inline]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Check if this is a cancellation
    #[inline]
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Status code, if any
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if the retry executor may try again
    ///
    /// True for [`RETRYABLE_STATUS`] codes and for messages that look like a
    /// transient network failure. Cancellation is never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Aborted | Self::Unavailable(_) => false,
            Self::Status { code, message } => {
                RETRYABLE_STATUS.contains(code) || is_transient_message(message)
            }
            Self::Transport(message) | Self::Malformed(message) | Self::Other(message) => {
                is_transient_message(message)
            }
        }
    }
}

/// Check a message against the transient-failure pattern
#[must_use]
pub fn is_transient_message(message: &str) -> bool {
    TRANSIENT_MESSAGE
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}
