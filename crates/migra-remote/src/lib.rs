//! Migra Remote
//!
//! Everything needed to call a generation backend safely from a long-running,
//! cancellable migration run.
//!
//! # Core Concepts
//!
//! - [`AbortSignal`]: Cooperative, cloneable cancellation token
//! - [`GenerationService`]: Backend contract (single attempt per call)
//! - [`with_retry`]: Exponential backoff with jitter for retryable failures
//! - [`RemoteError`]: Failure classification (`is_retryable`, `is_abort`)
//!
//! # Example
//!
//! ```rust
//! use migra_remote::{with_retry, AbortSignal, RemoteError, RetryPolicy};
//!
//! # async fn demo() -> Result<(), RemoteError> {
//! let signal = AbortSignal::new();
//! let text = with_retry(&RetryPolicy::default(), &signal, "analysis", || async {
//!     Ok::<_, RemoteError>("done".to_string())
//! })
//! .await?;
//! assert_eq!(text, "done");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

mod abort;
mod error;
mod retry;
mod service;

pub use abort::AbortSignal;
pub use error::{is_transient_message, RemoteError, RETRYABLE_STATUS};
pub use retry::{with_retry, RetryPolicy};
pub use service::{
    ChunkStream, Contents, GenerationService, ImageConfig, InlineData, Part, RequestConfig,
    ServiceRequest, ServiceResponse,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for remote calls
    pub use crate::{
        with_retry, AbortSignal, GenerationService, RemoteError, RetryPolicy, ServiceRequest,
        ServiceResponse,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails with 503 a fixed number of times, then echoes
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerationService for Flaky {
        async fn request(
            &self,
            request: ServiceRequest,
            signal: &AbortSignal,
        ) -> Result<ServiceResponse, RemoteError> {
            signal.check()?;
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(RemoteError::status(503, "overloaded"))
            } else {
                Ok(ServiceResponse::text(request.contents.text()))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn service_call_through_retry() {
        let service = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let signal = AbortSignal::new();
        let request = ServiceRequest::new("model", "ping");

        let response = with_retry(&RetryPolicy::default(), &signal, "ping", || {
            let service = service.clone();
            let request = request.clone();
            let signal = signal.clone();
            async move { service.request(request, &signal).await }
        })
        .await
        .unwrap();

        assert_eq!(response.text.as_deref(), Some("ping"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }
}
