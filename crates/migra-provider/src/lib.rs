//! Migra Provider
//!
//! Concrete [`GenerationService`](migra_remote::GenerationService) backends:
//!
//! - [`HttpGenerationService`]: `generateContent`-style HTTP API via `reqwest`
//! - [`RateLimitedService`]: Decorator enforcing a per-client fixed window
//!   through a pluggable [`RateLimitStore`]
//!
//! # Example
//!
//! ```rust,no_run
//! use migra_provider::{HttpGenerationService, HttpServiceConfig, RateLimitedService, RateLimiter};
//! use std::time::Duration;
//!
//! let http = HttpGenerationService::new(HttpServiceConfig::default().with_api_key("key"))?;
//! let limited = RateLimitedService::new(http, RateLimiter::in_memory(60, Duration::from_secs(60)), "host-1");
//! # let _ = limited;
//! # Ok::<(), migra_remote::RemoteError>(())
//! ```

#![warn(unreachable_pub)]

mod http;
mod rate_limit;

pub use http::{parse_response, request_body, HttpGenerationService, HttpServiceConfig, DEFAULT_BASE_URL};
pub use rate_limit::{
    InMemoryRateLimitStore, RateDecision, RateLimitError, RateLimitStore, RateLimitedService,
    RateLimiter, WindowState, SWEEP_INTERVAL,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
