//! Per-client fixed-window rate limiting
//!
//! State lives behind [`RateLimitStore`] so a proxying host can keep it in
//! whatever backing store it shares between instances. [`InMemoryRateLimitStore`]
//! is the single-process default.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use migra_remote::{AbortSignal, ChunkStream, GenerationService, RemoteError, ServiceRequest, ServiceResponse};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hits between sweeps of expired windows in [`InMemoryRateLimitStore`]
pub const SWEEP_INTERVAL: u64 = 64;

/// Rate-limit store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Backing store failed
    #[error("rate limit store error: {0}")]
    Store(String),
}

/// Window state for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Requests counted in the current window
    pub count: u32,
    /// When the current window ends
    pub window_reset_at: DateTime<Utc>,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request may proceed
    Allowed {
        /// Requests left in this window
        remaining: u32,
    },
    /// Request rejected
    Limited {
        /// When the window resets
        retry_at: DateTime<Utc>,
    },
}

impl RateDecision {
    /// Check if the request may proceed
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Storage for per-client window state
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `client` and return the updated window
    ///
    /// A window that ended before `now` restarts at `now` with the given
    /// length.
    async fn hit(
        &self,
        client: &str,
        now: DateTime<Utc>,
        window: ChronoDuration,
    ) -> Result<WindowState, RateLimitError>;

    /// Current window for `client`, if any
    async fn get(&self, client: &str) -> Result<Option<WindowState>, RateLimitError>;

    /// Forget `client`
    async fn reset(&self, client: &str) -> Result<(), RateLimitError>;
}

/// In-process store
///
/// Windows that have ended are swept every [`SWEEP_INTERVAL`] hits, so
/// clients that stop calling do not stay tracked.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, WindowState>,
    hits: AtomicU64,
}

impl InMemoryRateLimitStore {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked clients
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check if no client is tracked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop every window that ended at or before `now`
    ///
    /// Returns the number of clients removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| w.window_reset_at > now);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!("Pruned {} expired rate-limit windows", removed);
        }
        removed
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        client: &str,
        now: DateTime<Utc>,
        window: ChronoDuration,
    ) -> Result<WindowState, RateLimitError> {
        // no entry guard may be held while retaining
        if self.hits.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.prune(now);
        }
        let fresh = WindowState {
            count: 0,
            window_reset_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let mut entry = self.windows.entry(client.to_string()).or_insert(fresh);
        if entry.window_reset_at <= now {
            *entry = fresh;
        }
        entry.count = entry.count.saturating_add(1);
        Ok(*entry)
    }

    async fn get(&self, client: &str) -> Result<Option<WindowState>, RateLimitError> {
        Ok(self.windows.get(client).map(|w| *w))
    }

    async fn reset(&self, client: &str) -> Result<(), RateLimitError> {
        self.windows.remove(client);
        Ok(())
    }
}

/// Fixed-window limiter
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: ChronoDuration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Limiter allowing `max_requests` per `window`
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u32, window: std::time::Duration) -> Self {
        Self {
            store,
            max_requests,
            window: ChronoDuration::from_std(window).unwrap_or(ChronoDuration::MAX),
        }
    }

    /// Limiter over a fresh in-memory store
    #[must_use]
    pub fn in_memory(max_requests: u32, window: std::time::Duration) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), max_requests, window)
    }

    /// Count a request for `client` at `now`
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn check_at(&self, client: &str, now: DateTime<Utc>) -> Result<RateDecision, RateLimitError> {
        let state = self.store.hit(client, now, self.window).await?;
        if state.count > self.max_requests {
            Ok(RateDecision::Limited {
                retry_at: state.window_reset_at,
            })
        } else {
            Ok(RateDecision::Allowed {
                remaining: self.max_requests - state.count,
            })
        }
    }

    /// Count a request for `client` now
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn check(&self, client: &str) -> Result<RateDecision, RateLimitError> {
        self.check_at(client, Utc::now()).await
    }
}

/// Service decorator enforcing a rate limit for one client key
#[derive(Debug, Clone)]
pub struct RateLimitedService<S> {
    inner: S,
    limiter: RateLimiter,
    client: String,
}

impl<S: GenerationService> RateLimitedService<S> {
    /// Wrap `inner`, counting requests against `client`
    pub fn new(inner: S, limiter: RateLimiter, client: impl Into<String>) -> Self {
        Self {
            inner,
            limiter,
            client: client.into(),
        }
    }

    async fn admit(&self) -> Result<(), RemoteError> {
        let decision = self
            .limiter
            .check(&self.client)
            .await
            .map_err(|e| RemoteError::Other(e.to_string()))?;
        match decision {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_at } => {
                tracing::warn!("Rate limit reached for {}, resets at {}", self.client, retry_at);
                Err(RemoteError::status(
                    429,
                    format!("rate limit exceeded, retry after {}", retry_at.to_rfc3339()),
                ))
            }
        }
    }
}

#[async_trait]
impl<S: GenerationService> GenerationService for RateLimitedService<S> {
    async fn request(
        &self,
        request: ServiceRequest,
        signal: &AbortSignal,
    ) -> Result<ServiceResponse, RemoteError> {
        signal.check()?;
        self.admit().await?;
        self.inner.request(request, signal).await
    }

    async fn request_stream<'a>(
        &'a self,
        request: ServiceRequest,
        signal: &'a AbortSignal,
    ) -> Result<ChunkStream<'a>, RemoteError> {
        signal.check()?;
        self.admit().await?;
        self.inner.request_stream(request, signal).await
    }

    fn has_api_key(&self) -> bool {
        self.inner.has_api_key()
    }
}
