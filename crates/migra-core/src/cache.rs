//! Legacy source cache using moka
//!
//! File contents fetched from the repository collaborator are cached per
//! (repository, path) so later phases and single-file regeneration do not
//! refetch them. Concurrent lookups of the same key share one fetch.

use crate::repository::{RepoError, RepositoryProvider};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached files
    pub entry_count: u64,
}

/// Bounded (repository, path) -> content cache
#[derive(Debug, Clone)]
pub struct SourceCache {
    inner: Cache<(String, String), Arc<str>>,
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl SourceCache {
    /// Default number of cached files
    pub const DEFAULT_CAPACITY: u64 = 2_048;

    /// Cache holding at most `max_capacity` files
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Cache whose entries expire after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Cached content, if present
    pub async fn get(&self, repo: &str, path: &str) -> Option<Arc<str>> {
        self.inner.get(&(repo.to_string(), path.to_string())).await
    }

    /// Store content
    pub async fn insert(&self, repo: &str, path: &str, content: impl Into<Arc<str>>) {
        self.inner
            .insert((repo.to_string(), path.to_string()), content.into())
            .await;
    }

    /// Cached content, fetching it through `provider` on a miss
    ///
    /// Failed fetches are not cached.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn fetch<P>(&self, provider: &P, repo: &str, path: &str) -> Result<Arc<str>, RepoError>
    where
        P: RepositoryProvider + ?Sized,
    {
        self.inner
            .try_get_with((repo.to_string(), path.to_string()), async {
                tracing::debug!("Fetching {} from {}", path, repo);
                provider.fetch_file_content(repo, path).await.map(Arc::<str>::from)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Drop everything cached for `repo`
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Other`] if the cache rejects the predicate.
    pub fn invalidate_repo(&self, repo: &str) -> Result<(), RepoError> {
        let repo = repo.to_string();
        self.inner
            .invalidate_entries_if(move |key, _| key.0 == repo)
            .map(|_| ())
            .map_err(|e| RepoError::Other(e.to_string()))
    }

    /// Drop everything
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}
