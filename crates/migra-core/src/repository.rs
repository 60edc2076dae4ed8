//! Repository collaborator
//!
//! The core never talks to a hosting API directly. A [`RepositoryProvider`]
//! lists the legacy tree and returns file contents; its failures are fatal for
//! the call that hit them and are never retried here.

use async_trait::async_trait;
use migra_artifact::FileNode;

/// Repository access failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    /// Repository or file does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials missing or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Hosting API quota exhausted
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Legacy repository source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Full file tree of the repository at `url`
    async fn fetch_structure(&self, url: &str) -> Result<Vec<FileNode>, RepoError>;

    /// Content of one file
    async fn fetch_file_content(&self, url: &str, path: &str) -> Result<String, RepoError>;
}

#[async_trait]
impl<R: RepositoryProvider + ?Sized> RepositoryProvider for std::sync::Arc<R> {
    async fn fetch_structure(&self, url: &str) -> Result<Vec<FileNode>, RepoError> {
        (**self).fetch_structure(url).await
    }

    async fn fetch_file_content(&self, url: &str, path: &str) -> Result<String, RepoError> {
        (**self).fetch_file_content(url, path).await
    }
}

/// README candidates, most specific first
pub const README_CANDIDATES: &[&str] = &["README.md", "readme.md", "README", "README.txt"];

/// Path of the root README in a fetched tree, if any
#[must_use]
pub fn find_readme(tree: &[FileNode]) -> Option<&str> {
    README_CANDIDATES.iter().find_map(|candidate| {
        tree.iter()
            .find(|n| n.is_file() && n.path == *candidate)
            .map(|n| n.path.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readme_lookup_prefers_markdown() {
        let tree = vec![FileNode::file("README"), FileNode::file("README.md")];
        assert_eq!(find_readme(&tree), Some("README.md"));
        assert_eq!(find_readme(&[FileNode::file("docs/README.md")]), None);
    }

    #[tokio::test]
    async fn mock_provider_contract() {
        let mut repo = MockRepositoryProvider::new();
        repo.expect_fetch_file_content()
            .withf(|_, path| path == "missing.js")
            .returning(|_, path| Err(RepoError::NotFound(path.to_string())));

        let err = repo.fetch_file_content("https://example.com/r", "missing.js").await.unwrap_err();
        assert_eq!(err, RepoError::NotFound("missing.js".into()));
    }
}
