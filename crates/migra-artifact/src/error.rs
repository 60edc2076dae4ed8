//! Error types for the artifact model

/// Errors raised while building or validating file trees
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    /// Path is empty after normalization
    #[error("empty path")]
    EmptyPath,

    /// Node path is not root-relative or contains `.`/`..` segments
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Two nodes share the same path
    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    /// A non-root node has no parent directory node in the tree
    #[error("missing parent directory for {path} (expected {parent})")]
    MissingParent {
        /// Offending node path
        path: String,
        /// Parent path that should exist
        parent: String,
    },

    /// A file node carries children
    #[error("file node has children: {0}")]
    FileWithChildren(String),

    /// Node not found
    #[error("node not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parent_display() {
        let err = ArtifactError::MissingParent {
            path: "src/a.ts".to_string(),
            parent: "src".to_string(),
        };
        assert!(err.to_string().contains("expected src"));
    }
}
