//! Migra Artifact Model
//!
//! Data model shared by every stage of a scaffold migration.
//!
//! # Core Concepts
//!
//! - [`FileNode`]: File or directory in a legacy tree or a target scaffold
//! - [`build_tree`] / [`flatten_files`]: Flat path list <-> tree conversion
//! - [`paths`]: Slash-delimited, root-relative path helpers
//! - [`AnalysisResult`]: Output of the analysis phase, including mapping hints
//! - [`SemanticMatch`]: Target file -> legacy source association
//! - [`GenerationProgress`] / [`VerificationResult`]: Run-level reporting
//!
//! # Example
//!
//! ```rust
//! use migra_artifact::{build_tree, flatten_files};
//!
//! let tree = build_tree(["src/app.ts", "src/lib/api.ts", "package.json"]);
//! let files: Vec<&str> = flatten_files(&tree).into_iter().map(|n| n.path.as_str()).collect();
//!
//! assert_eq!(files, vec!["src/lib/api.ts", "src/app.ts", "package.json"]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod analysis;
mod error;
mod node;
pub mod paths;
mod tree;

// Re-exports
pub use analysis::{
    AnalysisResult, Complexity, ExplicitMapping, GenerationProgress, SemanticMatch,
    VerificationResult,
};
pub use error::ArtifactError;
pub use node::{FileNode, FileStatus, NodeKind};
pub use tree::{build_tree, find, find_mut, flatten_files, flatten_files_mut, validate_tree};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the artifact model
    pub use crate::{
        build_tree, flatten_files, AnalysisResult, FileNode, FileStatus, NodeKind, SemanticMatch,
        VerificationResult,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn scaffold_lifecycle() {
        let mut tree = build_tree(["src/main.ts", "src/lib/db.ts"]);
        assert!(validate_tree(&tree).is_ok());

        let node = find_mut(&mut tree, "src/lib/db.ts").unwrap();
        node.status = FileStatus::InProgress;
        node.content = Some("export const db = {};".to_string());
        node.status = FileStatus::Done;

        let done = flatten_files(&tree)
            .into_iter()
            .filter(|n| n.status == FileStatus::Done)
            .count();
        assert_eq!(done, 1);
    }

    #[test]
    fn match_invariant_holds_for_explicit_primary() {
        let m = SemanticMatch::with_primary("legacy/app.js", 0.9);
        assert!(m.is_consistent());
        assert_eq!(m.primary_source_path.as_deref(), Some("legacy/app.js"));
    }
}
