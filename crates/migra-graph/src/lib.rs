//! Migra Dependency Graph
//!
//! File-to-file dependency discovery for legacy sources.
//!
//! # Overview
//!
//! - **ImportScanner**: Extracts import specifiers from file content
//!   (regex-based by default, swappable for a real parser)
//! - **DependencyGraph**: Path -> resolved relative imports, built once per
//!   phase from a fixed snapshot of contents
//! - **Lookup**: Matches import targets to canonical graph keys by exact
//!   path, appended extension, or directory index file
//!
//! # Example
//!
//! ```rust
//! use migra_graph::DependencyGraph;
//!
//! let graph = DependencyGraph::build([
//!     ("src/app.js", "import { api } from './lib/api';"),
//!     ("src/lib/api.js", "export const api = {};"),
//! ]);
//!
//! assert_eq!(graph.dependencies("src/app.js"), &["src/lib/api".to_string()]);
//! assert_eq!(graph.related_files("src/app.js", 10), vec!["src/lib/api.js".to_string()]);
//! ```

#![warn(missing_docs)]

pub mod graph;
pub mod imports;
pub mod lookup;

// Re-exports
pub use graph::DependencyGraph;
pub use imports::{relative_imports, scan_imports, ImportScanner, RegexImportScanner};
pub use lookup::{candidate_paths, resolve_target, INDEX_STEM, KNOWN_EXTENSIONS};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for graph operations
    pub use crate::{relative_imports, DependencyGraph, ImportScanner, RegexImportScanner};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
