//! Migra Planner
//!
//! Decides what each target file is generated from, in which order, and with
//! how much legacy context.
//!
//! # Core Concepts
//!
//! - [`PathPattern`]: Loose path hint (literal, suffix, basename, `*` glob)
//! - [`SemanticFileMapper`]: Target -> legacy source association
//! - [`GenerationScheduler`]: Dependency-aware, tiered generation order
//! - [`ContextAssembler`]: Bounded, labeled context per target
//!
//! # Example
//!
//! ```rust
//! use migra_graph::DependencyGraph;
//! use migra_planner::{GenerationScheduler, SemanticFileMapper};
//!
//! let legacy = DependencyGraph::build([
//!     ("js/app.js", "import { get } from './api';"),
//!     ("js/api.js", "export const get = () => 1;"),
//! ]);
//! let targets = ["src/app.ts", "src/api.ts"];
//! let sources: Vec<&str> = legacy.keys().collect();
//!
//! let matches = SemanticFileMapper::new().map(&targets, &sources, &[]);
//! let schedule = GenerationScheduler::new().schedule(&targets, &matches, &legacy);
//!
//! assert_eq!(schedule.order, vec!["src/api.ts", "src/app.ts"]);
//! ```

#![warn(unreachable_pub)]

mod context;
mod mapper;
mod pattern;
mod priority;
mod scheduler;

pub use context::{truncate, ContextAssembler, ContextBlock, ContextLimits, ContextRequest, SourceFiles};
pub use mapper::{similarity, MatchTable, SemanticFileMapper, API_BONUS, BASENAME_BONUS, FALLBACK_THRESHOLD};
pub use pattern::PathPattern;
pub use priority::{is_api_path, priority_tier, PriorityTier};
pub use scheduler::{prioritize, GenerationScheduler, Schedule, RELATED_HORIZON};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for planning a generation phase
    pub use crate::{
        ContextAssembler, ContextLimits, ContextRequest, GenerationScheduler, MatchTable,
        Schedule, SemanticFileMapper,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use migra_artifact::ExplicitMapping;
    use migra_graph::DependencyGraph;

    #[test]
    fn plan_end_to_end() {
        let sources: SourceFiles = [
            ("index.html", "<script src=\"js/main.js\"></script>"),
            ("js/main.js", "import { render } from './view';\nrender();"),
            ("js/view.js", "export function render() {}"),
        ]
        .into_iter()
        .map(|(p, c)| (p.to_string(), c.to_string()))
        .collect();
        let legacy = DependencyGraph::build(sources.iter().map(|(p, c)| (p.as_str(), c.as_str())));

        let targets = ["src/main.ts", "src/view.ts", "package.json"];
        let source_paths: Vec<&str> = sources.keys().map(String::as_str).collect();
        let hints = [ExplicitMapping::new("js/main.js", "src/main.ts").with_confidence(0.9)];

        let matches = SemanticFileMapper::new().map(&targets, &source_paths, &hints);
        assert_eq!(matches["src/main.ts"].primary_source_path.as_deref(), Some("js/main.js"));
        assert_eq!(matches["src/view.ts"].primary_source_path.as_deref(), Some("js/view.js"));

        let schedule = GenerationScheduler::new().schedule(&targets, &matches, &legacy);
        assert_eq!(schedule.order, vec!["package.json", "src/view.ts", "src/main.ts"]);

        let request = ContextRequest::new("src/main.ts", &matches["src/main.ts"], &sources, &legacy);
        let block = ContextAssembler::default().assemble(&request);
        assert_eq!(block.included, vec!["js/main.js", "js/view.js"]);
    }
}
