//! Dependency-aware generation scheduler
//!
//! Orders target files so that, where the legacy import graph implies one
//! target depends on another, the dependency is generated first. The derived
//! graph is built over target paths:
//!
//! ```text
//! target --matches--> legacy source --imports--> legacy dep --matched by--> other target
//! ```
//!
//! and emits the edge `other target -> target`. Ordering is Kahn's algorithm
//! with a ready queue keyed on ([`PriorityTier`], path).

use crate::mapper::MatchTable;
use crate::priority::{priority_tier, PriorityTier};
use migra_graph::DependencyGraph;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

/// Related-file expansion depth used when deriving target dependencies
pub const RELATED_HORIZON: usize = 6;

/// Result of scheduling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Every target exactly once, dependencies first
    pub order: Vec<String>,
    /// Targets that could not be topologically placed (cycles), in tier order
    pub cyclic: Vec<String>,
    /// Target -> targets it depends on, in tier order
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl Schedule {
    /// Targets the given target was derived to depend on
    #[inline]
    #[must_use]
    pub fn dependencies_of(&self, target: &str) -> &[String] {
        self.dependencies.get(target).map_or(&[], Vec::as_slice)
    }

    /// Number of scheduled targets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing was scheduled
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Generation scheduler
#[derive(Debug, Clone)]
pub struct GenerationScheduler {
    horizon: usize,
}

impl Default for GenerationScheduler {
    fn default() -> Self {
        Self {
            horizon: RELATED_HORIZON,
        }
    }
}

type Key<'a> = (PriorityTier, &'a str);

fn key(path: &str) -> Key<'_> {
    (priority_tier(path), path)
}

impl GenerationScheduler {
    /// Scheduler with the default related-file horizon
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the related-file horizon
    #[inline]
    #[must_use]
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Order targets for generation
    #[must_use]
    pub fn schedule<T: AsRef<str>>(
        &self,
        targets: &[T],
        matches: &MatchTable,
        legacy: &DependencyGraph,
    ) -> Schedule {
        let targets: BTreeSet<&str> = targets.iter().map(AsRef::as_ref).collect();
        let graph = self.derive_graph(&targets, matches, legacy);

        let mut indegree: HashMap<&str, usize> = targets
            .iter()
            .map(|t| (*t, graph.neighbors_directed(*t, Direction::Incoming).count()))
            .collect();

        let mut ready: BinaryHeap<Reverse<Key<'_>>> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(t, _)| Reverse(key(*t)))
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(targets.len());
        let mut emitted: BTreeSet<&str> = BTreeSet::new();
        while let Some(Reverse((_, current))) = ready.pop() {
            order.push(current.to_string());
            emitted.insert(current);
            for next in graph.neighbors_directed(current, Direction::Outgoing) {
                if let Some(d) = indegree.get_mut(next) {
                    *d = d.saturating_sub(1);
                    if *d == 0 {
                        ready.push(Reverse(key(next)));
                    }
                }
            }
        }

        let mut cyclic: Vec<&str> = targets
            .iter()
            .copied()
            .filter(|t| !emitted.contains(t))
            .collect();
        cyclic.sort_by_key(|t| key(*t));
        if !cyclic.is_empty() {
            tracing::warn!(
                "{} target(s) in dependency cycles, appended in priority order",
                cyclic.len()
            );
        }
        order.extend(cyclic.iter().map(|t| (*t).to_string()));

        let dependencies = targets
            .iter()
            .map(|t| {
                let mut deps: Vec<&str> = graph.neighbors_directed(*t, Direction::Incoming).collect();
                deps.sort_by_key(|d| key(*d));
                (
                    (*t).to_string(),
                    deps.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();

        tracing::debug!(
            "Scheduled {} targets over {} derived edges",
            order.len(),
            graph.edge_count()
        );

        Schedule {
            order,
            cyclic: cyclic.into_iter().map(str::to_string).collect(),
            dependencies,
        }
    }

    /// Build the target-level dependency graph
    fn derive_graph<'a>(
        &self,
        targets: &BTreeSet<&'a str>,
        matches: &'a MatchTable,
        legacy: &DependencyGraph,
    ) -> DiGraphMap<&'a str, ()> {
        // legacy source -> targets whose match includes it
        let mut by_source: HashMap<&str, BTreeSet<&'a str>> = HashMap::new();
        for (target, m) in matches {
            if !targets.contains(target.as_str()) {
                continue;
            }
            for source in &m.source_paths {
                by_source
                    .entry(source.as_str())
                    .or_default()
                    .insert(target.as_str());
            }
        }

        let mut graph: DiGraphMap<&'a str, ()> = DiGraphMap::new();
        for &target in targets {
            graph.add_node(target);
        }

        for (target, m) in matches {
            let target = target.as_str();
            if !targets.contains(target) {
                continue;
            }
            for source in &m.source_paths {
                for dep in self.legacy_dependencies(legacy, source) {
                    let Some(providers) = by_source.get(dep.as_str()) else {
                        continue;
                    };
                    for &provider in providers {
                        if provider != target {
                            graph.add_edge(provider, target, ());
                        }
                    }
                }
            }
        }
        graph
    }

    /// Direct (key-resolved) dependencies plus bounded related files
    fn legacy_dependencies(&self, legacy: &DependencyGraph, source: &str) -> BTreeSet<String> {
        let mut deps: BTreeSet<String> = legacy.resolved_dependencies(source).into_iter().collect();
        deps.extend(legacy.related_files(source, self.horizon));
        deps
    }
}

/// Sort paths by priority tier then path and keep at most `limit`
#[must_use]
pub fn prioritize<S: AsRef<str>>(paths: &[S], limit: usize) -> Vec<String> {
    let mut sorted: Vec<&str> = paths.iter().map(AsRef::as_ref).collect();
    sorted.sort_by_key(|p| key(*p));
    sorted.dedup();
    sorted.into_iter().take(limit).map(str::to_string).collect()
}
