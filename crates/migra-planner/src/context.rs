//! Bounded generation context
//!
//! [`ContextAssembler`] turns a target's semantic match into the legacy
//! source text sent with its generation request. Every unit and the related
//! block as a whole are capped; overflow is cut on a char boundary and
//! replaced by an explicit `[truncated N chars]` marker.

use migra_artifact::SemanticMatch;
use migra_graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

/// Legacy path -> content
pub type SourceFiles = BTreeMap<String, String>;

/// Context size ceilings, in characters unless noted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextLimits {
    /// Primary source unit
    pub primary_file_chars: usize,
    /// Each related unit
    pub related_file_chars: usize,
    /// Whole related block (related + generated dependency units)
    pub related_total_chars: usize,
    /// Scaffold-phase legacy overview
    pub legacy_total_chars: usize,
    /// Related source files (count)
    pub related_file_count: usize,
    /// Already generated dependency files (count)
    pub generated_dependency_count: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            primary_file_chars: 16_000,
            related_file_chars: 8_000,
            related_total_chars: 32_000,
            legacy_total_chars: 120_000,
            related_file_count: 8,
            generated_dependency_count: 4,
        }
    }
}

/// Assembled context text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBlock {
    /// Text to embed in the prompt
    pub text: String,
    /// Paths whose content was included, in order
    pub included: Vec<String>,
    /// Whether anything was cut
    pub truncated: bool,
}

impl ContextBlock {
    /// Check if the block carries no text
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn write_section(&mut self, header: &str, body: &str) {
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        let _ = write!(self.text, "=== {header} ===\n{body}");
    }

    fn push_section(&mut self, label: &str, path: &str, body: &str) {
        self.write_section(&format!("{label}: {path}"), body);
        self.included.push(path.to_string());
    }
}

/// Inputs for one target's context
#[derive(Debug, Clone)]
pub struct ContextRequest<'a> {
    /// Target path being generated
    pub target: &'a str,
    /// Target's semantic match
    pub matched: &'a SemanticMatch,
    /// Fetched legacy contents
    pub sources: &'a SourceFiles,
    /// Legacy dependency graph
    pub graph: &'a DependencyGraph,
    /// Finalized earlier targets this one depends on: (path, content)
    pub generated: Vec<(&'a str, &'a str)>,
    /// Caller-supplied extra instructions
    pub instructions: Option<&'a str>,
}

impl<'a> ContextRequest<'a> {
    /// Request with no generated dependencies or instructions
    #[must_use]
    pub fn new(
        target: &'a str,
        matched: &'a SemanticMatch,
        sources: &'a SourceFiles,
        graph: &'a DependencyGraph,
    ) -> Self {
        Self {
            target,
            matched,
            sources,
            graph,
            generated: Vec::new(),
            instructions: None,
        }
    }

    /// Attach finalized dependency files
    #[inline]
    #[must_use]
    pub fn with_generated(mut self, generated: Vec<(&'a str, &'a str)>) -> Self {
        self.generated = generated;
        self
    }

    /// Attach extra instructions (blank strings are ignored)
    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, instructions: Option<&'a str>) -> Self {
        self.instructions = instructions.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Context assembler
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    limits: ContextLimits,
}

impl ContextAssembler {
    /// Assembler with custom limits
    #[inline]
    #[must_use]
    pub fn new(limits: ContextLimits) -> Self {
        Self { limits }
    }

    /// Active limits
    #[inline]
    #[must_use]
    pub fn limits(&self) -> &ContextLimits {
        &self.limits
    }

    /// Assemble one target's context
    #[must_use]
    pub fn assemble(&self, request: &ContextRequest<'_>) -> ContextBlock {
        let mut block = ContextBlock::default();

        if let Some(primary) = request.matched.primary_source_path.as_deref() {
            if let Some(content) = lookup(request.sources, request.graph, primary) {
                let (body, cut) = truncate(content, self.limits.primary_file_chars);
                block.truncated |= cut;
                block.push_section("PRIMARY SOURCE", primary, &body);
            }
            self.push_related(&mut block, request, primary);
        }

        if let Some(instructions) = request.instructions {
            block.write_section("ADDITIONAL INSTRUCTIONS (highest priority)", instructions.trim());
        }

        tracing::debug!(
            "Context for {}: {} units, {} chars{}",
            request.target,
            block.included.len(),
            block.text.len(),
            if block.truncated { " (truncated)" } else { "" }
        );
        block
    }

    fn push_related(&self, block: &mut ContextBlock, request: &ContextRequest<'_>, primary: &str) {
        let mut budget = self.limits.related_total_chars;
        let mut related = 0usize;

        for path in related_candidates(request, primary, self.limits.related_file_count) {
            if related >= self.limits.related_file_count || budget == 0 {
                break;
            }
            let Some(content) = lookup(request.sources, request.graph, &path) else {
                continue;
            };
            let body = self.take_unit(block, content, &mut budget);
            block.push_section("RELATED SOURCE", &path, &body);
            related += 1;
        }

        for (path, content) in request
            .generated
            .iter()
            .take(self.limits.generated_dependency_count)
        {
            if budget == 0 {
                break;
            }
            let body = self.take_unit(block, content, &mut budget);
            block.push_section("GENERATED DEPENDENCY", path, &body);
        }
    }

    /// Cut one related unit to its own cap and the remaining block budget
    fn take_unit(&self, block: &mut ContextBlock, content: &str, budget: &mut usize) -> String {
        let cap = self.limits.related_file_chars.min(*budget);
        let (body, cut) = truncate(content, cap);
        block.truncated |= cut;
        *budget -= content.chars().count().min(cap);
        body
    }

    /// Scaffold-phase overview of all read legacy files, capped overall
    #[must_use]
    pub fn legacy_overview(&self, sources: &SourceFiles) -> ContextBlock {
        let mut block = ContextBlock::default();
        for (path, content) in sources {
            block.push_section("FILE", path, content);
        }
        let (text, cut) = truncate(&block.text, self.limits.legacy_total_chars);
        block.text = text;
        block.truncated = cut;
        block
    }
}

/// Primary's graph neighbors, then remaining matched sources with theirs
fn related_candidates(request: &ContextRequest<'_>, primary: &str, limit: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::from([primary.to_string()]);
    if let Some(key) = request.graph.resolve(primary) {
        seen.insert(key.to_string());
    }
    let mut out = Vec::new();
    let mut push = |path: String, out: &mut Vec<String>| {
        if seen.insert(path.clone()) {
            out.push(path);
        }
    };

    for path in request.graph.related_files(primary, limit) {
        push(path, &mut out);
    }
    for source in request.matched.ordered_sources().filter(|s| *s != primary) {
        push(source.to_string(), &mut out);
        for path in request.graph.related_files(source, limit) {
            push(path, &mut out);
        }
    }
    out
}

/// Content by exact path, falling back to the graph's key lookup
fn lookup<'s>(sources: &'s SourceFiles, graph: &DependencyGraph, path: &str) -> Option<&'s str> {
    if let Some(content) = sources.get(path) {
        return Some(content.as_str());
    }
    let key = graph.resolve(path)?;
    sources.get(key).map(String::as_str)
}

/// Cut `text` to at most `cap` chars, appending a marker when anything was
/// dropped
///
/// Returns the (possibly cut) text and whether a cut happened.
#[must_use]
pub fn truncate(text: &str, cap: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= cap {
        return (text.to_string(), false);
    }
    let end = text.char_indices().nth(cap).map_or(text.len(), |(i, _)| i);
    let omitted = total - cap;
    (format!("{}\n[truncated {omitted} chars]", &text[..end]), true)
}
