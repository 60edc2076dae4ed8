//! Generation driver
//!
//! Drives the scheduled target list through the remote generation call, one
//! file at a time. Partial content is streamed to the event sink; a file that
//! fails after retries is marked `Error` and the run moves on. Cancellation
//! always propagates.

use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::events::{Emitter, EventSink, Phase};
use crate::prompts::{generation_prompt, GENERATION_SYSTEM};
use crate::response::strip_code_fences;
use futures::StreamExt;
use migra_artifact::{
    find, find_mut, AnalysisResult, FileNode, FileStatus, GenerationProgress, SemanticMatch,
};
use migra_graph::DependencyGraph;
use migra_planner::{ContextAssembler, ContextRequest, MatchTable, Schedule, SourceFiles};
use migra_remote::{with_retry, AbortSignal, GenerationService, RemoteError, ServiceRequest};

/// Everything a generation call reads besides the target tree
#[derive(Debug, Clone, Copy)]
pub struct GenerationInputs<'a> {
    /// Analysis output
    pub analysis: &'a AnalysisResult,
    /// Legacy contents read during scaffolding
    pub sources: &'a SourceFiles,
    /// Legacy dependency graph
    pub graph: &'a DependencyGraph,
    /// Target -> legacy source matches
    pub matches: &'a MatchTable,
    /// Generation order and derived dependencies
    pub schedule: &'a Schedule,
}

/// Result of a generation phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Files generated
    pub generated: Vec<String>,
    /// Files that failed after retries
    pub failed: Vec<String>,
    /// Final progress counter
    pub progress: GenerationProgress,
}

impl GenerationOutcome {
    /// Check if every scheduled file was generated
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-file generator
pub struct FileGenerator<'a> {
    service: &'a dyn GenerationService,
    config: &'a MigrationConfig,
    assembler: ContextAssembler,
}

impl std::fmt::Debug for FileGenerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileGenerator")
            .field("model", &self.config.models.generation)
            .finish_non_exhaustive()
    }
}

impl<'a> FileGenerator<'a> {
    /// Generator using `config`'s model, retry policy and context limits
    #[must_use]
    pub fn new(service: &'a dyn GenerationService, config: &'a MigrationConfig) -> Self {
        Self {
            service,
            config,
            assembler: ContextAssembler::new(config.context),
        }
    }

    /// Prompt for one target
    ///
    /// Finalized contents of the target's scheduled dependencies are read
    /// from `tree` and included as generated-dependency context.
    #[must_use]
    pub fn prompt_for(
        &self,
        target: &str,
        inputs: &GenerationInputs<'_>,
        tree: &[FileNode],
        instructions: Option<&str>,
    ) -> String {
        let unmatched = SemanticMatch::unmatched();
        let matched = inputs.matches.get(target).unwrap_or(&unmatched);
        let generated: Vec<(&str, &str)> = inputs
            .schedule
            .dependencies_of(target)
            .iter()
            .filter_map(|dep| {
                let node = find(tree, dep)?;
                match (&node.status, &node.content) {
                    (FileStatus::Done, Some(content)) => Some((dep.as_str(), content.as_str())),
                    _ => None,
                }
            })
            .collect();

        let request = ContextRequest::new(target, matched, inputs.sources, inputs.graph)
            .with_generated(generated)
            .with_instructions(instructions);
        let context = self.assembler.assemble(&request);
        if context.truncated {
            tracing::debug!("Context for {} was truncated", target);
        }
        generation_prompt(target, inputs.analysis, &context, &inputs.schedule.order)
    }

    /// Stream one file from the service, with retries
    async fn stream_file(
        &self,
        target: &str,
        prompt: String,
        signal: &AbortSignal,
        emitter: &Emitter<'_>,
    ) -> Result<String, MigrationError> {
        let request = ServiceRequest::new(&self.config.models.generation, prompt)
            .with_system(GENERATION_SYSTEM)
            .with_thinking_budget(self.config.thinking.generation);
        let label = format!("generate {target}");

        let raw = with_retry(&self.config.retry, signal, &label, || {
            let request = request.clone();
            async move {
                let mut stream = self.service.request_stream(request, signal).await?;
                let mut text = String::new();
                while let Some(chunk) = stream.next().await {
                    text.push_str(&chunk?);
                    emitter.file_content(target, &strip_code_fences(&text), true);
                }
                Ok::<_, RemoteError>(text)
            }
        })
        .await?;
        Ok(strip_code_fences(&raw))
    }

    /// Generate one target in place
    ///
    /// The node ends `Done` with its content, or `Error` on failure. On
    /// cancellation it is reset to `Pending` and the error is returned.
    async fn generate_node(
        &self,
        target: &str,
        prompt: String,
        tree: &mut [FileNode],
        signal: &AbortSignal,
        emitter: &Emitter<'_>,
    ) -> Result<bool, MigrationError> {
        set_status(tree, target, FileStatus::InProgress, emitter);

        match self.stream_file(target, prompt, signal, emitter).await {
            Ok(content) => {
                if content.trim().is_empty() {
                    emitter.warn(format!("{target} was generated empty"));
                }
                emitter.file_content(target, &content, false);
                if let Some(node) = find_mut(tree, target) {
                    node.content = Some(content);
                }
                set_status(tree, target, FileStatus::Done, emitter);
                emitter.success(format!("Generated {target}"));
                Ok(true)
            }
            Err(err) if err.is_cancelled() => {
                set_status(tree, target, FileStatus::Pending, emitter);
                Err(err)
            }
            Err(err) => {
                set_status(tree, target, FileStatus::Error, emitter);
                emitter.error(format!("Failed to generate {target}: {err}"));
                Ok(false)
            }
        }
    }

    /// Generate every scheduled file in order
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Cancelled`] when `signal` fires. Per-file
    /// failures are reported in the outcome instead.
    pub async fn generate_all(
        &self,
        inputs: &GenerationInputs<'_>,
        tree: &mut [FileNode],
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<GenerationOutcome, MigrationError> {
        let emitter = Emitter::new(sink, Phase::Generate);
        let order = &inputs.schedule.order;
        let mut outcome = GenerationOutcome {
            progress: GenerationProgress::start(order.len()),
            ..GenerationOutcome::default()
        };
        emitter.info(format!("Generating {} files", order.len()));
        if !inputs.schedule.cyclic.is_empty() {
            emitter.warn(format!(
                "{} files are in dependency cycles and were appended in priority order",
                inputs.schedule.cyclic.len()
            ));
        }
        emitter.progress(&outcome.progress);

        for target in order {
            signal.check()?;
            outcome.progress.begin(target.as_str());
            emitter.progress(&outcome.progress);

            let prompt = self.prompt_for(target, inputs, tree, None);
            if self.generate_node(target, prompt, tree, signal, &emitter).await? {
                outcome.generated.push(target.clone());
            } else {
                outcome.failed.push(target.clone());
            }

            outcome.progress.complete();
            emitter.progress(&outcome.progress);
        }

        if outcome.failed.is_empty() {
            emitter.success(format!("Generated {} files", outcome.generated.len()));
        } else {
            emitter.warn(format!(
                "Generated {} files, {} failed",
                outcome.generated.len(),
                outcome.failed.len()
            ));
        }
        Ok(outcome)
    }

    /// Regenerate one scaffolded file with optional extra instructions
    ///
    /// Returns whether the file was generated; on failure the node is left
    /// in `Error`.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::UnknownTarget`] if `target` is not a file in `tree`
    /// - [`MigrationError::Cancelled`] when `signal` fires
    pub async fn regenerate(
        &self,
        target: &str,
        inputs: &GenerationInputs<'_>,
        tree: &mut [FileNode],
        instructions: Option<&str>,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<bool, MigrationError> {
        if !find(tree, target).is_some_and(FileNode::is_file) {
            return Err(MigrationError::UnknownTarget(target.to_string()));
        }
        let emitter = Emitter::new(sink, Phase::Regenerate);
        emitter.info(format!("Regenerating {target}"));
        signal.check()?;
        let prompt = self.prompt_for(target, inputs, tree, instructions);
        self.generate_node(target, prompt, tree, signal, &emitter).await
    }
}

fn set_status(tree: &mut [FileNode], target: &str, status: FileStatus, emitter: &Emitter<'_>) {
    if let Some(node) = find_mut(tree, target) {
        node.status = status;
    }
    emitter.file_status(target, status);
}
