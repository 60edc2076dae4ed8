//! Phase orchestrator
//!
//! Runs a migration as Analyze -> Scaffold -> Generate -> Verify, plus
//! single-file regeneration. Phases hand a [`MigrationRun`] along; each one
//! takes the run's abort signal and an event sink, and cancellation always
//! propagates as [`MigrationError::Cancelled`].

use crate::cache::SourceCache;
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::events::{Emitter, EventSink, Phase};
use crate::generation::{FileGenerator, GenerationInputs, GenerationOutcome};
use crate::prompts::{
    analysis_prompt, diagram_prompt, structure_prompt, ANALYSIS_SYSTEM, STRUCTURE_SYSTEM,
};
use crate::report::PhaseTiming;
use crate::repository::{find_readme, RepoError, RepositoryProvider};
use crate::response::{parse_analysis, parse_structure};
use crate::verify::{ProjectFiles, Verifier};
use migra_artifact::{
    build_tree, find_mut, flatten_files, flatten_files_mut, AnalysisResult, FileNode, FileStatus,
    VerificationResult,
};
use migra_graph::DependencyGraph;
use migra_planner::{
    prioritize, ContextAssembler, GenerationScheduler, MatchTable, Schedule, SemanticFileMapper,
    SourceFiles,
};
use migra_remote::{
    with_retry, AbortSignal, GenerationService, ImageConfig, InlineData, ServiceRequest,
    ServiceResponse,
};
use std::sync::Arc;
use tokio::time::Instant;

/// State carried from phase to phase
#[derive(Debug, Clone, Default)]
pub struct MigrationRun {
    /// Legacy repository URL
    pub repo_url: String,
    /// Legacy tree as fetched
    pub legacy_tree: Vec<FileNode>,
    /// Legacy file paths that passed the scope filters
    pub scoped_files: Vec<String>,
    /// README content, if one was found
    pub readme: Option<String>,
    /// Analysis output
    pub analysis: AnalysisResult,
    /// Architecture diagram, if generated
    pub diagram: Option<InlineData>,
    /// Legacy contents read for scaffolding
    pub sources: SourceFiles,
    /// Legacy dependency graph
    pub graph: DependencyGraph,
    /// Planned target file paths
    pub targets: Vec<String>,
    /// Target scaffold
    pub tree: Vec<FileNode>,
    /// Target -> legacy source matches
    pub matches: MatchTable,
    /// Generation order
    pub schedule: Schedule,
    /// Last generation outcome
    pub generation: Option<GenerationOutcome>,
    /// Last verification verdict
    pub verification: Option<VerificationResult>,
    /// Completed phase durations
    pub timings: Vec<PhaseTiming>,
}

impl MigrationRun {
    /// Empty run for `repo_url`
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }

    /// Check if a scaffold was planned
    #[inline]
    #[must_use]
    pub fn is_scaffolded(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Generated target contents
    #[must_use]
    pub fn generated_files(&self) -> ProjectFiles {
        flatten_files(&self.tree)
            .into_iter()
            .filter(|n| n.status == FileStatus::Done)
            .map(|n| (n.path.clone(), n.content_str().to_string()))
            .collect()
    }

    fn inputs(&self) -> GenerationInputs<'_> {
        GenerationInputs {
            analysis: &self.analysis,
            sources: &self.sources,
            graph: &self.graph,
            matches: &self.matches,
            schedule: &self.schedule,
        }
    }

    fn record(&mut self, phase: Phase, started: Instant) {
        self.timings.push(PhaseTiming::new(phase, started.elapsed()));
    }
}

/// Migration orchestrator
#[derive(Clone)]
pub struct Orchestrator {
    service: Arc<dyn GenerationService>,
    repository: Arc<dyn RepositoryProvider>,
    config: MigrationConfig,
    cache: SourceCache,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator with default configuration
    pub fn new(service: Arc<dyn GenerationService>, repository: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            service,
            repository,
            config: MigrationConfig::default(),
            cache: SourceCache::default(),
        }
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    /// With a shared source cache
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, cache: SourceCache) -> Self {
        self.cache = cache;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the source cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    async fn call(
        &self,
        label: &str,
        request: ServiceRequest,
        signal: &AbortSignal,
    ) -> Result<ServiceResponse, MigrationError> {
        let response = with_retry(&self.config.retry, signal, label, || {
            self.service.request(request.clone(), signal)
        })
        .await?;
        Ok(response)
    }

    /// Cached read racing `signal`; the inner result is the repository's
    async fn read_source(
        &self,
        url: &str,
        path: &str,
        signal: &AbortSignal,
    ) -> Result<Result<Arc<str>, RepoError>, MigrationError> {
        Ok(signal
            .run(self.cache.fetch(self.repository.as_ref(), url, path))
            .await?)
    }

    /// Analyze the legacy repository
    ///
    /// Fetches the tree and README, applies the scope filters, runs the
    /// analysis call and, when enabled and credentials are present, the
    /// diagram call. A diagram failure is only a warning.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::Repository`] if the tree cannot be fetched
    /// - [`MigrationError::EmptyScope`] if the filters match no file
    /// - [`MigrationError::Remote`] if the analysis call fails after retries
    /// - [`MigrationError::Cancelled`] when `signal` fires
    pub async fn analyze(
        &self,
        repo_url: &str,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<MigrationRun, MigrationError> {
        let started = Instant::now();
        let emitter = Emitter::new(sink, Phase::Analyze);
        let mut run = MigrationRun::new(repo_url);

        emitter.info(format!("Fetching repository structure for {repo_url}"));
        run.legacy_tree = signal.run(self.repository.fetch_structure(repo_url)).await??;
        let all: Vec<String> = flatten_files(&run.legacy_tree)
            .into_iter()
            .map(|n| n.path.clone())
            .collect();
        run.scoped_files = all
            .iter()
            .filter(|p| self.config.scope.allows(p))
            .cloned()
            .collect();
        if run.scoped_files.is_empty() {
            let filters = if self.config.scope.is_unrestricted() {
                "repository has no files".to_string()
            } else {
                format!(
                    "include {:?}, exclude {:?}",
                    self.config.scope.include, self.config.scope.exclude
                )
            };
            emitter.error(format!("No files in scope ({filters})"));
            return Err(MigrationError::EmptyScope(filters));
        }
        emitter.info(format!("{} of {} files in scope", run.scoped_files.len(), all.len()));

        if let Some(readme_path) = find_readme(&run.legacy_tree).map(str::to_string) {
            match self.read_source(repo_url, &readme_path, signal).await? {
                Ok(content) => run.readme = Some(content.to_string()),
                Err(err) => emitter.warn(format!("Could not read {readme_path}: {err}")),
            }
        }
        signal.check()?;

        let prompt = analysis_prompt(
            repo_url,
            &run.scoped_files,
            run.readme.as_deref(),
            self.config.target_stack.as_deref(),
        );
        let request = ServiceRequest::new(&self.config.models.analysis, prompt)
            .with_system(ANALYSIS_SYSTEM)
            .json()
            .with_thinking_budget(self.config.thinking.analysis);
        let response = self.call("analysis", request, signal).await?;
        run.analysis = parse_analysis(response.text_or_empty());
        if let Some(stack) = &self.config.target_stack {
            run.analysis.recommended_target.clone_from(stack);
        }
        emitter.success(format!(
            "Analysis complete: {} ({:?} complexity, {} mapping hints)",
            if run.analysis.source_framework.is_empty() {
                "unknown framework"
            } else {
                run.analysis.source_framework.as_str()
            },
            run.analysis.complexity,
            run.analysis.mappings.len()
        ));

        if self.config.generate_diagram {
            run.diagram = self.diagram(&run.analysis, signal, &emitter).await?;
        }

        run.record(Phase::Analyze, started);
        Ok(run)
    }

    async fn diagram(
        &self,
        analysis: &AnalysisResult,
        signal: &AbortSignal,
        emitter: &Emitter<'_>,
    ) -> Result<Option<InlineData>, MigrationError> {
        if !self.service.has_api_key() {
            emitter.warn("Skipping architecture diagram: no API key configured");
            return Ok(None);
        }
        let request = ServiceRequest::new(&self.config.models.diagram, diagram_prompt(analysis)).with_image(
            ImageConfig {
                aspect_ratio: "16:9".to_string(),
                image_size: None,
            },
        );
        match self.call("diagram", request, signal).await {
            Ok(response) => match response.first_image() {
                Some(image) => {
                    emitter.success("Architecture diagram generated");
                    Ok(Some(image.clone()))
                }
                None => {
                    emitter.warn("Diagram response contained no image");
                    Ok(None)
                }
            },
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                emitter.warn(format!("Architecture diagram failed: {err}"));
                Ok(None)
            }
        }
    }

    /// Plan the target scaffold
    ///
    /// Reads up to `scaffold_file_limit` legacy files in priority order,
    /// builds the dependency graph and asks the service for the target file
    /// list. Files that are missing are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::Repository`] on unauthorized or rate-limited reads
    /// - [`MigrationError::EmptyScaffold`] if the plan has no files
    /// - [`MigrationError::Remote`] if the structure call fails after retries
    /// - [`MigrationError::Cancelled`] when `signal` fires
    pub async fn scaffold(
        &self,
        run: &mut MigrationRun,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<(), MigrationError> {
        let started = Instant::now();
        let emitter = Emitter::new(sink, Phase::Scaffold);
        let selected = prioritize(&run.scoped_files, self.config.scaffold_file_limit);
        emitter.info(format!("Reading {} legacy files", selected.len()));

        let mut sources = SourceFiles::new();
        for path in &selected {
            signal.check()?;
            match self.read_source(&run.repo_url, path, signal).await? {
                Ok(content) => {
                    sources.insert(path.clone(), content.to_string());
                }
                Err(err @ (RepoError::Unauthorized(_) | RepoError::RateLimited(_))) => {
                    emitter.error(format!("Reading {path} failed: {err}"));
                    return Err(err.into());
                }
                Err(err) => emitter.warn(format!("Skipping {path}: {err}")),
            }
        }
        run.graph = DependencyGraph::build(sources.iter().map(|(p, c)| (p.as_str(), c.as_str())));
        emitter.info(format!(
            "Dependency graph: {} files, {} edges",
            run.graph.len(),
            run.graph.edge_count()
        ));

        let overview = ContextAssembler::new(self.config.context).legacy_overview(&sources);
        if overview.truncated {
            emitter.warn("Legacy overview truncated to fit the context ceiling");
        }
        run.sources = sources;

        let prompt = structure_prompt(&run.analysis, &overview, self.config.target_stack.as_deref());
        let request = ServiceRequest::new(&self.config.models.structure, prompt)
            .with_system(STRUCTURE_SYSTEM)
            .json()
            .with_thinking_budget(self.config.thinking.structure);
        let response = self.call("structure", request, signal).await?;
        let planned = parse_structure(response.text_or_empty());
        if planned.is_empty() {
            emitter.error("Structure call returned no files");
            return Err(MigrationError::EmptyScaffold);
        }

        run.tree = build_tree(&planned);
        run.targets = flatten_files(&run.tree)
            .into_iter()
            .map(|n| n.path.clone())
            .collect();
        run.matches.clear();
        run.schedule = Schedule::default();
        run.generation = None;
        run.verification = None;
        emitter.success(format!("Scaffold planned: {} files", run.targets.len()));

        run.record(Phase::Scaffold, started);
        Ok(())
    }

    /// Match targets to legacy sources and order them
    fn plan(&self, run: &mut MigrationRun, emitter: &Emitter<'_>) {
        let source_paths: Vec<&str> = run.sources.keys().map(String::as_str).collect();
        run.matches = SemanticFileMapper::new()
            .with_threshold(self.config.fallback_threshold)
            .map(&run.targets, &source_paths, &run.analysis.mappings);
        run.schedule = GenerationScheduler::new().schedule(&run.targets, &run.matches, &run.graph);

        let matched = run.matches.values().filter(|m| m.is_matched()).count();
        emitter.info(format!(
            "Matched {matched} of {} targets to legacy sources",
            run.targets.len()
        ));
    }

    /// Generate every scaffolded file
    ///
    /// # Errors
    ///
    /// - [`MigrationError::InvalidState`] before a scaffold exists
    /// - [`MigrationError::Cancelled`] when `signal` fires
    pub async fn generate(
        &self,
        run: &mut MigrationRun,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<GenerationOutcome, MigrationError> {
        if !run.is_scaffolded() {
            return Err(MigrationError::InvalidState("generate requires a scaffold".into()));
        }
        let started = Instant::now();
        let emitter = Emitter::new(sink, Phase::Generate);
        for node in flatten_files_mut(&mut run.tree) {
            node.status = FileStatus::Pending;
            node.content = None;
        }
        self.plan(run, &emitter);

        let generator = FileGenerator::new(self.service.as_ref(), &self.config);
        let mut tree = std::mem::take(&mut run.tree);
        let result = generator.generate_all(&run.inputs(), &mut tree, signal, sink).await;
        run.tree = tree;
        let outcome = result?;

        run.generation = Some(outcome.clone());
        run.verification = None;
        run.record(Phase::Generate, started);
        Ok(outcome)
    }

    /// Verify the generated files and write fixes back into the scaffold
    ///
    /// # Errors
    ///
    /// - [`MigrationError::InvalidState`] before anything was generated
    /// - [`MigrationError::Cancelled`] when `signal` fires
    pub async fn verify(
        &self,
        run: &mut MigrationRun,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<VerificationResult, MigrationError> {
        let files = run.generated_files();
        if files.is_empty() {
            return Err(MigrationError::InvalidState("verify requires generated files".into()));
        }
        let started = Instant::now();
        let emitter = Emitter::new(sink, Phase::Verify);

        let outcome = Verifier::new(self.service.as_ref(), &self.config)
            .run(files, signal, sink)
            .await?;
        for path in &outcome.fixed {
            if let (Some(node), Some(content)) = (find_mut(&mut run.tree, path), outcome.files.get(path)) {
                node.content = Some(content.clone());
                emitter.file_content(path, content, false);
            }
        }

        run.verification = Some(outcome.result.clone());
        run.record(Phase::Verify, started);
        Ok(outcome.result)
    }

    /// Regenerate one scaffolded file with optional extra instructions
    ///
    /// Returns whether the file was generated.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::InvalidState`] before a scaffold exists
    /// - [`MigrationError::UnknownTarget`] for paths outside the scaffold
    /// - [`MigrationError::Cancelled`] when `signal` fires
    pub async fn regenerate_file(
        &self,
        run: &mut MigrationRun,
        path: &str,
        instructions: Option<&str>,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<bool, MigrationError> {
        if !run.is_scaffolded() {
            return Err(MigrationError::InvalidState("regenerate requires a scaffold".into()));
        }
        let started = Instant::now();
        if run.schedule.is_empty() {
            self.plan(run, &Emitter::new(sink, Phase::Regenerate));
        }

        let generator = FileGenerator::new(self.service.as_ref(), &self.config);
        let mut tree = std::mem::take(&mut run.tree);
        let result = generator
            .regenerate(path, &run.inputs(), &mut tree, instructions, signal, sink)
            .await;
        run.tree = tree;
        let generated = result?;

        run.verification = None;
        run.record(Phase::Regenerate, started);
        Ok(generated)
    }

    /// Run every phase in order
    ///
    /// # Errors
    ///
    /// Returns the first phase error.
    pub async fn run_all(
        &self,
        repo_url: &str,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<MigrationRun, MigrationError> {
        let mut run = self.analyze(repo_url, signal, sink).await?;
        self.scaffold(&mut run, signal, sink).await?;
        self.generate(&mut run, signal, sink).await?;
        if run.generated_files().is_empty() {
            Emitter::new(sink, Phase::Verify).warn("Nothing was generated, skipping verification");
        } else {
            self.verify(&mut run, signal, sink).await?;
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::repository::MockRepositoryProvider;
    use async_trait::async_trait;
    use migra_remote::RemoteError;

    struct NoService;

    #[async_trait]
    impl GenerationService for NoService {
        async fn request(
            &self,
            _request: ServiceRequest,
            _signal: &AbortSignal,
        ) -> Result<ServiceResponse, RemoteError> {
            Err(RemoteError::Unavailable("offline".into()))
        }
    }

    fn orchestrator(repo: MockRepositoryProvider) -> Orchestrator {
        Orchestrator::new(Arc::new(NoService), Arc::new(repo))
    }

    #[tokio::test]
    async fn missing_repository_is_fatal() {
        let mut repo = MockRepositoryProvider::new();
        repo.expect_fetch_structure()
            .returning(|url| Err(RepoError::NotFound(url.to_string())));

        let err = orchestrator(repo)
            .analyze("https://example.com/gone", &AbortSignal::new(), &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Repository(RepoError::NotFound(_))));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn empty_scope_is_fatal() {
        let mut repo = MockRepositoryProvider::new();
        repo.expect_fetch_structure()
            .returning(|_| Ok(build_tree(["docs/a.md", "docs/b.md"])));
        let config = MigrationConfig::default().with_scope(crate::config::ScopeConfig {
            include: vec!["src/**".into()],
            exclude: Vec::new(),
        });

        let err = orchestrator(repo)
            .with_config(config)
            .analyze("r", &AbortSignal::new(), &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::EmptyScope(_)));
    }

    #[tokio::test]
    async fn phases_require_their_predecessors() {
        let orch = orchestrator(MockRepositoryProvider::new());
        let mut run = MigrationRun::new("r");
        let signal = AbortSignal::new();
        assert!(matches!(
            orch.generate(&mut run, &signal, &NullSink).await,
            Err(MigrationError::InvalidState(_))
        ));
        assert!(matches!(
            orch.verify(&mut run, &signal, &NullSink).await,
            Err(MigrationError::InvalidState(_))
        ));
        assert!(matches!(
            orch.regenerate_file(&mut run, "a.ts", None, &signal, &NullSink).await,
            Err(MigrationError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let mut repo = MockRepositoryProvider::new();
        repo.expect_fetch_structure().returning(|_| Ok(Vec::new()));
        let signal = AbortSignal::new();
        signal.cancel();

        let err = orchestrator(repo).analyze("r", &signal, &NullSink).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
