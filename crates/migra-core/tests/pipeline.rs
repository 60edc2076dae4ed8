use migra_artifact::FileStatus;
use migra_core::{
    MigrationConfig, MigrationError, Orchestrator, RepoError, ScopeConfig, Severity, SourceCache,
};
use migra_remote::{AbortSignal, RemoteError, RetryPolicy};
use migra_test_utils::{
    init_tracing, legacy_shop, node, shop_service, CallKind, InMemoryRepository, RecordingSink,
    ScriptedService, SHOP_TARGETS, SHOP_URL,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;

fn orchestrator(service: &Arc<ScriptedService>, repo: InMemoryRepository) -> Orchestrator {
    init_tracing();
    Orchestrator::new(service.clone(), Arc::new(repo))
}

fn paths<'a>(items: impl IntoIterator<Item = &'a String>) -> BTreeSet<&'a str> {
    items.into_iter().map(String::as_str).collect()
}

#[tokio::test]
async fn full_pipeline_generates_and_verifies() {
    let service = Arc::new(shop_service());
    let sink = RecordingSink::new();
    let orch = orchestrator(&service, legacy_shop());

    let run = orch.run_all(SHOP_URL, &AbortSignal::new(), &sink).await.unwrap();

    assert_eq!(run.analysis.source_framework, "jQuery");
    assert_eq!(run.analysis.recommended_target, "React + TypeScript");
    assert_eq!(run.readme.as_deref(), Some("# Legacy Shop\n\nA jQuery storefront with a cart."));
    assert!(run.diagram.is_some());
    assert_eq!(paths(&run.targets), SHOP_TARGETS.iter().copied().collect::<BTreeSet<_>>());

    for target in SHOP_TARGETS {
        assert_eq!(node(&run.tree, target).status, FileStatus::Done, "{target}");
    }
    assert_eq!(
        node(&run.tree, "src/App.tsx").content.as_deref(),
        Some(
            "import { fetchProducts } from './api/client';\nimport { Cart } from './cart/cart';\n\
             export default function App() { return null; }\n"
        )
    );

    let generation = run.generation.as_ref().unwrap();
    assert!(generation.is_complete());
    assert_eq!(generation.generated.len(), SHOP_TARGETS.len());

    let verification = run.verification.as_ref().unwrap();
    assert!(verification.passed, "{:?}", verification.unresolved);
    assert_eq!(verification.passes, 2);
    assert_eq!(service.calls(CallKind::Verification), 2);
    assert_eq!(run.timings.len(), 4);

    assert_eq!(sink.partial_updates("src/App.tsx"), 2);
    let statuses = sink.statuses("src/App.tsx");
    assert!(statuses.contains(&FileStatus::InProgress));
    assert_eq!(statuses.last(), Some(&FileStatus::Done));
}

#[tokio::test]
async fn generated_dependencies_precede_dependents() {
    let service = Arc::new(shop_service());
    let orch = orchestrator(&service, legacy_shop());

    let run = orch.run_all(SHOP_URL, &AbortSignal::new(), &RecordingSink::new()).await.unwrap();

    let order = service.generated_targets();
    assert_eq!(order.len(), SHOP_TARGETS.len());
    for (target, deps) in &run.schedule.dependencies {
        let at = order.iter().position(|t| t == target).unwrap();
        for dep in deps {
            if run.schedule.cyclic.contains(dep) {
                continue;
            }
            let dep_at = order.iter().position(|t| t == dep).unwrap();
            assert!(dep_at < at, "{dep} should precede {target}");
        }
    }
}

#[tokio::test]
async fn scope_filters_limit_analysis() {
    let service = Arc::new(shop_service());
    let config = MigrationConfig::new().with_scope(ScopeConfig {
        include: Vec::new(),
        exclude: vec!["vendor/".into(), "*.css".into()],
    });
    let orch = orchestrator(&service, legacy_shop()).with_config(config);

    let run = orch.analyze(SHOP_URL, &AbortSignal::new(), &RecordingSink::new()).await.unwrap();

    assert_eq!(
        paths(&run.scoped_files),
        ["README.md", "index.html", "js/api.js", "js/app.js", "js/cart.js"]
            .into_iter()
            .collect::<BTreeSet<_>>()
    );
    let prompt = service.requests()[0].contents.text();
    assert!(!prompt.contains("vendor/jquery.min.js"));
}

#[tokio::test]
async fn include_filter_matching_nothing_is_fatal() {
    let service = Arc::new(shop_service());
    let config = MigrationConfig::new().with_scope(ScopeConfig {
        include: vec!["server/".into()],
        exclude: Vec::new(),
    });
    let orch = orchestrator(&service, legacy_shop()).with_config(config);

    let err = orch.analyze(SHOP_URL, &AbortSignal::new(), &RecordingSink::new()).await.unwrap_err();
    assert!(matches!(err, MigrationError::EmptyScope(_)));
    assert_eq!(service.calls(CallKind::Analysis), 0);
}

#[tokio::test]
async fn missing_api_key_skips_diagram() {
    let service = Arc::new(shop_service().without_api_key());
    let sink = RecordingSink::new();
    let orch = orchestrator(&service, legacy_shop());

    let run = orch.analyze(SHOP_URL, &AbortSignal::new(), &sink).await.unwrap();
    assert!(run.diagram.is_none());
    assert_eq!(service.calls(CallKind::Diagram), 0);
    assert!(sink.has_log(Severity::Warning, "no API key"));
}

#[tokio::test]
async fn failed_file_does_not_stop_the_rest() {
    let service = Arc::new(shop_service().failing("src/styles.css", RemoteError::status(400, "blocked")));
    let sink = RecordingSink::new();
    let orch = orchestrator(&service, legacy_shop());

    let run = orch.run_all(SHOP_URL, &AbortSignal::new(), &sink).await.unwrap();

    let generation = run.generation.as_ref().unwrap();
    assert_eq!(generation.failed, vec!["src/styles.css"]);
    assert_eq!(generation.generated.len(), SHOP_TARGETS.len() - 1);
    assert_eq!(node(&run.tree, "src/styles.css").status, FileStatus::Error);
    assert_eq!(node(&run.tree, "src/App.tsx").status, FileStatus::Done);
    assert!(!run.generated_files().contains_key("src/styles.css"));
    assert!(run.verification.is_some());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let service = Arc::new(shop_service().flaky("src/api/client.ts", 2));
    let orch = orchestrator(&service, legacy_shop())
        .with_config(MigrationConfig::new().with_retry(RetryPolicy::default().with_max_retries(3)));

    let run = orch.run_all(SHOP_URL, &AbortSignal::new(), &RecordingSink::new()).await.unwrap();

    assert_eq!(node(&run.tree, "src/api/client.ts").status, FileStatus::Done);
    let attempts = service
        .generated_targets()
        .iter()
        .filter(|t| *t == "src/api/client.ts")
        .count();
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn verification_fixes_reach_the_scaffold() {
    let fix = serde_json::json!({
        "passed": false,
        "issues": [{"file": "src/cart/cart.ts", "message": "Cart should export a default"}],
        "fixes": [
            {"path": "src/cart/cart.ts", "content": "```ts\nexport default class Cart {}\n```"},
            {"path": "src/unknown.ts", "content": "x"}
        ]
    });
    let service = Arc::new(shop_service().with_verification(fix.to_string()));
    let sink = RecordingSink::new();
    let orch = orchestrator(&service, legacy_shop());

    let run = orch.run_all(SHOP_URL, &AbortSignal::new(), &sink).await.unwrap();

    assert_eq!(
        node(&run.tree, "src/cart/cart.ts").content.as_deref(),
        Some("export default class Cart {}\n")
    );
    assert_eq!(sink.fixes_applied(), vec![("src/cart/cart.ts".to_string(), 1)]);
    assert!(sink.has_log(Severity::Warning, "src/unknown.ts"));

    let verification = run.verification.unwrap();
    assert_eq!(verification.fixed_files_applied, 1);
    assert!(verification.passed);
    assert!(verification
        .issues
        .iter()
        .any(|i| i == "src/cart/cart.ts: Cart should export a default"));
}

#[tokio::test]
async fn broken_imports_stay_unresolved() {
    let service = Arc::new(
        shop_service().with_file("src/App.tsx", "import { Header } from './components/Header';\n"),
    );
    let orch = orchestrator(&service, legacy_shop());

    let run = orch.run_all(SHOP_URL, &AbortSignal::new(), &RecordingSink::new()).await.unwrap();

    let verification = run.verification.unwrap();
    assert!(!verification.passed);
    assert_eq!(
        verification.unresolved,
        vec!["src/App.tsx: unresolved import './components/Header'"]
    );
}

#[tokio::test]
async fn regenerate_uses_instructions() {
    let service = Arc::new(shop_service());
    let orch = orchestrator(&service, legacy_shop());
    let signal = AbortSignal::new();
    let sink = RecordingSink::new();
    let mut run = orch.run_all(SHOP_URL, &signal, &sink).await.unwrap();

    let generated = orch
        .regenerate_file(&mut run, "src/App.tsx", Some("Use function components with hooks"), &signal, &sink)
        .await
        .unwrap();

    assert!(generated);
    assert!(run.verification.is_none());
    let last = service.requests().pop().unwrap().contents.text();
    assert!(last.starts_with("Generate the file `src/App.tsx`"));
    assert!(last.contains("=== ADDITIONAL INSTRUCTIONS (highest priority) ==="));
    assert!(last.contains("Use function components with hooks"));

    let err = orch
        .regenerate_file(&mut run, "src/nope.ts", None, &signal, &sink)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::UnknownTarget(p) if p == "src/nope.ts"));
}

#[tokio::test]
async fn unreadable_sources_are_skipped_or_fatal() {
    let service = Arc::new(shop_service());
    let signal = AbortSignal::new();

    let sink = RecordingSink::new();
    let orch = orchestrator(
        &service,
        legacy_shop().with_unreadable("js/cart.js", RepoError::NotFound("js/cart.js".into())),
    );
    let mut run = orch.analyze(SHOP_URL, &signal, &sink).await.unwrap();
    orch.scaffold(&mut run, &signal, &sink).await.unwrap();
    assert!(!run.sources.contains_key("js/cart.js"));
    assert!(run.sources.contains_key("js/app.js"));
    assert!(sink.has_log(Severity::Warning, "Skipping js/cart.js"));

    let orch = orchestrator(
        &service,
        legacy_shop().with_unreadable("js/app.js", RepoError::Unauthorized("token expired".into())),
    );
    let mut run = orch.analyze(SHOP_URL, &signal, &sink).await.unwrap();
    let err = orch.scaffold(&mut run, &signal, &sink).await.unwrap_err();
    assert!(matches!(err, MigrationError::Repository(RepoError::Unauthorized(_))));
}

#[tokio::test]
async fn empty_plan_is_fatal() {
    let service = Arc::new(shop_service().with_structure("I could not decide on a layout."));
    let orch = orchestrator(&service, legacy_shop());
    let signal = AbortSignal::new();

    let mut run = orch.analyze(SHOP_URL, &signal, &RecordingSink::new()).await.unwrap();
    let err = orch.scaffold(&mut run, &signal, &RecordingSink::new()).await.unwrap_err();
    assert!(matches!(err, MigrationError::EmptyScaffold));
    assert!(!run.is_scaffolded());
}

#[tokio::test]
async fn repeated_reads_hit_the_cache() {
    let service = Arc::new(shop_service());
    let repo = Arc::new(legacy_shop());
    let orch = Orchestrator::new(service.clone(), repo.clone()).with_cache(SourceCache::new(64));
    let signal = AbortSignal::new();
    let sink = RecordingSink::new();

    let mut run = orch.analyze(SHOP_URL, &signal, &sink).await.unwrap();
    orch.scaffold(&mut run, &signal, &sink).await.unwrap();
    let first = repo.reads();
    assert!(first > 0);

    let mut again = orch.analyze(SHOP_URL, &signal, &sink).await.unwrap();
    orch.scaffold(&mut again, &signal, &sink).await.unwrap();
    assert_eq!(repo.reads(), first);
    assert_eq!(again.sources, run.sources);
}

#[tokio::test]
async fn structure_failure_surfaces_repository_error() {
    let service = Arc::new(shop_service());
    let orch = orchestrator(
        &service,
        legacy_shop().with_structure_error(RepoError::NotFound(SHOP_URL.into())),
    );

    let err = orch.run_all(SHOP_URL, &AbortSignal::new(), &RecordingSink::new()).await.unwrap_err();
    assert!(matches!(err, MigrationError::Repository(RepoError::NotFound(_))));
    assert!(err.is_fatal());
}
