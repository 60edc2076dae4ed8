use migra_artifact::{flatten_files, FileStatus};
use migra_core::{MigrationSession, Orchestrator, RunState};
use migra_test_utils::{init_tracing, legacy_shop, node, shop_service, RecordingSink, ScriptedService, SHOP_URL};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn session(service: &Arc<ScriptedService>) -> MigrationSession {
    init_tracing();
    MigrationSession::new(Orchestrator::new(service.clone(), Arc::new(legacy_shop())))
}

#[tokio::test]
async fn completed_run_produces_a_report() {
    let service = Arc::new(shop_service());
    let mut session = session(&service);
    let sink = RecordingSink::new();

    let generated = session.run(SHOP_URL, &sink).await.unwrap().generated_files().len();
    assert_eq!(generated, 5);
    assert_eq!(session.state(), &RunState::Completed);

    let report = session.report().unwrap();
    assert_eq!(report.run_id, session.run_id().map(|id| id.to_string()));
    assert_eq!(report.generated, 5);
    assert!(report.failed.is_empty());
    let md = report.to_markdown();
    assert!(md.contains("- Stack: jQuery -> React + TypeScript"));
    assert!(md.contains("passed after 2 passes"));
}

#[tokio::test]
async fn cancellation_mid_generation_returns_to_idle() {
    let service = Arc::new(shop_service());
    let mut session = session(&service);
    let signal = session.begin_run();
    service.cancel_when_generating("src/cart/cart.ts", signal.clone());

    let err = session.run(SHOP_URL, &RecordingSink::new()).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(signal.is_aborted());
    assert_eq!(session.state(), &RunState::Idle);

    let run = session.current().unwrap();
    assert_eq!(node(&run.tree, "src/cart/cart.ts").status, FileStatus::Pending);
    assert!(flatten_files(&run.tree)
        .iter()
        .all(|n| n.status != FileStatus::InProgress && n.status != FileStatus::Error));
    assert!(run.verification.is_none());
}

#[tokio::test]
async fn new_run_after_cancel_starts_fresh() {
    let service = Arc::new(shop_service());
    let mut session = session(&service);
    let first = session.begin_run();
    let first_id = session.run_id();
    session.cancel();
    assert!(first.is_aborted());

    session.run(SHOP_URL, &RecordingSink::new()).await.unwrap();
    assert_ne!(session.run_id(), first_id);
    assert_eq!(session.state(), &RunState::Completed);
}

#[tokio::test]
async fn regenerate_and_reverify_through_session() {
    let service = Arc::new(shop_service());
    let mut session = session(&service);
    let sink = RecordingSink::new();
    session.run(SHOP_URL, &sink).await.unwrap();

    let regenerated = session
        .regenerate_file("src/styles.css", Some("Use CSS variables"), &sink)
        .await
        .unwrap();
    assert!(regenerated);
    assert_eq!(session.state(), &RunState::Completed);
    assert!(session.current().unwrap().verification.is_none());

    let verification = session.verify(&sink).await.unwrap();
    assert!(verification.passed);
    assert!(session.current().unwrap().verification.is_some());
}
