//! Cross-file verification
//!
//! Each pass snapshots the generated project, runs the static check, asks the
//! service for a verdict and whole-file fixes, and applies fixes that target
//! existing files. Every configured pass runs, so fixes always get a second
//! look.
//!
//! The final verdict passes iff the post-fix snapshot is statically clean
//! and the last remote pass left no issue without a fix.

use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::events::{Emitter, EventSink, Phase};
use crate::prompts::{verification_prompt, VERIFICATION_SYSTEM};
use crate::response::{parse_verification, strip_code_fences, RemoteVerdict};
use indexmap::IndexSet;
use migra_artifact::{paths, VerificationResult};
use migra_graph::{relative_imports, resolve_target};
use migra_remote::{with_retry, AbortSignal, GenerationService, ServiceRequest};
use std::collections::{BTreeMap, BTreeSet};

/// Generated path -> content
pub type ProjectFiles = BTreeMap<String, String>;

/// Structural issues in a generated project
///
/// Reports empty files and relative imports that resolve to no file by exact
/// path, an appended known extension or a directory index file.
#[must_use]
pub fn static_check(files: &ProjectFiles) -> Vec<String> {
    let mut issues = Vec::new();
    for (path, content) in files {
        if content.trim().is_empty() {
            issues.push(format!("{path}: file is empty"));
            continue;
        }
        for specifier in relative_imports(content) {
            let target = paths::resolve_relative(path, &specifier);
            if resolve_target(&target, |c| files.contains_key(c)).is_none() {
                issues.push(format!("{path}: unresolved import '{specifier}'"));
            }
        }
    }
    issues
}

/// Result of the verification loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Verdict and issues
    pub result: VerificationResult,
    /// Final snapshot with fixes applied
    pub files: ProjectFiles,
    /// Paths replaced by at least one fix
    pub fixed: BTreeSet<String>,
}

/// Multi-pass verifier
pub struct Verifier<'a> {
    service: &'a dyn GenerationService,
    config: &'a MigrationConfig,
}

impl std::fmt::Debug for Verifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("passes", &self.config.verification_passes)
            .finish_non_exhaustive()
    }
}

impl<'a> Verifier<'a> {
    /// Verifier using `config`'s model, retry policy and pass count
    #[must_use]
    pub fn new(service: &'a dyn GenerationService, config: &'a MigrationConfig) -> Self {
        Self { service, config }
    }

    async fn remote_pass(
        &self,
        snapshot: &ProjectFiles,
        static_issues: &[String],
        pass: usize,
        passes: usize,
        signal: &AbortSignal,
        emitter: &Emitter<'_>,
    ) -> Result<RemoteVerdict, MigrationError> {
        let prompt = verification_prompt(
            snapshot,
            static_issues,
            pass,
            passes,
            self.config.context.legacy_total_chars,
        );
        let request = ServiceRequest::new(&self.config.models.verification, prompt)
            .with_system(VERIFICATION_SYSTEM)
            .json()
            .with_thinking_budget(self.config.thinking.verification);
        let label = format!("verification pass {pass}");

        let response = with_retry(&self.config.retry, signal, &label, || {
            self.service.request(request.clone(), signal)
        })
        .await;

        match response {
            Ok(response) => {
                let mut verdict = parse_verification(response.text_or_empty());
                if verdict.malformed {
                    let issue = format!("Verification pass {pass} returned an unreadable response");
                    emitter.warn(issue.clone());
                    verdict.issues.push(issue);
                }
                Ok(verdict)
            }
            Err(err) if err.is_abort() => Err(MigrationError::Cancelled),
            Err(err) => {
                let issue = format!("Verification pass {pass} failed: {err}");
                emitter.warn(issue.clone());
                Ok(RemoteVerdict {
                    issues: vec![issue],
                    ..RemoteVerdict::default()
                })
            }
        }
    }

    /// Run every configured pass over `files`
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Cancelled`] when `signal` fires. Remote
    /// failures become issues instead.
    pub async fn run(
        &self,
        files: ProjectFiles,
        signal: &AbortSignal,
        sink: &dyn EventSink,
    ) -> Result<VerificationOutcome, MigrationError> {
        let emitter = Emitter::new(sink, Phase::Verify);
        let passes = usize::try_from(self.config.verification_passes.max(1)).unwrap_or(1);
        let mut snapshot = files;
        let mut issues: IndexSet<String> = IndexSet::new();
        let mut fixed = BTreeSet::new();
        let mut fixed_files_applied = 0;
        let mut last_issues = Vec::new();
        let mut last_fixed = BTreeSet::new();

        for pass in 1..=passes {
            signal.check()?;
            let static_issues = static_check(&snapshot);
            emitter.info(format!(
                "Verification pass {pass}/{passes}: {} files, {} static issues",
                snapshot.len(),
                static_issues.len()
            ));

            let verdict = self
                .remote_pass(&snapshot, &static_issues, pass, passes, signal, &emitter)
                .await?;

            let mut applied = BTreeSet::new();
            for fix in verdict.fixes {
                match snapshot.get_mut(&fix.path) {
                    Some(content) => {
                        *content = strip_code_fences(&fix.content);
                        emitter.fix_applied(&fix.path, pass);
                        applied.insert(fix.path);
                    }
                    None => emitter.warn(format!("Ignoring fix for unknown file {}", fix.path)),
                }
            }
            fixed_files_applied += applied.len();
            fixed.extend(applied.iter().cloned());

            issues.extend(static_issues);
            issues.extend(verdict.issues.iter().cloned());
            last_issues = verdict.issues;
            last_fixed = applied;
        }

        let final_static = static_check(&snapshot);
        let mut unresolved: IndexSet<String> = final_static.iter().cloned().collect();
        unresolved.extend(
            last_issues
                .into_iter()
                .filter(|issue| last_fixed.is_empty() || !last_fixed.iter().any(|p| issue.contains(p.as_str()))),
        );
        issues.extend(final_static);

        let result = VerificationResult {
            passed: unresolved.is_empty(),
            issues: issues.into_iter().collect(),
            unresolved: unresolved.into_iter().collect(),
            fixed_files_applied,
            passes,
        };
        if result.passed {
            emitter.success(format!(
                "Verification passed after {passes} passes, {fixed_files_applied} fixes applied"
            ));
        } else {
            emitter.warn(format!(
                "Verification found {} unresolved issues",
                result.unresolved.len()
            ));
        }
        emitter.verification(&result);

        Ok(VerificationOutcome {
            result,
            files: snapshot,
            fixed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use async_trait::async_trait;
    use migra_remote::{RemoteError, RetryPolicy, ServiceResponse};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn files(pairs: &[(&str, &str)]) -> ProjectFiles {
        pairs
            .iter()
            .map(|(p, c)| ((*p).to_string(), (*c).to_string()))
            .collect()
    }

    /// Replays canned responses, one per call; repeats the last one
    struct Canned {
        responses: Mutex<Vec<Result<String, RemoteError>>>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(responses: Vec<Result<&str, RemoteError>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationService for Canned {
        async fn request(
            &self,
            _request: ServiceRequest,
            _signal: &AbortSignal,
        ) -> Result<ServiceResponse, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.pop().unwrap()
            } else {
                responses.last().cloned().unwrap()
            };
            next.map(ServiceResponse::text)
        }
    }

    fn config() -> MigrationConfig {
        MigrationConfig::default().with_retry(RetryPolicy::none())
    }

    #[test]
    fn static_check_finds_broken_imports_and_empty_files() {
        let project = files(&[
            ("src/app.ts", "import { api } from './lib/api';\nimport './styles.css';\nimport x from './missing';"),
            ("src/lib/api/index.ts", "export const api = 1;"),
            ("src/styles.css", "body {}"),
            ("src/empty.ts", "  \n"),
        ]);
        assert_eq!(
            static_check(&project),
            vec!["src/app.ts: unresolved import './missing'", "src/empty.ts: file is empty"]
        );
    }

    #[tokio::test]
    async fn clean_project_passes_without_fixes() {
        let service = Canned::new(vec![Ok(r#"{"passed": true, "issues": [], "fixes": []}"#)]);
        let config = config();
        let outcome = Verifier::new(&service, &config)
            .run(files(&[("a.ts", "export {}")]), &AbortSignal::new(), &NullSink)
            .await
            .unwrap();

        assert!(outcome.result.passed);
        assert_eq!(outcome.result.fixed_files_applied, 0);
        assert_eq!(outcome.result.passes, 2);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fixes_are_applied_and_rechecked() {
        let service = Canned::new(vec![
            Ok(r#"{"passed": false, "issues": ["a.ts: unresolved import './b'"],
                   "fixes": [{"path": "a.ts", "content": "import { b } from './c';"},
                             {"path": "ghost.ts", "content": "x"}]}"#),
            Ok(r#"{"passed": true, "issues": []}"#),
        ]);
        let config = config();
        let outcome = Verifier::new(&service, &config)
            .run(
                files(&[("a.ts", "import { b } from './b';"), ("c.ts", "export const b = 1;")]),
                &AbortSignal::new(),
                &NullSink,
            )
            .await
            .unwrap();

        assert!(outcome.result.passed);
        assert_eq!(outcome.result.fixed_files_applied, 1);
        assert_eq!(outcome.fixed, BTreeSet::from(["a.ts".to_string()]));
        assert_eq!(outcome.files["a.ts"], "import { b } from './c';");
        assert_eq!(outcome.result.issues, vec!["a.ts: unresolved import './b'"]);
        assert!(!outcome.files.contains_key("ghost.ts"));
    }

    #[tokio::test]
    async fn final_issues_without_fixes_fail() {
        let service = Canned::new(vec![Ok(r#"{"passed": false, "issues": ["naming mismatch in a.ts"]}"#)]);
        let config = config();
        let outcome = Verifier::new(&service, &config)
            .run(files(&[("a.ts", "export {}")]), &AbortSignal::new(), &NullSink)
            .await
            .unwrap();

        assert!(!outcome.result.passed);
        assert_eq!(outcome.result.unresolved, vec!["naming mismatch in a.ts"]);
        assert_eq!(outcome.result.issues.len(), 1);
    }

    #[tokio::test]
    async fn issues_accompanied_by_fixes_resolve() {
        let service = Canned::new(vec![Ok(
            r#"{"passed": false, "issues": ["b.ts: wrong export"], "fixes": [{"path": "b.ts", "content": "export const b = 2;"}]}"#,
        )]);
        let config = config();
        let outcome = Verifier::new(&service, &config)
            .run(files(&[("b.ts", "export const b = 1;")]), &AbortSignal::new(), &NullSink)
            .await
            .unwrap();

        assert!(outcome.result.passed);
        assert_eq!(outcome.result.fixed_files_applied, 2);
    }

    #[tokio::test]
    async fn remote_failure_is_recorded_not_fatal() {
        let service = Canned::new(vec![Err(RemoteError::status(400, "bad"))]);
        let config = config();
        let outcome = Verifier::new(&service, &config)
            .run(files(&[("a.ts", "export {}")]), &AbortSignal::new(), &NullSink)
            .await
            .unwrap();

        assert!(!outcome.result.passed);
        assert_eq!(outcome.result.passes, 2);
        assert!(outcome.result.issues[0].starts_with("Verification pass 1 failed"));
        assert_eq!(outcome.result.unresolved.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let service = Canned::new(vec![Ok("{}")]);
        let config = config();
        let signal = AbortSignal::new();
        signal.cancel();
        let err = Verifier::new(&service, &config)
            .run(files(&[("a.ts", "x")]), &signal, &NullSink)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
