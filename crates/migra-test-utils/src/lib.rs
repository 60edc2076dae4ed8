//! Testing utilities for Migra workspace
//!
//! Shared fakes and fixtures: a scripted generation service, an in-memory
//! repository, a recording event sink and a small legacy jQuery shop.

#![allow(missing_docs)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use migra_artifact::{build_tree, FileNode, FileStatus};
use migra_core::prompts::{ANALYSIS_SYSTEM, GENERATION_SYSTEM, STRUCTURE_SYSTEM, VERIFICATION_SYSTEM};
use migra_core::{EventSink, LogEntry, MigrationEvent, RepoError, RepositoryProvider, Severity};
use migra_remote::{
    AbortSignal, ChunkStream, GenerationService, InlineData, RemoteError, ServiceRequest, ServiceResponse,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

/// Install a test subscriber honoring `RUST_LOG`, once per process
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Target path named by a generation prompt
pub fn generation_target(prompt: &str) -> Option<&str> {
    let rest = prompt.strip_prefix("Generate the file `")?;
    rest.split('`').next()
}

/// Request kind, recognized by its system instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Analysis,
    Structure,
    Generation,
    Verification,
    Diagram,
    Unknown,
}

impl CallKind {
    pub fn of(request: &ServiceRequest) -> Self {
        if request.config.image.is_some() {
            return Self::Diagram;
        }
        match request.config.system_instruction.as_deref() {
            Some(ANALYSIS_SYSTEM) => Self::Analysis,
            Some(STRUCTURE_SYSTEM) => Self::Structure,
            Some(GENERATION_SYSTEM) => Self::Generation,
            Some(VERIFICATION_SYSTEM) => Self::Verification,
            _ => Self::Unknown,
        }
    }
}

/// Generation service answering from a script
///
/// Generation answers stream in two chunks. Unscripted generation targets get
/// a one-line module; unscripted verification passes report success.
pub struct ScriptedService {
    analysis: String,
    structure: String,
    files: HashMap<String, String>,
    verifications: Mutex<VecDeque<String>>,
    image: Option<InlineData>,
    failing: HashMap<String, RemoteError>,
    transient: Mutex<HashMap<String, usize>>,
    cancel_on: Mutex<Option<(String, AbortSignal)>>,
    requests: Mutex<Vec<ServiceRequest>>,
    api_key: bool,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self {
            analysis: "{}".to_string(),
            structure: "[]".to_string(),
            files: HashMap::new(),
            verifications: Mutex::new(VecDeque::new()),
            image: None,
            failing: HashMap::new(),
            transient: Mutex::new(HashMap::new()),
            cancel_on: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            api_key: true,
        }
    }
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_analysis(mut self, text: impl Into<String>) -> Self {
        self.analysis = text.into();
        self
    }

    #[must_use]
    pub fn with_structure(mut self, text: impl Into<String>) -> Self {
        self.structure = text.into();
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.files.insert(path.to_string(), content.into());
        self
    }

    /// Queue the raw answer of the next verification pass
    #[must_use]
    pub fn with_verification(self, text: impl Into<String>) -> Self {
        lock(&self.verifications).push_back(text.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, mime_type: &str, data: &str) -> Self {
        self.image = Some(InlineData {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        });
        self
    }

    /// Generation of `path` always fails with `error`
    #[must_use]
    pub fn failing(mut self, path: &str, error: RemoteError) -> Self {
        self.failing.insert(path.to_string(), error);
        self
    }

    /// Generation of `path` fails with a retryable status `times` times
    #[must_use]
    pub fn flaky(self, path: &str, times: usize) -> Self {
        lock(&self.transient).insert(path.to_string(), times);
        self
    }

    #[must_use]
    pub fn without_api_key(mut self) -> Self {
        self.api_key = false;
        self
    }

    /// Cancel `signal` when generation of `path` is requested
    pub fn cancel_when_generating(&self, path: &str, signal: AbortSignal) {
        *lock(&self.cancel_on) = Some((path.to_string(), signal));
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<ServiceRequest> {
        lock(&self.requests).clone()
    }

    pub fn calls(&self, kind: CallKind) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| CallKind::of(r) == kind)
            .count()
    }

    /// Generation targets in request order
    pub fn generated_targets(&self) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .filter(|r| CallKind::of(r) == CallKind::Generation)
            .filter_map(|r| generation_target(&r.contents.text()).map(str::to_string))
            .collect()
    }

    fn generate(&self, prompt: &str) -> Result<String, RemoteError> {
        let target = generation_target(prompt)
            .ok_or_else(|| RemoteError::Malformed("prompt names no target".into()))?;

        let cancel = lock(&self.cancel_on)
            .as_ref()
            .filter(|(path, _)| path == target)
            .map(|(_, signal)| signal.clone());
        if let Some(signal) = cancel {
            signal.cancel();
            return Err(RemoteError::Aborted);
        }
        if let Some(err) = self.failing.get(target) {
            return Err(err.clone());
        }
        if let Some(left) = lock(&self.transient).get_mut(target) {
            if *left > 0 {
                *left -= 1;
                return Err(RemoteError::status(503, "overloaded"));
            }
        }
        Ok(self
            .files
            .get(target)
            .cloned()
            .unwrap_or_else(|| format!("// {target}\nexport {{}};\n")))
    }

    fn answer(&self, request: &ServiceRequest) -> Result<ServiceResponse, RemoteError> {
        lock(&self.requests).push(request.clone());
        match CallKind::of(request) {
            CallKind::Analysis => Ok(ServiceResponse::text(self.analysis.clone())),
            CallKind::Structure => Ok(ServiceResponse::text(self.structure.clone())),
            CallKind::Generation => self.generate(&request.contents.text()).map(ServiceResponse::text),
            CallKind::Verification => Ok(ServiceResponse::text(
                lock(&self.verifications)
                    .pop_front()
                    .unwrap_or_else(|| r#"{"passed": true, "issues": []}"#.to_string()),
            )),
            CallKind::Diagram => match &self.image {
                Some(image) => Ok(ServiceResponse {
                    text: None,
                    inline_data: vec![image.clone()],
                }),
                None => Err(RemoteError::status(400, "image output not supported")),
            },
            CallKind::Unknown => Err(RemoteError::Other("unscripted request".into())),
        }
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn request(
        &self,
        request: ServiceRequest,
        signal: &AbortSignal,
    ) -> Result<ServiceResponse, RemoteError> {
        signal.check()?;
        self.answer(&request)
    }

    async fn request_stream<'a>(
        &'a self,
        request: ServiceRequest,
        signal: &'a AbortSignal,
    ) -> Result<ChunkStream<'a>, RemoteError> {
        signal.check()?;
        let text = self.answer(&request)?.text.unwrap_or_default();
        let mut split = text.len() / 2;
        while !text.is_char_boundary(split) {
            split -= 1;
        }
        let (head, tail) = text.split_at(split);
        let chunks = vec![Ok(head.to_string()), Ok(tail.to_string())];
        Ok(stream::iter(chunks).boxed())
    }

    fn has_api_key(&self) -> bool {
        self.api_key
    }
}

/// Repository served from memory
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    files: BTreeMap<String, String>,
    failures: HashMap<String, RepoError>,
    structure_error: Option<RepoError>,
    reads: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.files.insert(path.to_string(), content.into());
        self
    }

    /// Listed in the tree, but reading it fails with `error`
    #[must_use]
    pub fn with_unreadable(mut self, path: &str, error: RepoError) -> Self {
        self.files.entry(path.to_string()).or_default();
        self.failures.insert(path.to_string(), error);
        self
    }

    #[must_use]
    pub fn with_structure_error(mut self, error: RepoError) -> Self {
        self.structure_error = Some(error);
        self
    }

    /// Content reads served so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepository {
    async fn fetch_structure(&self, _url: &str) -> Result<Vec<FileNode>, RepoError> {
        match &self.structure_error {
            Some(err) => Err(err.clone()),
            None => Ok(build_tree(self.files.keys())),
        }
    }

    async fn fetch_file_content(&self, _url: &str, path: &str) -> Result<String, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.get(path) {
            return Err(err.clone());
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(path.to_string()))
    }
}

/// Sink keeping every event
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        lock(&self.events).clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                MigrationEvent::Log(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn has_log(&self, severity: Severity, needle: &str) -> bool {
        self.logs()
            .iter()
            .any(|l| l.severity == severity && l.message.contains(needle))
    }

    /// Status transitions reported for `path`
    pub fn statuses(&self, path: &str) -> Vec<FileStatus> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                MigrationEvent::FileStatus { path: p, status } if p == path => Some(*status),
                _ => None,
            })
            .collect()
    }

    /// Number of partial content updates for `path`
    pub fn partial_updates(&self, path: &str) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| matches!(e, MigrationEvent::FileContent { path: p, partial: true, .. } if p == path))
            .count()
    }

    pub fn fixes_applied(&self) -> Vec<(String, usize)> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                MigrationEvent::FixApplied { path, pass } => Some((path.clone(), *pass)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: MigrationEvent) {
        lock(&self.events).push(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub const SHOP_URL: &str = "https://github.com/acme/legacy-shop";

/// Legacy jQuery storefront
pub fn legacy_shop() -> InMemoryRepository {
    InMemoryRepository::new()
        .with_file("README.md", "# Legacy Shop\n\nA jQuery storefront with a cart.")
        .with_file(
            "index.html",
            "<html><body><div id=\"app\"></div><script src=\"js/app.js\"></script></body></html>",
        )
        .with_file(
            "js/app.js",
            "import { fetchProducts } from './api';\nimport { Cart } from './cart';\n\
             $(function () { fetchProducts().then(render); });",
        )
        .with_file(
            "js/api.js",
            "export function fetchProducts() { return $.getJSON('/api/products'); }",
        )
        .with_file(
            "js/cart.js",
            "import { fetchProducts } from './api';\nexport function Cart() { this.items = []; }",
        )
        .with_file("css/style.css", "body { font-family: sans-serif; }")
        .with_file("vendor/jquery.min.js", "/*! jQuery v1.12.4 */")
}

pub fn shop_analysis() -> String {
    serde_json::json!({
        "summary": "jQuery storefront with product listing and cart",
        "complexity": "Medium",
        "dependencies": ["jquery"],
        "patterns": ["module pattern", "DOM manipulation"],
        "risks": ["global state in cart"],
        "sourceFramework": "jQuery",
        "recommendedTarget": "React + TypeScript",
        "architecture": "Single page with REST calls",
        "mappings": [
            {"sourcePath": "js/app.js", "targetPath": "src/App.tsx", "confidence": 0.9}
        ]
    })
    .to_string()
}

pub const SHOP_TARGETS: &[&str] = &[
    "package.json",
    "src/App.tsx",
    "src/api/client.ts",
    "src/cart/cart.ts",
    "src/styles.css",
];

/// Scripted backend producing a consistent React port of [`legacy_shop`]
pub fn shop_service() -> ScriptedService {
    ScriptedService::new()
        .with_analysis(shop_analysis())
        .with_structure(serde_json::json!({ "files": SHOP_TARGETS }).to_string())
        .with_image("image/png", "iVBORw0KGgo=")
        .with_file("package.json", "{ \"name\": \"shop\" }\n")
        .with_file(
            "src/App.tsx",
            "```tsx\nimport { fetchProducts } from './api/client';\nimport { Cart } from './cart/cart';\n\
             export default function App() { return null; }\n```",
        )
        .with_file(
            "src/api/client.ts",
            "export async function fetchProducts() { return fetch('/api/products'); }\n",
        )
        .with_file(
            "src/cart/cart.ts",
            "import { fetchProducts } from '../api/client';\nexport class Cart { items: string[] = []; }\n",
        )
        .with_file("src/styles.css", "body { font-family: sans-serif; }\n")
}

/// File node for `path` in `tree`
pub fn node<'a>(tree: &'a [FileNode], path: &str) -> &'a FileNode {
    migra_artifact::find(tree, path).unwrap_or_else(|| panic!("{path} not in tree"))
}
