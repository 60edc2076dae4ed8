//! Generation priority tiers
//!
//! Tie-break for the scheduler's ready queue: configuration first, tests
//! last.

use migra_artifact::paths;
use serde::{Deserialize, Serialize};

/// Priority tier, declared in descending priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityTier {
    /// Root configuration / manifest files
    RootConfig,
    /// Shared library, types, hooks and state containers
    Shared,
    /// UI components
    Component,
    /// Backend / API routes
    Api,
    /// Everything else
    Other,
    /// Test files
    Test,
}

const ROOT_CONFIG_NAMES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "jsconfig.json",
    "cargo.toml",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "composer.json",
    "dockerfile",
    "makefile",
    ".gitignore",
    ".env",
    ".env.example",
    ".eslintrc",
    ".prettierrc",
];

const CONFIG_EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

const SHARED_SEGMENTS: &[&str] = &[
    "lib", "libs", "utils", "util", "helpers", "types", "typings", "hooks", "store", "stores",
    "state", "context", "contexts", "shared", "common", "constants", "models", "config",
];

const SHARED_STEMS: &[&str] = &["types", "constants", "utils", "store", "config"];

pub(crate) const API_SEGMENTS: &[&str] = &[
    "api", "apis", "routes", "controllers", "handlers", "endpoints", "server",
];

const UI_SEGMENTS: &[&str] = &[
    "components", "component", "ui", "pages", "views", "layouts", "screens", "widgets",
];

const UI_EXTENSIONS: &[&str] = &["tsx", "jsx", "vue", "svelte"];

const TEST_SEGMENTS: &[&str] = &["test", "tests", "__tests__", "spec", "e2e"];

/// Classify a target path
///
/// Checked in order: test, root config, shared, API, UI, other.
#[must_use]
pub fn priority_tier(path: &str) -> PriorityTier {
    let name = paths::file_name(path).to_ascii_lowercase();
    let dirs: Vec<String> = paths::dir_segments(path)
        .map(str::to_ascii_lowercase)
        .collect();
    let has_dir = |set: &[&str]| dirs.iter().any(|d| set.contains(&d.as_str()));

    if is_test_name(&name) || has_dir(TEST_SEGMENTS) {
        return PriorityTier::Test;
    }
    if dirs.is_empty() && is_root_config_name(&name) {
        return PriorityTier::RootConfig;
    }
    let stem = paths::file_stem(&name);
    let hook = is_hook_name(paths::file_name(path)) && !has_dir(UI_SEGMENTS);
    if has_dir(SHARED_SEGMENTS) || SHARED_STEMS.contains(&stem) || hook {
        return PriorityTier::Shared;
    }
    if has_dir(API_SEGMENTS) {
        return PriorityTier::Api;
    }
    let ext = paths::extension(&name).unwrap_or("");
    if has_dir(UI_SEGMENTS) || UI_EXTENSIONS.contains(&ext) {
        return PriorityTier::Component;
    }
    PriorityTier::Other
}

/// Whether a path lives under an API-like directory segment
#[must_use]
pub fn is_api_path(path: &str) -> bool {
    paths::dir_segments(path).any(|d| API_SEGMENTS.contains(&d.to_ascii_lowercase().as_str()))
}

/// `useThing.ts` style hook modules
fn is_hook_name(name: &str) -> bool {
    name.strip_prefix("use")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

fn is_test_name(name: &str) -> bool {
    name.contains(".test.") || name.contains(".spec.") || name.ends_with("_test.go")
}

fn is_root_config_name(name: &str) -> bool {
    if ROOT_CONFIG_NAMES.contains(&name) || name.starts_with(".env") {
        return true;
    }
    let ext = paths::extension(name).unwrap_or("");
    if CONFIG_EXTENSIONS.contains(&ext) {
        return true;
    }
    // vite.config.ts, next.config.mjs, tailwind.config.js ...
    paths::strip_extension(name).ends_with(".config")
}
