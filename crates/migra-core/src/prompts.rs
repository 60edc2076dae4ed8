//! Prompt templates
//!
//! One builder per remote call. Builders are pure string assembly so they
//! can be tested without a service.

use migra_artifact::AnalysisResult;
use migra_planner::{truncate, ContextBlock};
use std::collections::BTreeMap;

/// System instruction for the analysis call
pub const ANALYSIS_SYSTEM: &str = "You are a senior software architect planning the migration of a \
legacy codebase to a modern stack. Answer with a single JSON object and nothing else.";

/// System instruction for the structure call
pub const STRUCTURE_SYSTEM: &str = "You design file layouts for modern projects. Answer with a JSON \
array of file paths and nothing else.";

/// System instruction for file generation
pub const GENERATION_SYSTEM: &str = "You are an expert engineer rewriting legacy code for a modern \
stack. Output only the complete content of the requested file, in one fenced code block.";

/// System instruction for verification passes
pub const VERIFICATION_SYSTEM: &str = "You review generated projects for cross-file consistency. \
Answer with a single JSON object and nothing else.";

/// Analysis request
#[must_use]
pub fn analysis_prompt(
    repo_url: &str,
    file_paths: &[String],
    readme: Option<&str>,
    target_stack: Option<&str>,
) -> String {
    let mut prompt = format!("Analyze the legacy repository at {repo_url}.\n\n");
    if let Some(stack) = target_stack {
        prompt.push_str(&format!("The requested target stack is: {stack}\n\n"));
    }
    prompt.push_str("Files in scope:\n");
    for path in file_paths {
        prompt.push_str("- ");
        prompt.push_str(path);
        prompt.push('\n');
    }
    if let Some(readme) = readme.filter(|r| !r.trim().is_empty()) {
        let (readme, _) = truncate(readme, 8_000);
        prompt.push_str("\nREADME:\n");
        prompt.push_str(&readme);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nReturn JSON with the fields: summary, complexity (Low|Medium|High), dependencies, \
patterns, risks, sourceFramework, recommendedTarget, architecture, migrationNotes, and \
mappings: an array of {sourcePath, targetPath, rationale, confidence} pairing legacy files \
with the target files they become.",
    );
    prompt
}

/// Scaffold structure request
#[must_use]
pub fn structure_prompt(analysis: &AnalysisResult, overview: &ContextBlock, target_stack: Option<&str>) -> String {
    let target = target_stack.unwrap_or(&analysis.recommended_target);
    let mut prompt = format!(
        "Plan the complete file structure of the migrated project.\n\nTarget stack: {target}\n\
Legacy framework: {}\nArchitecture: {}\n",
        analysis.source_framework, analysis.architecture
    );
    if let Some(notes) = &analysis.migration_notes {
        prompt.push_str(&format!("Migration notes: {notes}\n"));
    }
    prompt.push_str("\nLegacy sources:\n");
    prompt.push_str(&overview.text);
    prompt.push_str(
        "\n\nReturn a JSON array of root-relative file paths (no directories) for every file \
the new project needs, including configuration and manifest files.",
    );
    prompt
}

/// Single-file generation request
#[must_use]
pub fn generation_prompt(
    target: &str,
    analysis: &AnalysisResult,
    context: &ContextBlock,
    all_targets: &[String],
) -> String {
    let mut prompt = format!(
        "Generate the file `{target}` of the migrated project.\n\nTarget stack: {}\nMigration summary: {}\n",
        analysis.recommended_target, analysis.summary
    );
    prompt.push_str("\nProject files (import only from these):\n");
    for path in all_targets {
        prompt.push_str("- ");
        prompt.push_str(path);
        prompt.push('\n');
    }
    if context.is_empty() {
        prompt.push_str("\nNo legacy source corresponds to this file; write it from the project plan.\n");
    } else {
        prompt.push_str("\nLegacy context:\n");
        prompt.push_str(&context.text);
        prompt.push('\n');
    }
    prompt.push_str(&format!("\nOutput only the full content of `{target}`."));
    prompt
}

/// Verification pass request
///
/// `budget` caps the embedded project snapshot.
#[must_use]
pub fn verification_prompt(
    files: &BTreeMap<String, String>,
    static_issues: &[String],
    pass: usize,
    passes: usize,
    budget: usize,
) -> String {
    let mut prompt = format!(
        "Verification pass {pass} of {passes}. Check the project below for broken imports, \
missing exports, mismatched names and inconsistent types between files.\n"
    );
    if !static_issues.is_empty() {
        prompt.push_str("\nStatic check found:\n");
        for issue in static_issues {
            prompt.push_str("- ");
            prompt.push_str(issue);
            prompt.push('\n');
        }
    }
    let mut snapshot = String::new();
    for (path, content) in files {
        snapshot.push_str(&format!("=== FILE: {path} ===\n{content}\n\n"));
    }
    let (snapshot, _) = truncate(&snapshot, budget);
    prompt.push_str("\nProject:\n");
    prompt.push_str(&snapshot);
    prompt.push_str(
        "\nReturn JSON {\"passed\": bool, \"issues\": [string], \"fixes\": [{\"path\": string, \
\"content\": string}]} where each fix is the complete corrected content of an existing file.",
    );
    prompt
}

/// Architecture diagram request
#[must_use]
pub fn diagram_prompt(analysis: &AnalysisResult) -> String {
    format!(
        "Draw a clean architecture diagram of the migrated system.\n\nTarget stack: {}\n\
Architecture: {}\nKey patterns: {}",
        analysis.recommended_target,
        analysis.architecture,
        analysis.patterns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_lists_files_and_readme() {
        let files = vec!["index.html".to_string(), "js/app.js".to_string()];
        let prompt = analysis_prompt("https://example.com/legacy", &files, Some("# Legacy"), Some("React"));
        assert!(prompt.contains("- js/app.js"));
        assert!(prompt.contains("README:\n# Legacy"));
        assert!(prompt.contains("target stack is: React"));
    }

    #[test]
    fn generation_prompt_handles_unmatched_targets() {
        let analysis = AnalysisResult::new("jQuery app");
        let prompt = generation_prompt("src/env.d.ts", &analysis, &ContextBlock::default(), &[]);
        assert!(prompt.contains("No legacy source corresponds"));
        assert!(prompt.ends_with("Output only the full content of `src/env.d.ts`."));
    }

    #[test]
    fn verification_prompt_is_bounded() {
        let files = BTreeMap::from([("a.ts".to_string(), "x".repeat(500))]);
        let prompt = verification_prompt(&files, &["a.ts: empty".into()], 1, 2, 100);
        assert!(prompt.contains("pass 1 of 2"));
        assert!(prompt.contains("- a.ts: empty"));
        assert!(prompt.contains("[truncated"));
    }
}
