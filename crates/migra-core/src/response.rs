//! Model output parsing
//!
//! Remote responses are free text that usually, but not always, contains the
//! requested JSON or code. Parsers here never fail: malformed output yields
//! conservative defaults (empty lists, `Medium` complexity, a failing verdict).
//!
//! Fenced code blocks are located with `pulldown-cmark`.

use migra_artifact::{paths, AnalysisResult, Complexity, ExplicitMapping};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fenced or indented code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string language, if any
    pub language: Option<String>,
    /// Block content
    pub code: String,
}

/// All code blocks in `text`, in document order
#[must_use]
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_ascii_lowercase),
                    CodeBlockKind::Indented => None,
                };
                current = Some(CodeBlock {
                    language,
                    code: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }
    blocks
}

/// Generated file content without a surrounding code fence
///
/// Text that does not start with a fence (after leading prose) is returned
/// trimmed. An unterminated fence, as seen mid-stream, yields what has
/// arrived so far.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    if !text.contains("```") && !text.contains("~~~") {
        return text.trim().to_string();
    }
    match code_blocks(text)
        .into_iter()
        .find(|b| b.language.is_some() || !b.code.trim().is_empty())
    {
        Some(block) => {
            let mut code = block.code.trim_end().to_string();
            if !code.is_empty() {
                code.push('\n');
            }
            code
        }
        None => text.trim().to_string(),
    }
}

/// First JSON value found in `text`
///
/// Tries the whole text, then each code block, then the widest `{...}` or
/// `[...]` span.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    for block in code_blocks(text) {
        if let Ok(value) = serde_json::from_str::<Value>(block.code.trim()) {
            return Some(value);
        }
    }
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
}

/// Strings from an array of strings or of objects with a name-like field
fn string_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let Some(Value::Array(items)) = keys.iter().find_map(|k| obj.get(*k)) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(o) => string_field(o, &["name", "title", "description", "message"]),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn mappings(obj: &Map<String, Value>) -> Vec<ExplicitMapping> {
    let Some(Value::Array(items)) = ["mappings", "fileMappings"].iter().find_map(|k| obj.get(*k)) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let o = item.as_object()?;
            let source = string_field(o, &["sourcePath", "source"])?;
            let target = string_field(o, &["targetPath", "target"])?;
            let mut mapping = ExplicitMapping::new(source, target);
            mapping.rationale = string_field(o, &["rationale", "reason"]).unwrap_or_default();
            mapping.confidence = o.get("confidence").and_then(Value::as_f64);
            Some(mapping)
        })
        .filter(|m| !m.source_path.is_empty() && !m.target_path.is_empty())
        .collect()
}

/// Analysis call output
///
/// Fields are read one by one so a single bad field does not discard the
/// rest. Text without JSON becomes the summary.
#[must_use]
pub fn parse_analysis(text: &str) -> AnalysisResult {
    let Some(Value::Object(obj)) = extract_json(text) else {
        tracing::warn!("Analysis response had no JSON object, using defaults");
        return AnalysisResult::new(text.trim());
    };
    AnalysisResult {
        summary: string_field(&obj, &["summary"]).unwrap_or_default(),
        complexity: string_field(&obj, &["complexity"])
            .map(|c| Complexity::from_label(&c))
            .unwrap_or_default(),
        dependencies: string_list(&obj, &["dependencies"]),
        patterns: string_list(&obj, &["patterns"]),
        risks: string_list(&obj, &["risks"]),
        source_framework: string_field(&obj, &["sourceFramework", "detectedFramework"]).unwrap_or_default(),
        recommended_target: string_field(&obj, &["recommendedTarget", "targetStack"]).unwrap_or_default(),
        architecture: string_field(&obj, &["architecture", "architectureDescription"]).unwrap_or_default(),
        mappings: mappings(&obj),
        migration_notes: string_field(&obj, &["migrationNotes", "notes"]).filter(|n| !n.is_empty()),
    }
}

fn under(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}/{path}")
    }
}

fn collect_paths(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(under(prefix, s)),
        Value::Array(items) => {
            for item in items {
                collect_paths(item, prefix, out);
            }
        }
        Value::Object(o) => {
            if let Some(files) = ["files", "structure", "paths"].iter().find_map(|k| o.get(*k)) {
                collect_paths(files, prefix, out);
                return;
            }
            let path = string_field(o, &["path"]);
            let name = string_field(o, &["name"]);
            let here = match (&path, &name) {
                (Some(p), _) => under(prefix, p),
                (None, Some(n)) => under(prefix, n),
                (None, None) => return,
            };
            match o.get("children") {
                Some(children) if children.is_array() => {
                    // Children with a full path are already rooted.
                    let child_prefix = if path.is_some() { "" } else { here.as_str() };
                    collect_paths(children, child_prefix, out);
                }
                _ => {
                    let is_dir = o.get("type").and_then(Value::as_str) == Some("directory");
                    if !is_dir {
                        out.push(here);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Scaffold structure call output, sanitized
///
/// Accepts a JSON array of paths, objects with a `path`, a `{ "files": ... }`
/// wrapper or a nested `name`/`children` tree. Without JSON, bullet or plain
/// lines that look like file paths are used.
#[must_use]
pub fn parse_structure(text: &str) -> Vec<String> {
    let mut raw = Vec::new();
    match extract_json(text) {
        Some(value) => collect_paths(&value, "", &mut raw),
        None => {
            raw.extend(
                text.lines()
                    .map(|l| l.trim().trim_start_matches(['-', '*', ' ']).trim_matches('`'))
                    .filter(|l| !l.is_empty() && !l.contains(' ') && l.contains('.'))
                    .map(str::to_string),
            );
        }
    }
    sanitize_paths(raw)
}

/// Normalize, deduplicate and filter planned paths
///
/// Drops empty entries, directory entries (trailing `/`), absolute URLs and
/// anything without a file name. Order of first occurrence is kept.
#[must_use]
pub fn sanitize_paths<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|p| {
            let p = p.as_ref().trim().replace('\\', "/");
            if p.is_empty() || p.ends_with('/') || p.contains("://") {
                return None;
            }
            let normalized = paths::normalize(&p);
            (!normalized.is_empty()).then_some(normalized)
        })
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Whole-file replacement proposed by a verification pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFix {
    /// Target path
    pub path: String,
    /// Complete new content
    pub content: String,
}

/// Verification call output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteVerdict {
    /// Model's own verdict
    pub passed: bool,
    /// Reported issues
    pub issues: Vec<String>,
    /// Proposed fixes
    pub fixes: Vec<FileFix>,
    /// Response had no usable JSON
    pub malformed: bool,
}

fn issue_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(o) => {
            let message = string_field(o, &["message", "description", "issue"])?;
            Some(match string_field(o, &["file", "path"]) {
                Some(file) if !message.contains(&file) => format!("{file}: {message}"),
                _ => message,
            })
        }
        _ => None,
    }
}

fn fixes(obj: &Map<String, Value>) -> Vec<FileFix> {
    match ["fixes", "fixedFiles", "files"].iter().find_map(|k| obj.get(*k)) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let o = item.as_object()?;
                Some(FileFix {
                    path: paths::normalize(&string_field(o, &["path", "file"])?),
                    content: o.get("content").and_then(Value::as_str)?.to_string(),
                })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(path, content)| {
                Some(FileFix {
                    path: paths::normalize(path),
                    content: content.as_str()?.to_string(),
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Verification call output
#[must_use]
pub fn parse_verification(text: &str) -> RemoteVerdict {
    let Some(Value::Object(obj)) = extract_json(text) else {
        tracing::warn!("Verification response had no JSON object");
        return RemoteVerdict {
            malformed: true,
            ..RemoteVerdict::default()
        };
    };
    let issues = match obj.get("issues") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(issue_text)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    RemoteVerdict {
        passed: obj.get("passed").and_then(Value::as_bool).unwrap_or(false),
        issues,
        fixes: fixes(&obj).into_iter().filter(|f| !f.path.is_empty()).collect(),
        malformed: false,
    }
}
