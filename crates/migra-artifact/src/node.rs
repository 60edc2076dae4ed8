//! File tree nodes
//!
//! A [`FileNode`] is used for both sides of a migration: the legacy
//! repository structure and the target scaffold whose files are generated.

use crate::paths;
use serde::{Deserialize, Serialize};

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file
    File,
    /// Directory with children
    Directory,
}

/// Generation status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    /// Not yet processed
    #[default]
    Pending,
    /// Currently being generated
    InProgress,
    /// Generated successfully
    Done,
    /// Generation failed
    Error,
}

impl FileStatus {
    /// Whether the status is terminal for a run
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// File or directory in a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Unique, slash-delimited, root-relative path
    pub path: String,
    /// Last path segment
    pub name: String,
    /// File or directory
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Generation status
    #[serde(default)]
    pub status: FileStatus,
    /// File content, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ordered children (directories only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    /// Create a pending file node
    #[inline]
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: paths::file_name(&path).to_string(),
            path,
            kind: NodeKind::File,
            status: FileStatus::Pending,
            content: None,
            children: None,
        }
    }

    /// Create an empty directory node
    #[inline]
    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: paths::file_name(&path).to_string(),
            path,
            kind: NodeKind::Directory,
            status: FileStatus::Pending,
            content: None,
            children: Some(Vec::new()),
        }
    }

    /// With content
    #[inline]
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Check if node is a file
    #[inline]
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Check if node is a directory
    #[inline]
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Children slice (empty for files)
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[FileNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Content as `&str`, empty when absent
    #[inline]
    #[must_use]
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
