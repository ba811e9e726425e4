//! Buffers and buffer identifiers.
//!
//! A buffer is one addressable unit of submitted source text. Its identifier
//! names either a whole file or a labeled region within a file, rendered as
//! `file` or `file@label`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a buffer or a named region within a file.
///
/// Two ids are equal iff both the file name and the region label match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_label: Option<String>,
}

impl BufferId {
    /// Create an id addressing a whole file.
    pub fn file(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            region_label: None,
        }
    }

    /// Create an id addressing a labeled region within a file.
    pub fn region(file_name: impl Into<String>, region_label: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            region_label: Some(region_label.into()),
        }
    }

    /// Parse an id from its `file` / `file@label` display form.
    pub fn parse(text: &str) -> Self {
        match text.split_once('@') {
            Some((file, label)) if !label.is_empty() => Self::region(file, label),
            _ => Self::file(text),
        }
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region_label {
            Some(label) => write!(f, "{}@{}", self.file_name, label),
            None => write!(f, "{}", self.file_name),
        }
    }
}

/// One addressable unit of source inside a workspace.
///
/// Immutable once built; the cursor position is a byte offset into
/// `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffer {
    pub id: BufferId,
    pub content: String,
    #[serde(default)]
    pub cursor_position: usize,
}

impl Buffer {
    pub fn new(id: BufferId, content: impl Into<String>, cursor_position: usize) -> Self {
        Self {
            id,
            content: content.into(),
            cursor_position,
        }
    }
}
