//! Note documents as produced by the block-based rich-text editor.
//!
//! A document is an ordered list of typed blocks plus a last-modified stamp.
//! The engine never interprets block payloads except for the paragraph text it
//! writes itself (timestamps).

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::timer::format::format_clock;

/// Block-format version written into documents created by the engine.
pub const DOCUMENT_FORMAT_VERSION: &str = "2.31.0";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum NoteScope {
    /// Whole-meeting notes, keyed by meeting id.
    Global,
    /// Notes for a single agenda item, keyed by item id.
    Item,
}

impl NoteScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteScope::Global => "global",
            NoteScope::Item => "item",
        }
    }
}

/// Identity of one note document: `(scope, documentId)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct NoteKey {
    pub scope: NoteScope,
    pub id: String,
}

impl NoteKey {
    pub fn global(meeting_id: impl Into<String>) -> Self {
        Self {
            scope: NoteScope::Global,
            id: meeting_id.into(),
        }
    }

    pub fn item(item_id: impl Into<String>) -> Self {
        Self {
            scope: NoteScope::Item,
            id: item_id.into(),
        }
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.scope.as_str(), self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl NoteBlock {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: "paragraph".into(),
            data: json!({ "text": text.into() }),
        }
    }

    /// Highlighted `[M:SS]` / `[H:MM:SS]` marker for the given meeting time.
    pub fn timestamp(elapsed_seconds: u64) -> Self {
        Self::paragraph(format!(
            "<mark class=\"cdx-marker\">[{}]</mark> ",
            format_clock(elapsed_seconds)
        ))
    }

    pub fn text(&self) -> Option<&str> {
        self.data.get("text").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteDocument {
    /// Last modification, epoch milliseconds.
    pub time: i64,
    #[serde(default)]
    pub blocks: Vec<NoteBlock>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    DOCUMENT_FORMAT_VERSION.to_string()
}

impl Default for NoteDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl NoteDocument {
    /// Zero blocks, stamped now.
    pub fn empty() -> Self {
        Self {
            time: Utc::now().timestamp_millis(),
            blocks: Vec::new(),
            version: default_version(),
        }
    }

    pub fn with_blocks(blocks: Vec<NoteBlock>) -> Self {
        Self {
            blocks,
            ..Self::empty()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Copy of this document with `block` appended and a fresh modification
    /// stamp. The stamp never moves backwards.
    pub fn appended(&self, block: NoteBlock) -> Self {
        let mut next = self.clone();
        next.blocks.push(block);
        next.time = Utc::now().timestamp_millis().max(self.time);
        next
    }
}
