//! Claude Code transcript line parser
//!
//! Turns one JSONL line from `~/.claude/projects/[encoded-path]/*.jsonl` into a
//! [`TranscriptEntry`]. Only the parts the detectors care about survive:
//! which tools were invoked, whether tool results failed, and free text.
//!
//! # Error Handling
//!
//! - **Malformed JSON lines**: return `None`, logged at trace level.
//! - **Unexpected shapes** (arrays, scalars, missing `message`): return `None`.
//! - **Unknown block types**: dropped from the entry.
//!
//! Callers treat "failed to parse" and "parsed but irrelevant" identically.

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// One classified transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    /// When the line was written, if the record carried a timestamp
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: EntryKind,
}

/// What an entry carries.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// A human turn with no structured content list.
    UserSpoke,
    /// Structured content blocks, in encounter order.
    Blocks(Vec<ContentBlock>),
}

/// A classified content block.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    ToolUse { name: String },
    ToolResult { is_error: bool, text: String },
    Text { text: String },
}

impl TranscriptEntry {
    /// Content blocks of this entry (empty for user turns).
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.kind {
            EntryKind::Blocks(blocks) => blocks,
            EntryKind::UserSpoke => &[],
        }
    }

    /// Names of every tool invoked in this entry.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.blocks().iter().filter_map(|block| match block {
            ContentBlock::ToolUse { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Number of errored tool results in this entry.
    pub fn error_count(&self) -> usize {
        self.blocks()
            .iter()
            .filter(|block| matches!(block, ContentBlock::ToolResult { is_error: true, .. }))
            .count()
    }
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRecord {
    #[serde(rename = "type")]
    record_type: Option<String>,
    timestamp: Option<String>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    role: Option<String>,
    content: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    // Catch-all for thinking, image and future block types
    #[serde(other)]
    Unknown,
}

/// Case-insensitive markers that flag a tool result as failed even when
/// the record does not set `is_error`.
fn error_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)error|fail|exception|eperm|enoent").expect("static regex is valid")
    })
}

/// Parse one transcript line.
///
/// Returns `None` for blank lines, invalid JSON, non-object JSON, and
/// records that carry neither a content list nor a user turn.
pub fn parse_line(line: &str) -> Option<TranscriptEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let raw: RawRecord = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            tracing::trace!(error = %e, "Skipping unparseable transcript line");
            return None;
        }
    };

    let timestamp = raw
        .timestamp
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let message = raw.message.unwrap_or_default();

    let kind = match message.content {
        Some(serde_json::Value::Array(items)) => {
            EntryKind::Blocks(items.into_iter().filter_map(classify_block).collect())
        }
        _ => {
            let is_user = raw.record_type.as_deref() == Some("human")
                || message.role.as_deref() == Some("user");
            if !is_user {
                return None;
            }
            EntryKind::UserSpoke
        }
    };

    Some(TranscriptEntry { timestamp, kind })
}

fn classify_block(value: serde_json::Value) -> Option<ContentBlock> {
    let block: RawBlock = serde_json::from_value(value).ok()?;
    match block {
        RawBlock::Text { text } => Some(ContentBlock::Text { text }),
        RawBlock::ToolUse { name } => Some(ContentBlock::ToolUse { name }),
        RawBlock::ToolResult { content, is_error } => {
            let text = result_text(&content);
            let is_error = is_error || error_marker().is_match(&text);
            Some(ContentBlock::ToolResult { is_error, text })
        }
        RawBlock::Unknown => None,
    }
}

/// Flatten tool result content, which is either a plain string or a list of
/// `{"type": "text", "text": ...}` parts.
fn result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
