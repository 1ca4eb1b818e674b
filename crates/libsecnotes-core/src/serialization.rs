//! JSON-safe record shapes for note threads and the mapping to and from the
//! live model.
//!
//! The same `SerializedThread` is written to the local notes file and stored
//! as one row per thread in the remote table. Paths are stored relative to the
//! workspace root (threads) or the assets directory (reaction icons), always
//! with `/` separators.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::ids::legacy_comment_id;
use crate::types::note::{NoteComment, NoteThread, Reaction};
use crate::types::now_ms;
use crate::types::range::TextRange;

/// Path anchors used to relativize stored paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            assets_dir: assets_dir.into(),
        }
    }

    /// Workspace-relative POSIX path; paths outside the workspace stay absolute
    pub fn to_relative(&self, path: &Path) -> String {
        relative_posix(path, &self.root)
    }

    pub fn to_absolute(&self, stored: &str) -> PathBuf {
        absolute_from_posix(stored, &self.root)
    }

    pub fn icon_to_relative(&self, path: &Path) -> String {
        relative_posix(path, &self.assets_dir)
    }

    pub fn icon_to_absolute(&self, stored: &str) -> PathBuf {
        absolute_from_posix(stored, &self.assets_dir)
    }
}

fn relative_posix(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

fn absolute_from_posix(stored: &str, base: &Path) -> PathBuf {
    let as_path = Path::new(stored);
    if as_path.is_absolute() {
        return as_path.to_path_buf();
    }
    stored
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedReaction {
    pub label: String,
    pub count: u32,
    #[serde(rename = "iconPath")]
    pub icon_path: String,
    #[serde(rename = "reactedBy", default, skip_serializing_if = "Vec::is_empty")]
    pub reacted_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedComment {
    /// Absent in records written before comments had stable ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub author: String,
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub reactions: Vec<SerializedReaction>,
    /// Last time the body was changed after creation
    #[serde(rename = "editedAt", default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<u64>,
}

/// Only line bounds are stored; columns do not survive a save/load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedRange {
    #[serde(rename = "startLine")]
    pub start_line: u32,
    #[serde(rename = "endLine")]
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedThread {
    pub id: String,
    pub uri: String,
    pub range: SerializedRange,
    pub comments: Vec<SerializedComment>,
    #[serde(default)]
    pub version: u64,
}

/// Older writers stored timestamps as ISO-8601 strings
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(u64),
        Float(f64),
        Iso(String),
    }

    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Repr::Millis(ms)) => Ok(Some(ms)),
        Some(Repr::Float(ms)) if ms >= 0.0 => Ok(Some(ms as u64)),
        Some(Repr::Float(_)) => Ok(None),
        Some(Repr::Iso(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.timestamp_millis().max(0) as u64))
            .map_err(serde::de::Error::custom),
    }
}

pub fn serialize_reaction(ws: &Workspace, reaction: &Reaction) -> SerializedReaction {
    SerializedReaction {
        label: reaction.label.clone(),
        count: reaction.count,
        icon_path: ws.icon_to_relative(&reaction.icon_path),
        reacted_by: reaction.reacted_by.clone(),
    }
}

pub fn serialize_comment(ws: &Workspace, comment: &NoteComment) -> SerializedComment {
    SerializedComment {
        id: Some(comment.id.clone()),
        author: comment.author.clone(),
        body: comment.saved_body.clone(),
        timestamp: Some(comment.timestamp_ms),
        reactions: comment
            .reactions
            .iter()
            .map(|r| serialize_reaction(ws, r))
            .collect(),
        edited_at: comment.edited_ms,
    }
}

pub fn serialize_thread(ws: &Workspace, thread: &NoteThread) -> SerializedThread {
    SerializedThread {
        id: thread.id.clone(),
        uri: ws.to_relative(&thread.uri),
        range: SerializedRange {
            start_line: thread.range.start.line,
            end_line: thread.range.end.line,
        },
        comments: thread
            .comments
            .iter()
            .map(|c| serialize_comment(ws, c))
            .collect(),
        version: thread.version,
    }
}

/// Serialize a whole note collection, ordered by thread id
pub fn serialize_notes<'a, I>(ws: &Workspace, threads: I) -> Vec<SerializedThread>
where
    I: IntoIterator<Item = &'a NoteThread>,
{
    let mut out: Vec<SerializedThread> = threads
        .into_iter()
        .map(|t| serialize_thread(ws, t))
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

pub fn deserialize_reaction(ws: &Workspace, reaction: &SerializedReaction) -> Reaction {
    Reaction {
        label: reaction.label.clone(),
        count: reaction.count,
        icon_path: ws.icon_to_absolute(&reaction.icon_path),
        reacted_by: reaction.reacted_by.clone(),
    }
}

pub fn deserialize_comment(ws: &Workspace, comment: &SerializedComment) -> NoteComment {
    let id = comment.id.clone().unwrap_or_else(|| {
        legacy_comment_id(comment.timestamp.unwrap_or(0), &comment.author, &comment.body)
    });
    let timestamp_ms = comment.timestamp.unwrap_or_else(now_ms);
    let mut out = NoteComment::with_id(
        id,
        comment.body.clone(),
        comment.author.clone(),
        comment
            .reactions
            .iter()
            .map(|r| deserialize_reaction(ws, r))
            .collect(),
        timestamp_ms,
    );
    out.edited_ms = comment.edited_at;
    out
}

pub fn deserialize_range(range: &SerializedRange) -> TextRange {
    TextRange::lines(range.start_line, range.end_line)
}

pub fn deserialize_thread(ws: &Workspace, thread: &SerializedThread) -> NoteThread {
    let mut out = NoteThread::new(
        thread.id.clone(),
        ws.to_absolute(&thread.uri),
        deserialize_range(&thread.range),
    );
    out.comments = thread
        .comments
        .iter()
        .map(|c| deserialize_comment(ws, c))
        .collect();
    out.version = thread.version;
    out.refresh_deletable();
    out
}
