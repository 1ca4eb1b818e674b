//! On-disk shape of the local files: note entries, and the breadcrumbs file
//! including its older array layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serialization::{SerializedThread, Workspace};
use crate::types::breadcrumb::{BreadcrumbState, Crumb, Trail};
use crate::types::range::{Position, TextRange};

/// One element of the notes file: the shared thread record plus the version
/// last exchanged with the shared table. `syncedVersion` stays local; rows in
/// the table are plain `SerializedThread`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFileEntry {
    #[serde(flatten)]
    pub thread: SerializedThread,
    #[serde(rename = "syncedVersion", default, skip_serializing_if = "Option::is_none")]
    pub synced_version: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRange {
    pub start_line: u32,
    pub start_character: u32,
    pub end_line: u32,
    pub end_character: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCrumb {
    pub id: String,
    pub trail_id: String,
    pub uri: String,
    pub range: PersistedRange,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTrail {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub crumbs: Vec<PersistedCrumb>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub active_trail_id: Option<String>,
    #[serde(default)]
    pub trails: Vec<PersistedTrail>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LegacyPosition {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LegacyRange {
    pub start: LegacyPosition,
    pub end: LegacyPosition,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPoint {
    pub id: String,
    #[serde(default)]
    pub tag: String,
    pub range: LegacyRange,
    /// `file://` URI
    pub uri: String,
    #[serde(default)]
    pub ordinal: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyBreadcrumb {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub points: Vec<LegacyPoint>,
}

/// Either layout of the breadcrumbs file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BreadcrumbFile {
    Current(PersistedState),
    Legacy(Vec<LegacyBreadcrumb>),
}

impl BreadcrumbFile {
    pub fn into_state(self, ws: &Workspace) -> BreadcrumbState {
        match self {
            BreadcrumbFile::Current(state) => from_persisted(ws, state),
            BreadcrumbFile::Legacy(legacy) => migrate_legacy(ws, legacy, Utc::now()),
        }
    }
}

fn range_to_persisted(range: &TextRange) -> PersistedRange {
    PersistedRange {
        start_line: range.start.line,
        start_character: range.start.character,
        end_line: range.end.line,
        end_character: range.end.character,
    }
}

fn range_from_persisted(range: &PersistedRange) -> TextRange {
    TextRange::new(
        Position::new(range.start_line, range.start_character),
        Position::new(range.end_line, range.end_character),
    )
}

pub fn to_persisted(ws: &Workspace, state: &BreadcrumbState) -> PersistedState {
    PersistedState {
        active_trail_id: state.active_trail_id.clone(),
        trails: state
            .trails
            .iter()
            .map(|t| PersistedTrail {
                id: t.id.clone(),
                name: t.name.clone(),
                description: t.description.clone(),
                created_at: t.created_at,
                updated_at: t.updated_at,
                crumbs: t
                    .crumbs
                    .iter()
                    .map(|c| PersistedCrumb {
                        id: c.id.clone(),
                        trail_id: c.trail_id.clone(),
                        uri: ws.to_relative(&c.uri),
                        range: range_to_persisted(&c.range),
                        snippet: c.snippet.clone(),
                        note: c.note.clone(),
                        tag: c.tag.clone(),
                        created_at: c.created_at,
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn from_persisted(ws: &Workspace, state: PersistedState) -> BreadcrumbState {
    BreadcrumbState {
        active_trail_id: state.active_trail_id,
        trails: state
            .trails
            .into_iter()
            .map(|t| Trail {
                crumbs: t
                    .crumbs
                    .into_iter()
                    .map(|c| Crumb {
                        uri: ws.to_absolute(&c.uri),
                        range: range_from_persisted(&c.range),
                        id: c.id,
                        // crumbs always belong to the trail they are stored under
                        trail_id: t.id.clone(),
                        snippet: c.snippet,
                        note: c.note,
                        tag: c.tag,
                        created_at: c.created_at,
                    })
                    .collect(),
                id: t.id,
                name: t.name,
                description: t.description,
                created_at: t.created_at,
                updated_at: t.updated_at,
            })
            .collect(),
    }
}

/// Strip the `file://` scheme from a legacy point URI
fn legacy_uri_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

/// Convert the older array-of-breadcrumbs layout. Points become crumbs in
/// ordinal order; their tag is kept and no trail is active afterwards. A
/// point's `noteId` link is not read.
pub fn migrate_legacy(
    ws: &Workspace,
    legacy: Vec<LegacyBreadcrumb>,
    now: DateTime<Utc>,
) -> BreadcrumbState {
    let trails = legacy
        .into_iter()
        .map(|b| {
            let mut points = b.points;
            points.sort_by(|a, b| a.ordinal.total_cmp(&b.ordinal));
            let crumbs = points
                .into_iter()
                .map(|p| Crumb {
                    id: p.id,
                    trail_id: b.id.clone(),
                    uri: ws.to_absolute(legacy_uri_path(&p.uri)),
                    range: TextRange::new(
                        Position::new(p.range.start.line, p.range.start.character),
                        Position::new(p.range.end.line, p.range.end.character),
                    ),
                    snippet: String::new(),
                    note: None,
                    tag: Some(p.tag).filter(|t| !t.is_empty()),
                    created_at: now,
                })
                .collect();
            Trail {
                id: b.id,
                name: b.label,
                description: None,
                created_at: now,
                updated_at: now,
                crumbs,
            }
        })
        .collect();
    BreadcrumbState {
        active_trail_id: None,
        trails,
    }
}
