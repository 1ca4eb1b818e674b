//! Reconciling local note threads with the shared table.
//!
//! Merging is a union of comments keyed by comment id. A comment both sides
//! have keeps whichever body was edited last. Nothing is ever removed by a
//! merge, so two collaborators that sync against each other converge on the
//! same comments regardless of order.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SecNotesError;
use crate::notebook::Notebook;
use crate::remote::RemoteStore;
use crate::serialization::{deserialize_comment, deserialize_thread, serialize_thread, SerializedThread, Workspace};
use crate::store::LocalStore;
use crate::types::note::NoteThread;

/// A thread the sync pass could not process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedThread {
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Threads only the remote had
    pub pulled: usize,
    /// Shared threads where the remote was newer and we had no unpushed edits
    pub replaced: usize,
    /// Threads that gained comments from the remote
    pub merged: usize,
    pub pushed_updates: usize,
    pub pushed_inserts: usize,
    pub skipped: Vec<SkippedThread>,
}

/// What `apply_remote_change` did with an incoming record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApply {
    /// New thread, installed as-is
    Installed,
    /// Remote descends from what we last synced; local copy replaced
    Replaced,
    /// Concurrent edits; comments were merged and the result must be pushed
    Merged,
    /// Same content we already have
    Ignored,
}

/// Fold the remote thread's comments into `local`.
///
/// Comments whose id is not present locally are appended, then the list is
/// ordered by timestamp with ids breaking ties. Shared comments take the
/// remote body when it was edited later. Returns whether anything changed.
/// Merging the same record twice is a no-op the second time.
pub fn merge_thread(local: &mut NoteThread, remote: &SerializedThread, ws: &Workspace) -> bool {
    let mut added = 0;
    let mut updated = 0;
    for rc in &remote.comments {
        let comment = deserialize_comment(ws, rc);
        match local.comment_mut(&comment.id) {
            Some(existing) => {
                if existing.take_later_edit(&comment) {
                    updated += 1;
                }
            }
            None => {
                local.comments.push(comment);
                added += 1;
            }
        }
    }

    local.version = local.version.max(remote.version);
    if added == 0 && updated == 0 {
        return false;
    }

    local
        .comments
        .sort_by(|a, b| a.timestamp_ms.cmp(&b.timestamp_ms).then_with(|| a.id.cmp(&b.id)));
    local.refresh_deletable();
    local.touch();
    debug!(thread = %local.id, added, updated, "merged remote comments");
    true
}

fn row_id(row: &Value) -> Option<String> {
    row.get("id").and_then(Value::as_str).map(str::to_string)
}

/// One full reconciliation pass against a snapshot of the remote table.
///
/// Remote-only threads are pulled in and local-only ones inserted remotely.
/// A shared thread takes the remote copy when that copy is newer and nothing
/// local is unpushed; otherwise comments are merged and the result pushed
/// back when it differs. A bad record or a failed push skips that thread
/// only. The local file is saved at the end whatever happened.
pub fn sync_note_map_with_remote(
    notebook: &mut Notebook,
    snapshot: Vec<Value>,
    remote: &mut dyn RemoteStore,
    local: &LocalStore,
) -> Result<SyncReport, SecNotesError> {
    let ws = notebook.workspace().clone();
    let mut report = SyncReport::default();
    let mut remote_ids: HashSet<String> = HashSet::new();

    for row in snapshot {
        let id = row_id(&row);
        if let Some(ref id) = id {
            remote_ids.insert(id.clone());
        }
        let record: SerializedThread = match serde_json::from_value(row) {
            Ok(r) => r,
            Err(e) => {
                warn!(thread = ?id, error = %e, "skipping malformed remote record");
                report.skipped.push(SkippedThread {
                    id,
                    reason: format!("malformed record: {}", e),
                });
                continue;
            }
        };

        let unpushed = notebook.has_unpushed(&record.id);
        let Some(thread) = notebook.get_mut(&record.id) else {
            let thread = deserialize_thread(&ws, &record);
            debug!(thread = %record.id, "pulled remote thread");
            notebook.insert(thread);
            notebook.mark_synced(&record.id, record.version);
            report.pulled += 1;
            continue;
        };

        if record.version > thread.version && !unpushed {
            *thread = deserialize_thread(&ws, &record);
            debug!(thread = %record.id, version = record.version, "took newer remote thread");
            notebook.mark_synced(&record.id, record.version);
            report.replaced += 1;
            continue;
        }

        if merge_thread(thread, &record, &ws) {
            report.merged += 1;
        }
        let merged = serialize_thread(&ws, thread);
        if merged == record {
            let version = thread.version;
            notebook.mark_synced(&record.id, version);
            continue;
        }
        match remote.update(&merged) {
            Ok(()) => {
                notebook.mark_synced(&merged.id, merged.version);
                report.pushed_updates += 1;
            }
            Err(e) => {
                warn!(thread = %merged.id, error = %e, "failed to push merged thread");
                report.skipped.push(SkippedThread {
                    id: Some(merged.id),
                    reason: e.to_string(),
                });
            }
        }
    }

    for id in notebook.ids() {
        if remote_ids.contains(&id) {
            continue;
        }
        let Some(thread) = notebook.get(&id) else {
            continue;
        };
        let record = serialize_thread(&ws, thread);
        match remote.insert(&record) {
            Ok(()) => {
                notebook.mark_synced(&id, record.version);
                report.pushed_inserts += 1;
            }
            Err(e) => {
                warn!(thread = %id, error = %e, "failed to insert local thread");
                report.skipped.push(SkippedThread {
                    id: Some(id),
                    reason: e.to_string(),
                });
            }
        }
    }

    local.save_notes(notebook)?;
    info!(
        pulled = report.pulled,
        replaced = report.replaced,
        merged = report.merged,
        pushed_updates = report.pushed_updates,
        pushed_inserts = report.pushed_inserts,
        skipped = report.skipped.len(),
        "sync finished"
    );
    Ok(report)
}

/// Apply one record from the change feed.
///
/// A record that descends from the version we last synced, while we have no
/// unpushed edits, replaces the local copy so remote deletions and edits come
/// through. Anything concurrent falls back to a comment merge.
pub fn apply_remote_change(notebook: &mut Notebook, record: SerializedThread) -> RemoteApply {
    let ws = notebook.workspace().clone();
    let unpushed = notebook.has_unpushed(&record.id);

    let Some(local) = notebook.get_mut(&record.id) else {
        notebook.insert(deserialize_thread(&ws, &record));
        notebook.mark_synced(&record.id, record.version);
        return RemoteApply::Installed;
    };

    if serialize_thread(&ws, local) == record {
        notebook.mark_synced(&record.id, record.version);
        return RemoteApply::Ignored;
    }

    if record.version > local.version && !unpushed {
        *local = deserialize_thread(&ws, &record);
        notebook.mark_synced(&record.id, record.version);
        return RemoteApply::Replaced;
    }

    merge_thread(local, &record, &ws);
    RemoteApply::Merged
}

/// Apply a row removal from the change feed. A thread with unpushed local
/// edits is kept; the next sync publishes it again.
pub fn apply_remote_removal(notebook: &mut Notebook, thread_id: &str) -> bool {
    if !notebook.contains(thread_id) || notebook.has_unpushed(thread_id) {
        return false;
    }
    notebook.delete_note(thread_id).is_some()
}
