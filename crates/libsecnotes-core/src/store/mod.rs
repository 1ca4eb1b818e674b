//! Workspace-local JSON files for notes and breadcrumbs.
//!
//! Both files are rewritten whole. Writes go to a sibling temp file that is
//! renamed into place while an exclusive `<file>.lock` is held, so two
//! processes saving at once cannot interleave their output.

pub mod persisted;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::SecNotesError;
use crate::notebook::Notebook;
use crate::serialization::{deserialize_thread, serialize_thread, Workspace};
use crate::types::breadcrumb::BreadcrumbState;
use crate::types::note::NoteThread;
use persisted::{to_persisted, BreadcrumbFile, NoteFileEntry};

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of reading a file that may be missing or unreadable.
///
/// A file that exists but does not parse yields the empty value plus a
/// warning instead of an error, so a session can still start.
#[derive(Debug)]
pub struct LoadOutcome<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> LoadOutcome<T> {
    fn ok(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }
}

/// Locations of the local notes and breadcrumbs files
#[derive(Debug, Clone)]
pub struct LocalStore {
    notes_path: PathBuf,
    breadcrumbs_path: PathBuf,
}

impl LocalStore {
    pub fn new(notes_path: impl Into<PathBuf>, breadcrumbs_path: impl Into<PathBuf>) -> Self {
        Self {
            notes_path: notes_path.into(),
            breadcrumbs_path: breadcrumbs_path.into(),
        }
    }

    pub fn notes_path(&self) -> &Path {
        &self.notes_path
    }

    pub fn breadcrumbs_path(&self) -> &Path {
        &self.breadcrumbs_path
    }

    pub fn load_notes(&self, ws: &Workspace) -> Result<LoadOutcome<Vec<NoteThread>>, SecNotesError> {
        let outcome = self.read_note_entries()?;
        Ok(LoadOutcome {
            value: outcome
                .value
                .iter()
                .map(|e| deserialize_thread(ws, &e.thread))
                .collect(),
            warning: outcome.warning,
        })
    }

    fn read_note_entries(&self) -> Result<LoadOutcome<Vec<NoteFileEntry>>, SecNotesError> {
        let Some(raw) = read_if_exists(&self.notes_path)? else {
            return Ok(LoadOutcome::ok(Vec::new()));
        };
        match serde_json::from_str::<Vec<NoteFileEntry>>(&raw) {
            Ok(entries) => {
                debug!(count = entries.len(), path = %self.notes_path.display(), "loaded notes");
                Ok(LoadOutcome::ok(entries))
            }
            Err(e) => {
                let msg = format!(
                    "could not parse {}: {}; starting with no notes",
                    self.notes_path.display(),
                    e
                );
                warn!("{}", msg);
                Ok(LoadOutcome {
                    value: Vec::new(),
                    warning: Some(msg),
                })
            }
        }
    }

    /// Load into a notebook in one step, including the synced versions
    pub fn load_notebook(&self, ws: Workspace) -> Result<LoadOutcome<Notebook>, SecNotesError> {
        let outcome = self.read_note_entries()?;
        let mut notebook = Notebook::new(ws);
        for entry in outcome.value {
            let thread = deserialize_thread(notebook.workspace(), &entry.thread);
            notebook.insert(thread);
            if let Some(version) = entry.synced_version {
                notebook.mark_synced(&entry.thread.id, version);
            }
        }
        Ok(LoadOutcome {
            value: notebook,
            warning: outcome.warning,
        })
    }

    /// Write every thread with its synced version. Nothing is written when
    /// there are no notes and no file yet, so opening a workspace does not
    /// litter it.
    pub fn save_notes(&self, notebook: &Notebook) -> Result<bool, SecNotesError> {
        if notebook.is_empty() && !self.notes_path.exists() {
            return Ok(false);
        }
        let entries: Vec<NoteFileEntry> = notebook
            .threads()
            .map(|t| NoteFileEntry {
                thread: serialize_thread(notebook.workspace(), t),
                synced_version: notebook.synced_version(&t.id),
            })
            .collect();
        let json = serde_json::to_string_pretty(&entries)?;
        write_atomic(&self.notes_path, json.as_bytes())?;
        debug!(count = entries.len(), path = %self.notes_path.display(), "saved notes");
        Ok(true)
    }

    pub fn load_breadcrumbs(
        &self,
        ws: &Workspace,
    ) -> Result<LoadOutcome<BreadcrumbState>, SecNotesError> {
        let Some(raw) = read_if_exists(&self.breadcrumbs_path)? else {
            return Ok(LoadOutcome::ok(BreadcrumbState::default()));
        };
        match serde_json::from_str::<BreadcrumbFile>(&raw) {
            Ok(file) => Ok(LoadOutcome::ok(file.into_state(ws))),
            Err(e) => {
                let msg = format!(
                    "could not parse {}: {}; starting with no trails",
                    self.breadcrumbs_path.display(),
                    e
                );
                warn!("{}", msg);
                Ok(LoadOutcome {
                    value: BreadcrumbState::default(),
                    warning: Some(msg),
                })
            }
        }
    }

    /// Same skip rule as `save_notes`
    pub fn save_breadcrumbs(
        &self,
        ws: &Workspace,
        state: &BreadcrumbState,
    ) -> Result<bool, SecNotesError> {
        if state.trails.is_empty() && !self.breadcrumbs_path.exists() {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(&to_persisted(ws, state))?;
        write_atomic(&self.breadcrumbs_path, json.as_bytes())?;
        Ok(true)
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>, SecNotesError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Take the exclusive lock next to `path`, retrying with backoff
fn acquire_lock(path: &Path, timeout: Duration) -> Result<File, SecNotesError> {
    let lock_path = sibling(path, ".lock");
    let lock_file = File::create(&lock_path)?;
    let start = Instant::now();
    let mut delay = Duration::from_millis(10);

    loop {
        match lock_file.try_lock_exclusive() {
            Ok(()) => return Ok(lock_file),
            Err(e) => {
                if start.elapsed() >= timeout {
                    return Err(SecNotesError::Busy(format!(
                        "timeout waiting for {}: {}",
                        lock_path.display(),
                        e
                    )));
                }
                std::thread::sleep(delay);
                delay = (delay * 2).min(Duration::from_millis(200));
            }
        }
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SecNotesError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let lock = acquire_lock(path, LOCK_TIMEOUT)?;
    let tmp = sibling(path, ".tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    lock.unlock()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::range::TextRange;
    use tempfile::tempdir;

    fn setup(dir: &Path) -> (LocalStore, Workspace) {
        let store = LocalStore::new(
            dir.join(".security-notes.json"),
            dir.join(".security-notes-breadcrumbs.json"),
        );
        (store, Workspace::new(dir, dir.join("assets")))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let (store, ws) = setup(dir.path());
        let out = store.load_notes(&ws).unwrap();
        assert!(out.value.is_empty());
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_empty_notebook_without_file_is_not_written() {
        let dir = tempdir().unwrap();
        let (store, ws) = setup(dir.path());
        assert!(!store.save_notes(&Notebook::new(ws)).unwrap());
        assert!(!store.notes_path().exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let (store, ws) = setup(dir.path());
        let mut nb = Notebook::new(ws.clone());
        let id = nb.create_note(dir.path().join("a.rs"), TextRange::lines(1, 2), "x", "alice");
        assert!(store.save_notes(&nb).unwrap());

        let raw = fs::read_to_string(store.notes_path()).unwrap();
        assert!(raw.contains("\"uri\": \"a.rs\""));
        assert!(!sibling(store.notes_path(), ".tmp").exists());

        let loaded = store.load_notebook(ws).unwrap().value;
        assert_eq!(loaded.get(&id).unwrap().comments[0].body, "[TODO] x");

        // emptied collection overwrites an existing file
        let mut nb = loaded;
        nb.delete_note(&id);
        assert!(store.save_notes(&nb).unwrap());
        assert_eq!(fs::read_to_string(store.notes_path()).unwrap().trim(), "[]");
    }

    #[test]
    fn test_synced_versions_survive_reload() {
        let dir = tempdir().unwrap();
        let (store, ws) = setup(dir.path());
        let mut nb = Notebook::new(ws.clone());
        let shared = nb.create_note(dir.path().join("a.rs"), TextRange::lines(1, 1), "x", "alice");
        let local = nb.create_note(dir.path().join("b.rs"), TextRange::lines(2, 2), "y", "alice");
        let v = nb.get(&shared).unwrap().version;
        nb.mark_synced(&shared, v);
        store.save_notes(&nb).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.notes_path()).unwrap()).unwrap();
        let rows = raw.as_array().unwrap();
        assert!(rows.iter().any(|r| r["id"] == shared.as_str() && r["syncedVersion"] == v));
        assert!(rows.iter().all(|r| r["id"] != local.as_str() || r.get("syncedVersion").is_none()));

        let loaded = store.load_notebook(ws).unwrap().value;
        assert_eq!(loaded.synced_version(&shared), Some(v));
        assert!(!loaded.has_unpushed(&shared));
        assert!(loaded.has_unpushed(&local));
    }

    #[test]
    fn test_plain_thread_list_still_loads() {
        let dir = tempdir().unwrap();
        let (store, ws) = setup(dir.path());
        fs::write(
            store.notes_path(),
            r#"[{"id": "t1", "uri": "a.rs", "range": {"startLine": 1, "endLine": 1},
                 "comments": [{"author": "alice", "body": "[TODO] x", "timestamp": 5}]}]"#,
        )
        .unwrap();
        let out = store.load_notebook(ws).unwrap();
        assert!(out.warning.is_none());
        assert!(out.value.contains("t1"));
        assert_eq!(out.value.synced_version("t1"), None);
    }

    #[test]
    fn test_corrupt_file_warns() {
        let dir = tempdir().unwrap();
        let (store, ws) = setup(dir.path());
        fs::write(store.notes_path(), "{not json").unwrap();
        let out = store.load_notes(&ws).unwrap();
        assert!(out.value.is_empty());
        assert!(out.warning.unwrap().contains("could not parse"));

        fs::write(store.breadcrumbs_path(), "42").unwrap();
        let out = store.load_breadcrumbs(&ws).unwrap();
        assert!(out.value.trails.is_empty());
        assert!(out.warning.is_some());
    }

    #[test]
    fn test_lock_times_out_while_held() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("notes.json");
        let held = acquire_lock(&target, LOCK_TIMEOUT).unwrap();
        let err = acquire_lock(&target, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, SecNotesError::Busy(_)));
        drop(held);
        assert!(acquire_lock(&target, Duration::from_millis(50)).is_ok());
    }
}
