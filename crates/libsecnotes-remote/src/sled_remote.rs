//! Shared notes table on sled.
//!
//! One sled database can hold the tables of several projects; each project is
//! a tree keyed by thread id with the JSON record as value. sled allows a
//! single process per database, so collaborators share it through that
//! process (or take turns).

use std::path::{Path, PathBuf};

use libsecnotes_core::{Config, RemoteStore, SecNotesError, SerializedThread};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::RemoteError;
use crate::feed::ChangeFeed;

/// Where the shared table lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub database: PathBuf,
    pub project_name: String,
}

impl RemoteConfig {
    pub fn new(database: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            project_name: project_name.into(),
        }
    }

    /// Resolve the `[collab]` section against the workspace root
    pub fn from_config(config: &Config, root: &Path) -> Self {
        Self::new(config.database_path(root), config.collab.project_name.clone())
    }
}

/// Connected handle on one project's table
#[derive(Debug, Clone)]
pub struct SledRemote {
    db: sled::Db,
    table: sled::Tree,
    project_name: String,
}

impl SledRemote {
    /// Open the database, creating it if absent, then the project's table.
    /// Each step fails on its own error; nothing is retried.
    pub fn connect(config: &RemoteConfig) -> Result<Self, RemoteError> {
        debug!(path = %config.database.display(), "opening shared database");
        let db = sled::open(&config.database).map_err(|source| RemoteError::Connect {
            path: config.database.clone(),
            source,
        })?;

        let table_existed = db
            .tree_names()
            .iter()
            .any(|name| &name[..] == config.project_name.as_bytes());
        let table = db
            .open_tree(&config.project_name)
            .map_err(|source| RemoteError::CreateTable {
                table: config.project_name.clone(),
                source,
            })?;
        if !table_existed {
            info!(table = %config.project_name, "created shared table");
        }

        info!(
            path = %config.database.display(),
            table = %config.project_name,
            rows = table.len(),
            "connected to shared notes"
        );
        Ok(Self {
            db,
            table,
            project_name: config.project_name.clone(),
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Changes to this table from now on
    pub fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::new(self.table.watch_prefix(Vec::<u8>::new()))
    }

    /// Every row, raw. Rows that are not valid JSON are logged and left out.
    pub fn rows(&self) -> Result<Vec<Value>, RemoteError> {
        let mut out = Vec::new();
        for item in self.table.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<Value>(&value) {
                Ok(v) => out.push(v),
                Err(e) => warn!(
                    row = %String::from_utf8_lossy(&key),
                    error = %e,
                    "skipping unreadable row"
                ),
            }
        }
        Ok(out)
    }

    pub fn get(&self, thread_id: &str) -> Result<Option<SerializedThread>, RemoteError> {
        match self.table.get(thread_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Create a row; fails if the thread id is already taken
    pub fn insert_row(&self, thread: &SerializedThread) -> Result<(), RemoteError> {
        let bytes = serde_json::to_vec(thread)?;
        let swapped = self.table.compare_and_swap(
            thread.id.as_bytes(),
            None as Option<&[u8]>,
            Some(bytes),
        )?;
        if swapped.is_err() {
            return Err(RemoteError::Duplicate(thread.id.clone()));
        }
        self.db.flush()?;
        debug!(thread = %thread.id, "inserted row");
        Ok(())
    }

    /// Replace a row, creating it if it went missing
    pub fn update_row(&self, thread: &SerializedThread) -> Result<(), RemoteError> {
        let bytes = serde_json::to_vec(thread)?;
        self.table.insert(thread.id.as_bytes(), bytes)?;
        self.db.flush()?;
        debug!(thread = %thread.id, "updated row");
        Ok(())
    }

    pub fn remove_row(&self, thread_id: &str) -> Result<bool, RemoteError> {
        let removed = self.table.remove(thread_id.as_bytes())?.is_some();
        self.db.flush()?;
        Ok(removed)
    }
}

impl RemoteStore for SledRemote {
    fn retrieve_all(&self) -> Result<Vec<Value>, SecNotesError> {
        Ok(self.rows()?)
    }

    fn insert(&mut self, thread: &SerializedThread) -> Result<(), SecNotesError> {
        Ok(self.insert_row(thread)?)
    }

    fn update(&mut self, thread: &SerializedThread) -> Result<(), SecNotesError> {
        Ok(self.update_row(thread)?)
    }

    fn remove(&mut self, thread_id: &str) -> Result<bool, SecNotesError> {
        Ok(self.remove_row(thread_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsecnotes_core::serialization::SerializedRange;
    use std::time::Duration;
    use tempfile::tempdir;

    fn record(id: &str, version: u64) -> SerializedThread {
        SerializedThread {
            id: id.to_string(),
            uri: "src/lib.rs".to_string(),
            range: SerializedRange {
                start_line: 1,
                end_line: 2,
            },
            comments: Vec::new(),
            version,
        }
    }

    fn connect(dir: &Path) -> SledRemote {
        SledRemote::connect(&RemoteConfig::new(dir.join("shared.db"), "audit")).unwrap()
    }

    #[test]
    fn test_insert_update_retrieve() {
        let dir = tempdir().unwrap();
        let mut remote = connect(dir.path());

        remote.insert(&record("t1", 1)).unwrap();
        let err = remote.insert(&record("t1", 2)).unwrap_err();
        assert!(matches!(err, SecNotesError::Conflict(_)));

        remote.update(&record("t1", 3)).unwrap();
        remote.update(&record("t2", 1)).unwrap();
        assert_eq!(remote.get("t1").unwrap().unwrap().version, 3);

        let rows = remote.retrieve_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "t1");
    }

    #[test]
    fn test_projects_are_separate_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let a = SledRemote::connect(&RemoteConfig::new(&path, "a")).unwrap();
        a.insert_row(&record("t1", 1)).unwrap();
        drop(a);
        let b = SledRemote::connect(&RemoteConfig::new(&path, "b")).unwrap();
        assert!(b.rows().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_rows_are_left_out() {
        let dir = tempdir().unwrap();
        let remote = connect(dir.path());
        remote.table.insert("junk", b"not json".to_vec()).unwrap();
        remote.insert_row(&record("t1", 1)).unwrap();
        assert_eq!(remote.rows().unwrap().len(), 1);
    }

    #[test]
    fn test_subscribe_sees_later_writes() {
        let dir = tempdir().unwrap();
        let remote = connect(dir.path());
        remote.insert_row(&record("before", 1)).unwrap();
        let mut feed = remote.subscribe();

        remote.table.insert("junk", b"{".to_vec()).unwrap();
        remote.update_row(&record("t1", 4)).unwrap();
        remote.remove_row("t1").unwrap();

        let change = feed.next_change_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(change.key, "t1");
        assert_eq!(change.new_val.unwrap().version, 4);
        let removed = feed.next_change_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(removed.new_val, None);
        assert!(feed
            .next_change_timeout(Duration::from_millis(50))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_feed_recv_async() {
        let dir = tempdir().unwrap();
        let remote = connect(dir.path());
        let mut feed = remote.subscribe();
        let writer = remote.clone();
        tokio::task::spawn_blocking(move || writer.update_row(&record("t9", 2)))
            .await
            .unwrap()
            .unwrap();
        let change = feed.recv().await.unwrap();
        assert_eq!(change.key, "t9");
    }
}
