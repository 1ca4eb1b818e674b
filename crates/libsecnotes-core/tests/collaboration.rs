//! End-to-end tests for two reviewers sharing one notes table
//!
//! Each reviewer has their own workspace and notes file; the table is an
//! in-process map standing in for the shared database.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use libsecnotes_core::serialization::serialize_notes;
use libsecnotes_core::{
    sync_note_map_with_remote, Config, LocalStore, NoteStatus, Notebook, RemoteStore,
    SecNotesError, SerializedThread, TextRange,
};
use serde_json::Value;
use tempfile::tempdir;

#[derive(Default)]
struct SharedTable {
    rows: BTreeMap<String, Value>,
}

impl RemoteStore for SharedTable {
    fn retrieve_all(&self) -> Result<Vec<Value>, SecNotesError> {
        Ok(self.rows.values().cloned().collect())
    }

    fn insert(&mut self, thread: &SerializedThread) -> Result<(), SecNotesError> {
        if self.rows.contains_key(&thread.id) {
            return Err(SecNotesError::Conflict(format!("duplicate row {}", thread.id)));
        }
        self.rows.insert(thread.id.clone(), serde_json::to_value(thread)?);
        Ok(())
    }

    fn update(&mut self, thread: &SerializedThread) -> Result<(), SecNotesError> {
        self.rows.insert(thread.id.clone(), serde_json::to_value(thread)?);
        Ok(())
    }

    fn remove(&mut self, thread_id: &str) -> Result<bool, SecNotesError> {
        Ok(self.rows.remove(thread_id).is_some())
    }
}

fn reviewer(root: &Path) -> (Notebook, LocalStore) {
    let config = Config::default();
    let store = config.local_store(root);
    let nb = store.load_notebook(config.workspace(root)).unwrap().value;
    (nb, store)
}

fn sync(nb: &mut Notebook, table: &mut SharedTable, store: &LocalStore) {
    let snapshot = table.retrieve_all().unwrap();
    let report = sync_note_map_with_remote(nb, snapshot, table, store).unwrap();
    assert!(report.skipped.is_empty(), "unexpected skips: {:?}", report.skipped);
}

fn bodies(nb: &Notebook, id: &str) -> Vec<String> {
    nb.get(id)
        .unwrap()
        .comments
        .iter()
        .map(|c| c.body.clone())
        .collect()
}

fn comment_ids(nb: &Notebook, id: &str) -> Vec<String> {
    nb.get(id)
        .unwrap()
        .comments
        .iter()
        .map(|c| c.id.clone())
        .collect()
}

#[test]
fn test_two_reviewers_converge() {
    let alice_dir = tempdir().unwrap();
    let bob_dir = tempdir().unwrap();
    let mut table = SharedTable::default();

    let (mut alice, alice_store) = reviewer(alice_dir.path());
    let id = alice.create_note(
        alice_dir.path().join("src/session.rs"),
        TextRange::lines(41, 44),
        "session id derived from time",
        "alice",
    );
    sync(&mut alice, &mut table, &alice_store);

    let (mut bob, bob_store) = reviewer(bob_dir.path());
    sync(&mut bob, &mut table, &bob_store);
    assert_eq!(
        bob.get(&id).unwrap().uri,
        bob_dir.path().join("src/session.rs")
    );

    // both reply while offline
    alice.reply(&id, "predictable within a second", "alice");
    bob.set_status(&id, NoteStatus::Vulnerable, "bob", Some("confirmed with a PoC"));

    sync(&mut bob, &mut table, &bob_store);
    sync(&mut alice, &mut table, &alice_store);
    sync(&mut bob, &mut table, &bob_store);

    // same comments in the same order on both sides
    assert_eq!(comment_ids(&alice, &id), comment_ids(&bob, &id));
    assert_eq!(comment_ids(&bob, &id).len(), 4);
    assert!(bodies(&bob, &id).contains(&"predictable within a second".to_string()));
    assert!(bodies(&alice, &id).contains(&"Status changed to Vulnerable.".to_string()));
    assert_eq!(alice.get(&id).unwrap().status(), Some(NoteStatus::Vulnerable));
    assert_eq!(bob.get(&id).unwrap().status(), Some(NoteStatus::Vulnerable));

    // further passes leave the table alone
    let settled = table.rows.clone();
    sync(&mut alice, &mut table, &alice_store);
    sync(&mut bob, &mut table, &bob_store);
    assert_eq!(table.rows, settled);

    // notes files reload to the same content
    let (reloaded, _) = reviewer(bob_dir.path());
    assert_eq!(
        serialize_notes(reloaded.workspace(), reloaded.threads()),
        serialize_notes(bob.workspace(), bob.threads())
    );
}

#[test]
fn test_status_change_reaches_reviewer_after_restart() {
    let alice_dir = tempdir().unwrap();
    let bob_dir = tempdir().unwrap();
    let mut table = SharedTable::default();

    let (mut alice, alice_store) = reviewer(alice_dir.path());
    let id = alice.create_note(
        alice_dir.path().join("src/upload.rs"),
        TextRange::lines(7, 9),
        "filename joined onto the upload dir",
        "alice",
    );
    sync(&mut alice, &mut table, &alice_store);

    let (mut bob, bob_store) = reviewer(bob_dir.path());
    sync(&mut bob, &mut table, &bob_store);
    bob.set_status(&id, NoteStatus::Vulnerable, "bob", None);
    sync(&mut bob, &mut table, &bob_store);

    // alice starts a new session from her notes file and alternates with bob
    let (mut alice, alice_store) = reviewer(alice_dir.path());
    assert!(!alice.has_unpushed(&id));
    for _ in 0..3 {
        sync(&mut alice, &mut table, &alice_store);
        sync(&mut bob, &mut table, &bob_store);
    }

    assert_eq!(alice.get(&id).unwrap().status(), Some(NoteStatus::Vulnerable));
    assert_eq!(bob.get(&id).unwrap().status(), Some(NoteStatus::Vulnerable));
    assert_eq!(comment_ids(&alice, &id), comment_ids(&bob, &id));
    let row: SerializedThread = serde_json::from_value(table.rows[&id].clone()).unwrap();
    assert!(row.comments[0].body.starts_with("[Vulnerable] "));
}

#[test]
fn test_concurrent_saves_leave_a_valid_file() {
    let dir = tempdir().unwrap();
    let root = Arc::new(dir.path().to_path_buf());
    let num_threads = 6;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let root = Arc::clone(&root);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let config = Config::default();
                let store = config.local_store(&root);
                let mut nb = Notebook::new(config.workspace(&root));
                for n in 0..=i {
                    nb.create_note(root.join("a.rs"), TextRange::lines(n as u32, n as u32), "x", "t");
                }
                barrier.wait();
                store.save_notes(&nb)
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap().unwrap();
    }

    let (nb, store) = reviewer(&root);
    let outcome = store.load_notes(nb.workspace()).unwrap();
    assert!(outcome.warning.is_none());
    assert!((1..=num_threads).contains(&outcome.value.len()));
}
