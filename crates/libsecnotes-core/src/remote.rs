//! Seam between the sync engine and a shared notes table.

use serde_json::Value;

use crate::error::SecNotesError;
use crate::serialization::{serialize_thread, SerializedThread, Workspace};
use crate::types::note::NoteThread;

/// A table of serialized note threads keyed by thread id, shared between
/// collaborators
pub trait RemoteStore {
    /// Snapshot of every row. Rows are returned raw so one malformed record
    /// does not hide the rest.
    fn retrieve_all(&self) -> Result<Vec<Value>, SecNotesError>;

    /// Create the row for a thread the table has never seen
    fn insert(&mut self, thread: &SerializedThread) -> Result<(), SecNotesError>;

    /// Replace the row of an existing thread
    fn update(&mut self, thread: &SerializedThread) -> Result<(), SecNotesError>;

    /// Drop a thread's row. Returns whether it existed.
    fn remove(&mut self, thread_id: &str) -> Result<bool, SecNotesError>;

    /// Publish a local thread: insert when it was just opened, update otherwise
    fn push_note(
        &mut self,
        ws: &Workspace,
        thread: &NoteThread,
        is_first_comment: bool,
    ) -> Result<(), SecNotesError> {
        let record = serialize_thread(ws, thread);
        if is_first_comment {
            self.insert(&record)
        } else {
            self.update(&record)
        }
    }
}
