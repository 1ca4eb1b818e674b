//! In-memory note repository.
//!
//! `Notebook` owns every note thread of a session plus the bookkeeping needed
//! to tell local edits apart from what the shared store already has. Callers
//! (the CLI, the change-feed loop) go through these value-level operations;
//! persisting the result is their job.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::debug;

use crate::error::SecNotesError;
use crate::serialization::Workspace;
use crate::types::finding::ToolFinding;
use crate::types::ids::generate_id;
use crate::types::note::{default_reactions, NoteComment, NoteStatus, NoteThread};
use crate::types::range::TextRange;

/// What `delete_comment` removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    CommentRemoved,
    /// The last comment went away, taking the thread with it
    ThreadRemoved,
}

/// Filter for listing notes
#[derive(Debug, Default, Clone)]
pub struct NoteFilter {
    /// Keep notes with any of these statuses; empty keeps everything
    pub statuses: Vec<NoteStatus>,
    /// Also keep notes whose first comment has no status prefix
    pub include_unset: bool,
    /// Keep notes on this workspace-relative path only
    pub path: Option<String>,
}

impl NoteFilter {
    fn matches(&self, ws: &Workspace, thread: &NoteThread) -> bool {
        if let Some(ref path) = self.path {
            if &ws.to_relative(&thread.uri) != path {
                return false;
            }
        }
        if self.statuses.is_empty() && !self.include_unset {
            return true;
        }
        match thread.status() {
            Some(s) => self.statuses.contains(&s),
            None => self.include_unset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notebook {
    workspace: Workspace,
    threads: BTreeMap<String, NoteThread>,
    /// Version of each thread as last written to or read from the shared store
    synced: HashMap<String, u64>,
}

impl Notebook {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            threads: BTreeMap::new(),
            synced: HashMap::new(),
        }
    }

    pub fn from_threads(workspace: Workspace, threads: impl IntoIterator<Item = NoteThread>) -> Self {
        let mut nb = Self::new(workspace);
        for t in threads {
            nb.threads.insert(t.id.clone(), t);
        }
        nb
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.threads.contains_key(thread_id)
    }

    pub fn get(&self, thread_id: &str) -> Option<&NoteThread> {
        self.threads.get(thread_id)
    }

    pub(crate) fn get_mut(&mut self, thread_id: &str) -> Option<&mut NoteThread> {
        self.threads.get_mut(thread_id)
    }

    /// All threads, ordered by id
    pub fn threads(&self) -> impl Iterator<Item = &NoteThread> {
        self.threads.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.threads.keys().cloned().collect()
    }

    pub fn list(&self, filter: &NoteFilter) -> Vec<&NoteThread> {
        self.threads
            .values()
            .filter(|t| filter.matches(&self.workspace, t))
            .collect()
    }

    /// Insert or replace a whole thread
    pub fn insert(&mut self, thread: NoteThread) -> Option<NoteThread> {
        self.threads.insert(thread.id.clone(), thread)
    }

    /// Resolve a full id or an unambiguous id prefix
    pub fn resolve_id(&self, prefix: &str) -> Result<String, SecNotesError> {
        if self.threads.contains_key(prefix) {
            return Ok(prefix.to_string());
        }
        let mut matches = self.threads.keys().filter(|k| k.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) if !prefix.is_empty() => Ok(id.clone()),
            (Some(_), Some(_)) => Err(SecNotesError::InvalidArgs(format!(
                "note id prefix '{}' is ambiguous",
                prefix
            ))),
            _ => Err(SecNotesError::note_not_found(prefix)),
        }
    }

    fn new_comment(&self, text: &str, author: &str) -> NoteComment {
        NoteComment::new(text, author, default_reactions(&self.workspace.assets_dir))
    }

    /// Open a new thread; its first comment is tagged TODO
    pub fn create_note(
        &mut self,
        uri: PathBuf,
        range: TextRange,
        text: &str,
        author: &str,
    ) -> String {
        let id = generate_id();
        let mut comment = self.new_comment(text, author);
        comment.apply_status(NoteStatus::Todo);
        let mut thread = NoteThread::new(id.clone(), uri, range);
        thread.push_comment(comment);
        debug!(thread = %id, "created note");
        self.threads.insert(id.clone(), thread);
        id
    }

    /// Append a reply. Returns the new comment id.
    pub fn reply(&mut self, thread_id: &str, text: &str, author: &str) -> Option<String> {
        let comment = self.new_comment(text, author);
        let thread = self.threads.get_mut(thread_id)?;
        let id = comment.id.clone();
        thread.push_comment(comment);
        Some(id)
    }

    /// Retag the thread, optionally append the reviewer's reply, then record
    /// the change as its own comment
    pub fn set_status(
        &mut self,
        thread_id: &str,
        status: NoteStatus,
        author: &str,
        reply_text: Option<&str>,
    ) -> bool {
        let reply = reply_text
            .filter(|t| !t.trim().is_empty())
            .map(|t| self.new_comment(t, author));
        let notice = self.new_comment(&format!("Status changed to {}.", status), author);

        let Some(thread) = self.threads.get_mut(thread_id) else {
            return false;
        };
        let Some(first) = thread.comments.first_mut() else {
            return false;
        };
        first.apply_status(status);
        if let Some(reply) = reply {
            thread.push_comment(reply);
        }
        thread.push_comment(notice);
        true
    }

    pub fn begin_edit(&mut self, thread_id: &str, comment_id: &str) -> bool {
        self.with_comment(thread_id, comment_id, |c| {
            c.begin_edit();
            false
        })
    }

    /// False when the comment is missing or not being edited
    pub fn set_draft(&mut self, thread_id: &str, comment_id: &str, text: &str) -> bool {
        let mut accepted = false;
        let found = self.with_comment(thread_id, comment_id, |c| {
            accepted = c.set_draft(text);
            false
        });
        found && accepted
    }

    /// Commit the draft. A draft of the opening comment without any status
    /// prefix gets the thread's current status back.
    pub fn save_edit(&mut self, thread_id: &str, comment_id: &str) -> bool {
        let status = self.opening_status(thread_id, comment_id);
        self.with_comment(thread_id, comment_id, |c| {
            if let Some(status) = status {
                if NoteStatus::of(&c.body).is_none() {
                    c.body = status.apply_to(&c.body);
                }
            }
            let changed = c.body != c.saved_body;
            c.save_edit();
            changed
        })
    }

    pub fn cancel_edit(&mut self, thread_id: &str, comment_id: &str) -> bool {
        self.with_comment(thread_id, comment_id, |c| {
            c.cancel_edit();
            false
        })
    }

    /// Begin, draft and save in one step. Rewriting the opening comment keeps
    /// the thread's status prefix.
    pub fn edit_comment(&mut self, thread_id: &str, comment_id: &str, text: &str) -> bool {
        let text = match self.opening_status(thread_id, comment_id) {
            Some(status) => status.apply_to(text),
            None => text.to_string(),
        };
        self.begin_edit(thread_id, comment_id)
            && self.set_draft(thread_id, comment_id, &text)
            && self.save_edit(thread_id, comment_id)
    }

    pub fn toggle_reaction(
        &mut self,
        thread_id: &str,
        comment_id: &str,
        label: &str,
        author: &str,
    ) -> bool {
        let Some(thread) = self.threads.get_mut(thread_id) else {
            return false;
        };
        let toggled = thread
            .comment_mut(comment_id)
            .map(|c| c.toggle_reaction(label, author))
            .unwrap_or(false);
        if toggled {
            thread.touch();
        }
        toggled
    }

    /// Remove one comment. The opening comment carries the status and can only
    /// go once it is the last one left.
    pub fn delete_comment(
        &mut self,
        thread_id: &str,
        comment_id: &str,
    ) -> Result<Option<DeleteOutcome>, SecNotesError> {
        let Some(thread) = self.threads.get_mut(thread_id) else {
            return Ok(None);
        };
        let Some(idx) = thread.comments.iter().position(|c| c.id == comment_id) else {
            return Ok(None);
        };
        if idx == 0 && thread.comments.len() > 1 {
            return Err(SecNotesError::Conflict(
                "the opening comment cannot be deleted while replies exist".to_string(),
            ));
        }
        thread.comments.remove(idx);
        if thread.comments.is_empty() {
            self.threads.remove(thread_id);
            self.synced.remove(thread_id);
            return Ok(Some(DeleteOutcome::ThreadRemoved));
        }
        thread.refresh_deletable();
        thread.touch();
        Ok(Some(DeleteOutcome::CommentRemoved))
    }

    pub fn delete_note(&mut self, thread_id: &str) -> Option<NoteThread> {
        self.synced.remove(thread_id);
        self.threads.remove(thread_id)
    }

    /// Turn each finding into a new TODO note authored by the tool.
    /// Returns the new thread ids in finding order.
    pub fn import_findings(&mut self, findings: Vec<ToolFinding>) -> Vec<String> {
        findings
            .into_iter()
            .map(|f| self.create_note(f.uri, f.range, &f.text, &f.tool))
            .collect()
    }

    /// Record that the shared store holds `version` of this thread
    pub fn mark_synced(&mut self, thread_id: &str, version: u64) {
        self.synced.insert(thread_id.to_string(), version);
    }

    pub fn synced_version(&self, thread_id: &str) -> Option<u64> {
        self.synced.get(thread_id).copied()
    }

    /// Whether the local thread carries edits the shared store has not seen
    pub fn has_unpushed(&self, thread_id: &str) -> bool {
        match self.threads.get(thread_id) {
            Some(t) => self.synced.get(thread_id) != Some(&t.version),
            None => false,
        }
    }

    /// Run `f` on a comment; bump the thread version when `f` reports a change
    /// Thread status, when `comment_id` is the thread's opening comment
    fn opening_status(&self, thread_id: &str, comment_id: &str) -> Option<NoteStatus> {
        let thread = self.threads.get(thread_id)?;
        match thread.comments.first() {
            Some(first) if first.id == comment_id => thread.status(),
            _ => None,
        }
    }

    fn with_comment<F>(&mut self, thread_id: &str, comment_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut NoteComment) -> bool,
    {
        let Some(thread) = self.threads.get_mut(thread_id) else {
            return false;
        };
        let Some(comment) = thread.comment_mut(comment_id) else {
            return false;
        };
        if f(comment) {
            thread.touch();
        }
        true
    }
}
