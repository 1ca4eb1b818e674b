use std::path::{Path, PathBuf};

use libsecnotes_core::types::range::parse_range_spec;
use libsecnotes_core::{
    load_config, BreadcrumbStore, Config, LocalStore, Notebook, RemoteStore, SecNotesError, TextRange,
    Workspace,
};
use libsecnotes_remote::{RemoteConfig, SledRemote};
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::output::print_warning;

/// Resolved workspace, config and stores for one command
pub struct SecNotesContext {
    pub root: PathBuf,
    pub config: Config,
    pub workspace: Workspace,
    pub store: LocalStore,
    pub author: String,
}

impl SecNotesContext {
    /// Resolve context from the CLI flags.
    ///
    /// Author priority: --author flag, SECNOTES_AUTHOR, config author_name.
    pub fn resolve(cli: &Cli) -> Result<Self, SecNotesError> {
        let root = match &cli.workspace {
            Some(p) => p.clone(),
            None => std::env::current_dir()?,
        };
        let root = root.canonicalize().map_err(|e| {
            SecNotesError::InvalidArgs(format!("workspace {}: {}", root.display(), e))
        })?;
        let config = load_config(&root)?.unwrap_or_default();
        let author = cli
            .author
            .clone()
            .or_else(|| std::env::var("SECNOTES_AUTHOR").ok())
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| config.author_name.clone());

        debug!(root = %root.display(), author = %author, "resolved workspace");
        Ok(Self {
            workspace: config.workspace(&root),
            store: config.local_store(&root),
            root,
            config,
            author,
        })
    }

    pub fn load_notebook(&self, cli: &Cli) -> Result<Notebook, SecNotesError> {
        let outcome = self.store.load_notebook(self.workspace.clone())?;
        if let Some(w) = &outcome.warning {
            print_warning(cli, w);
        }
        Ok(outcome.value)
    }

    pub fn save_notebook(&self, notebook: &Notebook) -> Result<(), SecNotesError> {
        self.store.save_notes(notebook)?;
        Ok(())
    }

    pub fn load_breadcrumbs(&self, cli: &Cli) -> Result<BreadcrumbStore, SecNotesError> {
        let outcome = self.store.load_breadcrumbs(&self.workspace)?;
        if let Some(w) = &outcome.warning {
            print_warning(cli, w);
        }
        Ok(BreadcrumbStore::from_state(outcome.value))
    }

    pub fn save_breadcrumbs(&self, store: &BreadcrumbStore) -> Result<(), SecNotesError> {
        self.store.save_breadcrumbs(&self.workspace, &store.state())?;
        Ok(())
    }

    /// Open the shared table, or `None` when collaboration is off
    pub fn connect_remote(&self) -> Result<Option<SledRemote>, SecNotesError> {
        if !self.config.collab.enabled {
            return Ok(None);
        }
        let remote_config = RemoteConfig::from_config(&self.config, &self.root);
        Ok(Some(SledRemote::connect(&remote_config)?))
    }

    /// Like `connect_remote`, but fails when collaboration is off
    pub fn require_remote(&self) -> Result<SledRemote, SecNotesError> {
        self.connect_remote()?.ok_or_else(|| {
            SecNotesError::InvalidArgs(
                "collaboration is disabled; set [collab] enabled = true in .security-notes/config.toml"
                    .to_string(),
            )
        })
    }

    /// Save a local edit, then push the thread. A push that lands is saved
    /// again so the synced version is on disk for the next run.
    pub fn commit_note(
        &self,
        cli: &Cli,
        notebook: &mut Notebook,
        thread_id: &str,
        is_new: bool,
    ) -> Result<(), SecNotesError> {
        self.save_notebook(notebook)?;
        if self.publish(cli, notebook, thread_id, is_new) {
            self.save_notebook(notebook)?;
        }
        Ok(())
    }

    /// Push one thread after a local edit. Failures only warn: the local file
    /// already has the edit and the next sync publishes it.
    pub fn publish(&self, cli: &Cli, notebook: &mut Notebook, thread_id: &str, is_new: bool) -> bool {
        let mut remote = match self.connect_remote() {
            Ok(Some(r)) => r,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "shared store unavailable");
                print_warning(cli, &format!("not shared ({}); run 'secnotes sync' later", e));
                return false;
            }
        };
        let Some(thread) = notebook.get(thread_id) else {
            return false;
        };
        let version = thread.version;
        match remote.push_note(&self.workspace, thread, is_new) {
            Ok(()) => {
                notebook.mark_synced(thread_id, version);
                true
            }
            Err(e) => {
                warn!(thread = %thread_id, error = %e, "push failed");
                print_warning(cli, &format!("not shared ({}); run 'secnotes sync' later", e));
                false
            }
        }
    }

    /// Remove a deleted thread from the shared table, if enabled
    pub fn unpublish(&self, cli: &Cli, thread_id: &str) {
        let result = self
            .connect_remote()
            .and_then(|r| match r {
                Some(mut remote) => remote.remove(thread_id).map(|_| ()),
                None => Ok(()),
            });
        if let Err(e) = result {
            warn!(thread = %thread_id, error = %e, "remote delete failed");
            print_warning(cli, &format!("shared copy not deleted ({})", e));
        }
    }

    /// Absolute path for a file argument given relative to the workspace root
    pub fn resolve_file(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.root.join(file)
        }
    }

    /// Read the selected source text of a file; empty when unreadable
    pub fn read_snippet(&self, file: &Path, range: &TextRange) -> String {
        let Ok(content) = std::fs::read_to_string(file) else {
            return String::new();
        };
        let lines: Vec<&str> = content.lines().collect();
        let start = range.start.line as usize;
        let end = (range.end.line as usize).min(lines.len().saturating_sub(1));
        if start >= lines.len() {
            return String::new();
        }
        lines[start..=end].join("\n")
    }
}

pub fn parse_lines(spec: &str) -> Result<TextRange, SecNotesError> {
    parse_range_spec(spec).ok_or_else(|| {
        SecNotesError::InvalidArgs(format!(
            "invalid line range '{}' (expected 12, 12-20 or 12:4-12:30)",
            spec
        ))
    })
}

/// Resolve a full id or unique prefix among `candidates`
pub fn resolve_prefix<'a, I>(
    candidates: I,
    prefix: &str,
    not_found: fn(&str) -> SecNotesError,
) -> Result<String, SecNotesError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matches = Vec::new();
    for c in candidates {
        if c == prefix {
            return Ok(c.to_string());
        }
        if !prefix.is_empty() && c.starts_with(prefix) {
            matches.push(c);
        }
    }
    match matches.as_slice() {
        [one] => Ok((*one).to_string()),
        [] => Err(not_found(prefix)),
        _ => Err(SecNotesError::InvalidArgs(format!(
            "id prefix '{}' is ambiguous",
            prefix
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefix() {
        let ids = ["abc123", "abd456", "ff00"];
        let found = resolve_prefix(ids.iter().copied(), "abc", SecNotesError::trail_not_found);
        assert_eq!(found.unwrap(), "abc123");
        assert!(matches!(
            resolve_prefix(ids.iter().copied(), "ab", SecNotesError::trail_not_found),
            Err(SecNotesError::InvalidArgs(_))
        ));
        assert!(matches!(
            resolve_prefix(ids.iter().copied(), "zz", SecNotesError::trail_not_found),
            Err(SecNotesError::NotFound(_))
        ));
    }
}
