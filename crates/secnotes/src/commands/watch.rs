//! Follow the shared table and keep the local notes file current.
//!
//! The shared database is held open for the whole session, so note commands
//! run meanwhile cannot publish and only write the notes file. The watcher
//! polls that file and resyncs when it changes.

use std::time::{Duration, SystemTime};

use libsecnotes_core::{
    apply_remote_change, apply_remote_removal, sync_note_map_with_remote, Notebook, RemoteApply,
    RemoteStore, SecNotesError,
};
use libsecnotes_remote::{Change, SledRemote};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::commands::sync::SyncOutput;
use crate::context::SecNotesContext;
use crate::output::{output_success, print_human, print_warning};

#[derive(Serialize, Default)]
struct FeedCounts {
    installed: usize,
    replaced: usize,
    merged: usize,
    ignored: usize,
    removed: usize,
    local_resyncs: usize,
}

#[derive(Serialize)]
struct WatchOutput {
    initial_sync: SyncOutput,
    feed: FeedCounts,
    total_notes: usize,
}

struct Watcher<'a> {
    cli: &'a Cli,
    ctx: &'a SecNotesContext,
    remote: SledRemote,
    notebook: Notebook,
    counts: FeedCounts,
    last_mtime: Option<SystemTime>,
}

pub fn run(cli: &Cli, interval: u64) -> Result<(), SecNotesError> {
    let ctx = SecNotesContext::resolve(cli)?;
    let remote = ctx.require_remote()?;
    let period = Duration::from_secs(interval.max(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(cli, &ctx, remote, period))
}

async fn watch(
    cli: &Cli,
    ctx: &SecNotesContext,
    mut remote: SledRemote,
    period: Duration,
) -> Result<(), SecNotesError> {
    let mut feed = remote.subscribe();
    let mut notebook = ctx.load_notebook(cli)?;
    let snapshot = remote.retrieve_all()?;
    let report = sync_note_map_with_remote(&mut notebook, snapshot, &mut remote, &ctx.store)?;
    let initial_sync = SyncOutput::new(report, notebook.len());
    print_human(cli, &initial_sync.human());
    print_human(
        cli,
        &format!("Watching table '{}' (Ctrl-C to stop)", remote.project_name()),
    );

    let mut watcher = Watcher {
        cli,
        ctx,
        remote,
        notebook,
        counts: FeedCounts::default(),
        last_mtime: notes_mtime(ctx),
    };

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("stopping watch");
                break;
            }
            change = feed.recv() => {
                watcher.on_change(change?)?;
            }
            _ = ticker.tick() => {
                if let Err(e) = watcher.on_tick() {
                    warn!(error = %e, "local resync failed");
                    print_warning(cli, &format!("resync failed ({})", e));
                }
            }
        }
    }

    let output = WatchOutput {
        initial_sync,
        total_notes: watcher.notebook.len(),
        feed: watcher.counts,
    };
    output_success(cli, output, |o| {
        format!(
            "Stopped. {} installed, {} replaced, {} merged, {} removed, {} local resyncs",
            o.feed.installed, o.feed.replaced, o.feed.merged, o.feed.removed, o.feed.local_resyncs
        )
    });
    Ok(())
}

impl Watcher<'_> {
    fn on_change(&mut self, change: Change) -> Result<(), SecNotesError> {
        let Some(record) = change.new_val else {
            if apply_remote_removal(&mut self.notebook, &change.key) {
                debug!(thread = %change.key, "removed by collaborator");
                self.counts.removed += 1;
                self.save()?;
            }
            return Ok(());
        };

        let id = record.id.clone();
        match apply_remote_change(&mut self.notebook, record) {
            RemoteApply::Ignored => {
                self.counts.ignored += 1;
                return Ok(());
            }
            RemoteApply::Installed => self.counts.installed += 1,
            RemoteApply::Replaced => self.counts.replaced += 1,
            RemoteApply::Merged => {
                self.counts.merged += 1;
                self.push_merged(&id);
            }
        }
        debug!(thread = %id, "applied remote change");
        self.save()
    }

    /// Publish a thread after folding in a concurrent edit
    fn push_merged(&mut self, id: &str) {
        let Some(thread) = self.notebook.get(id) else {
            return;
        };
        let version = thread.version;
        match self.remote.push_note(self.notebook.workspace(), thread, false) {
            Ok(()) => self.notebook.mark_synced(id, version),
            Err(e) => {
                warn!(thread = %id, error = %e, "failed to push merged thread");
                print_warning(self.cli, &format!("merge of {} not shared ({})", id, e));
            }
        }
    }

    /// Pick up edits other commands wrote to the notes file
    fn on_tick(&mut self) -> Result<(), SecNotesError> {
        let mtime = notes_mtime(self.ctx);
        if mtime == self.last_mtime {
            return Ok(());
        }
        debug!("notes file changed on disk; resyncing");

        let mut fresh = self.ctx.load_notebook(self.cli)?;
        for id in self.notebook.ids() {
            if !fresh.contains(&id) && self.notebook.synced_version(&id).is_some() {
                self.remote.remove(&id)?;
            }
        }
        let snapshot = self.remote.retrieve_all()?;
        let report =
            sync_note_map_with_remote(&mut fresh, snapshot, &mut self.remote, &self.ctx.store)?;
        info!(
            pushed_updates = report.pushed_updates,
            pushed_inserts = report.pushed_inserts,
            "resynced local edits"
        );
        self.notebook = fresh;
        self.counts.local_resyncs += 1;
        self.last_mtime = notes_mtime(self.ctx);
        Ok(())
    }

    fn save(&mut self) -> Result<(), SecNotesError> {
        self.ctx.save_notebook(&self.notebook)?;
        self.last_mtime = notes_mtime(self.ctx);
        Ok(())
    }
}

fn notes_mtime(ctx: &SecNotesContext) -> Option<SystemTime> {
    std::fs::metadata(ctx.store.notes_path())
        .and_then(|m| m.modified())
        .ok()
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
