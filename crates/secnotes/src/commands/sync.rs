use libsecnotes_core::merge::SyncReport;
use libsecnotes_core::{sync_note_map_with_remote, RemoteStore, SecNotesError};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::SecNotesContext;
use crate::output::{output_success, print_warning};

#[derive(Serialize)]
pub struct SkippedJson {
    pub note_id: Option<String>,
    pub reason: String,
}

#[derive(Serialize)]
pub struct SyncOutput {
    pub pulled: usize,
    pub replaced: usize,
    pub merged: usize,
    pub pushed_updates: usize,
    pub pushed_inserts: usize,
    pub skipped: Vec<SkippedJson>,
    pub total_notes: usize,
}

impl SyncOutput {
    pub fn new(report: SyncReport, total_notes: usize) -> Self {
        Self {
            pulled: report.pulled,
            replaced: report.replaced,
            merged: report.merged,
            pushed_updates: report.pushed_updates,
            pushed_inserts: report.pushed_inserts,
            skipped: report
                .skipped
                .into_iter()
                .map(|s| SkippedJson {
                    note_id: s.id,
                    reason: s.reason,
                })
                .collect(),
            total_notes,
        }
    }

    pub fn human(&self) -> String {
        format!(
            "Synced {} notes: {} pulled, {} replaced, {} merged, {} updated, {} inserted",
            self.total_notes,
            self.pulled,
            self.replaced,
            self.merged,
            self.pushed_updates,
            self.pushed_inserts
        )
    }
}

pub fn run(cli: &Cli) -> Result<(), SecNotesError> {
    let ctx = SecNotesContext::resolve(cli)?;
    let mut remote = ctx.require_remote()?;
    let mut nb = ctx.load_notebook(cli)?;

    let snapshot = remote.retrieve_all()?;
    let report = sync_note_map_with_remote(&mut nb, snapshot, &mut remote, &ctx.store)?;
    let output = SyncOutput::new(report, nb.len());
    for s in &output.skipped {
        print_warning(
            cli,
            &format!("skipped {}: {}", s.note_id.as_deref().unwrap_or("record"), s.reason),
        );
    }
    output_success(cli, output, SyncOutput::human);
    Ok(())
}
