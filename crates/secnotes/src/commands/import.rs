use std::path::Path;

use libsecnotes_core::{FindingRecord, SecNotesError};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::SecNotesContext;
use crate::output::output_success;

#[derive(Serialize)]
struct ImportOutput {
    imported: usize,
    note_ids: Vec<String>,
}

pub fn run(cli: &Cli, file: &Path, tool: &str) -> Result<(), SecNotesError> {
    let ctx = SecNotesContext::resolve(cli)?;
    let path = ctx.resolve_file(file);
    let content = std::fs::read_to_string(&path)?;
    let records: Vec<FindingRecord> = serde_json::from_str(&content).map_err(|e| {
        SecNotesError::InvalidArgs(format!("{} is not a findings list: {}", path.display(), e))
    })?;

    let findings = records
        .into_iter()
        .map(|r| r.into_finding(&ctx.root, tool))
        .collect();

    let mut nb = ctx.load_notebook(cli)?;
    let note_ids = nb.import_findings(findings);
    if note_ids.is_empty() {
        output_success(
            cli,
            ImportOutput {
                imported: 0,
                note_ids,
            },
            |_| "No findings to import".to_string(),
        );
        return Ok(());
    }

    ctx.save_notebook(&nb)?;
    let mut published = false;
    for id in &note_ids {
        published |= ctx.publish(cli, &mut nb, id, true);
    }
    if published {
        ctx.save_notebook(&nb)?;
    }
    tracing::info!(count = note_ids.len(), file = %path.display(), "imported findings");

    output_success(
        cli,
        ImportOutput {
            imported: note_ids.len(),
            note_ids,
        },
        |o| format!("Imported {} finding{}", o.imported, if o.imported == 1 { "" } else { "s" }),
    );
    Ok(())
}
