use std::path::PathBuf;

use libsecnotes_core::config::config_path;
use libsecnotes_core::{load_config, save_config, Config, SecNotesError};
use serde::Serialize;

use crate::cli::Cli;
use crate::output::output_success;

#[derive(Serialize)]
struct InitOutput {
    config: String,
    author_name: String,
    notes_file: String,
    breadcrumbs_file: String,
    collab_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_name: Option<String>,
}

pub struct InitOptions {
    pub name: Option<String>,
    pub collab: bool,
    pub database: Option<PathBuf>,
    pub project: Option<String>,
    pub force: bool,
}

pub fn run(cli: &Cli, opts: InitOptions) -> Result<(), SecNotesError> {
    let root = match &cli.workspace {
        Some(p) => p.clone(),
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(SecNotesError::InvalidArgs(format!(
            "workspace {} is not a directory",
            root.display()
        )));
    }

    let existing = load_config(&root)?;
    if existing.is_some() && !opts.force {
        return Err(SecNotesError::Conflict(format!(
            "{} already exists; pass --force to overwrite",
            config_path(&root).display()
        )));
    }

    let mut config = existing.unwrap_or_default();
    if let Some(name) = opts.name.filter(|n| !n.trim().is_empty()) {
        config.author_name = name;
    }
    if opts.collab {
        config.collab.enabled = true;
    }
    if let Some(db) = opts.database {
        config.collab.database = db;
    }
    if let Some(project) = opts.project.filter(|p| !p.trim().is_empty()) {
        config.collab.project_name = project;
    }

    save_config(&root, &config)?;
    tracing::info!(root = %root.display(), collab = config.collab.enabled, "wrote config");

    output_success(cli, summarize(&root, &config), |o| {
        let mut msg = format!("Initialized security notes in {}", o.config);
        if o.collab_enabled {
            msg.push_str(&format!(
                "\nSharing enabled: table '{}' in {}",
                o.project_name.as_deref().unwrap_or(""),
                o.database.as_deref().unwrap_or("")
            ));
        }
        msg
    });
    Ok(())
}

fn summarize(root: &std::path::Path, config: &Config) -> InitOutput {
    let collab = config.collab.enabled;
    InitOutput {
        config: config_path(root).to_string_lossy().to_string(),
        author_name: config.author_name.clone(),
        notes_file: config.notes_file.clone(),
        breadcrumbs_file: config.breadcrumbs_file.clone(),
        collab_enabled: collab,
        database: collab.then(|| config.database_path(root).to_string_lossy().to_string()),
        project_name: collab.then(|| config.collab.project_name.clone()),
    }
}
