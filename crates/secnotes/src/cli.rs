use clap::{Parser, Subcommand};
use libsecnotes_core::NoteStatus;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "secnotes",
    about = "Security review notes and breadcrumb trails for source code",
    version
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Author recorded on new comments (overrides config)
    #[arg(long, global = true)]
    pub author: Option<String>,

    /// Log filter used when SECNOTES_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write .security-notes/config.toml for this workspace
    Init {
        /// Default author name
        #[arg(long)]
        name: Option<String>,

        /// Enable the shared notes table
        #[arg(long)]
        collab: bool,

        /// Shared database directory
        #[arg(long)]
        database: Option<PathBuf>,

        /// Shared table name
        #[arg(long)]
        project: Option<String>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Note thread commands
    Note {
        #[command(subcommand)]
        cmd: NoteCommand,
    },

    /// Breadcrumb trail commands
    Trail {
        #[command(subcommand)]
        cmd: TrailCommand,
    },

    /// Create TODO notes from a findings file
    Import {
        /// JSON array of {uri, startLine, endLine?, text, tool?}
        file: PathBuf,

        /// Author for findings that do not name a tool
        #[arg(long, default_value = "import")]
        tool: String,
    },

    /// Reconcile local notes with the shared table once
    Sync,

    /// Sync, then follow changes to the shared table until interrupted
    Watch {
        /// Seconds between checks for local edits made by other commands
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

fn parse_status(s: &str) -> Result<NoteStatus, String> {
    s.parse()
}

#[derive(Subcommand, Clone)]
pub enum NoteCommand {
    /// Open a new note on a code range
    Add {
        /// File path, relative to the workspace root
        file: PathBuf,

        /// Lines, 1-based: 12, 12-20 or 12:4-12:30
        #[arg(long)]
        lines: String,

        /// Note text
        #[arg(long)]
        body: String,
    },

    /// Reply to a note
    Reply {
        /// Note ID (or unique prefix)
        id: String,

        /// Reply text
        #[arg(long)]
        body: String,
    },

    /// Set a note's status
    Status {
        /// Note ID (or unique prefix)
        id: String,

        /// todo, vulnerable or not-vulnerable
        #[arg(value_parser = parse_status)]
        status: NoteStatus,

        /// Reply added alongside the status change
        #[arg(long)]
        reply: Option<String>,
    },

    /// Rewrite a comment
    Edit {
        /// Note ID (or unique prefix)
        id: String,

        /// Comment ID (or unique prefix)
        comment: String,

        /// New text
        #[arg(long)]
        body: String,
    },

    /// Delete a comment; deleting the last one deletes the note
    DeleteComment {
        /// Note ID (or unique prefix)
        id: String,

        /// Comment ID (or unique prefix)
        comment: String,
    },

    /// Delete a whole note
    Delete {
        /// Note ID (or unique prefix)
        id: String,
    },

    /// Toggle a reaction on a comment
    React {
        /// Note ID (or unique prefix)
        id: String,

        /// Comment ID (or unique prefix)
        comment: String,

        /// Reaction label, e.g. 👍
        reaction: String,
    },

    /// List notes
    List {
        /// Filter by status (repeatable)
        #[arg(long, value_parser = parse_status)]
        status: Vec<NoteStatus>,

        /// Only notes on this workspace-relative path
        #[arg(long)]
        path: Option<String>,

        /// Include notes without a status
        #[arg(long)]
        unset: bool,
    },

    /// Show a note with its comments
    Show {
        /// Note ID (or unique prefix)
        id: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum TrailCommand {
    /// Create a trail and make it active
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Keep the current active trail
        #[arg(long)]
        no_activate: bool,
    },

    /// Rename a trail; the description is replaced too
    Rename {
        /// Trail ID (or unique prefix)
        id: String,

        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a trail
    Delete {
        /// Trail ID (or unique prefix)
        id: String,
    },

    /// Select the active trail
    Use {
        /// Trail ID (or unique prefix)
        id: Option<String>,

        /// Clear the active trail instead
        #[arg(long, conflicts_with = "id")]
        clear: bool,
    },

    /// Record a code location on a trail
    Add {
        /// File path, relative to the workspace root
        file: PathBuf,

        /// Lines, 1-based: 12, 12-20 or 12:4-12:30
        #[arg(long)]
        lines: String,

        /// Why this location matters
        #[arg(long)]
        note: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        /// Trail to add to (defaults to the active trail)
        #[arg(long)]
        trail: Option<String>,
    },

    /// Set or clear a crumb's note
    Note {
        /// Crumb ID (or unique prefix)
        crumb: String,

        /// New note; omit to clear
        #[arg(long)]
        note: Option<String>,

        #[arg(long)]
        trail: Option<String>,
    },

    /// Remove a crumb
    Remove {
        /// Crumb ID (or unique prefix)
        crumb: String,

        #[arg(long)]
        trail: Option<String>,
    },

    /// Move a crumb to a new 1-based position
    Move {
        /// Crumb ID (or unique prefix)
        crumb: String,

        position: usize,

        #[arg(long)]
        trail: Option<String>,
    },

    /// List trails, most recently updated first
    List,

    /// Show a trail's crumbs (defaults to the active trail)
    Show {
        /// Trail ID (or unique prefix)
        id: Option<String>,
    },
}
