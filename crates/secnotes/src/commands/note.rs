use chrono::{TimeZone, Utc};
use libsecnotes_core::types::breadcrumb::format_range_label;
use libsecnotes_core::types::note::strip_status;
use libsecnotes_core::{
    DeleteOutcome, NoteComment, NoteFilter, NoteThread, Notebook, SecNotesError, Workspace,
};
use serde::Serialize;

use crate::cli::{Cli, NoteCommand};
use crate::context::{parse_lines, resolve_prefix, SecNotesContext};
use crate::output::output_success;

#[derive(Serialize)]
pub struct NoteSummaryJson {
    pub note_id: String,
    pub path: String,
    pub lines: String,
    pub status: Option<String>,
    pub title: String,
    pub comment_count: usize,
    pub version: u64,
}

impl NoteSummaryJson {
    pub fn new(ws: &Workspace, t: &NoteThread) -> Self {
        Self {
            note_id: t.id.clone(),
            path: ws.to_relative(&t.uri),
            lines: format_range_label(&t.range),
            status: t.status().map(|s| s.label().to_string()),
            title: t
                .comments
                .first()
                .map(|c| first_line(strip_status(&c.saved_body)))
                .unwrap_or_default(),
            comment_count: t.comments.len(),
            version: t.version,
        }
    }

    fn human(&self) -> String {
        format!(
            "{}  {}:{}  [{}]  {} ({} comment{})",
            short(&self.note_id),
            self.path,
            self.lines,
            self.status.as_deref().unwrap_or("-"),
            self.title,
            self.comment_count,
            if self.comment_count == 1 { "" } else { "s" }
        )
    }
}

#[derive(Serialize)]
struct ReactionJson {
    label: String,
    count: u32,
}

#[derive(Serialize)]
struct CommentJson {
    comment_id: String,
    author: String,
    body: String,
    timestamp_ms: u64,
    can_delete: bool,
    reactions: Vec<ReactionJson>,
}

impl From<&NoteComment> for CommentJson {
    fn from(c: &NoteComment) -> Self {
        Self {
            comment_id: c.id.clone(),
            author: c.author.clone(),
            body: c.saved_body.clone(),
            timestamp_ms: c.timestamp_ms,
            can_delete: c.can_delete,
            reactions: c
                .reactions
                .iter()
                .filter(|r| r.count > 0)
                .map(|r| ReactionJson {
                    label: r.label.clone(),
                    count: r.count,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct NoteShowOutput {
    note: NoteSummaryJson,
    comments: Vec<CommentJson>,
}

#[derive(Serialize)]
struct NoteListOutput {
    notes: Vec<NoteSummaryJson>,
    total: usize,
}

#[derive(Serialize)]
struct NoteChangeOutput {
    note_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

#[derive(Serialize)]
struct NoteDeleteOutput {
    note_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<String>,
    note_deleted: bool,
}

#[derive(Serialize)]
struct ReactOutput {
    note_id: String,
    comment_id: String,
    reaction: String,
    count: u32,
    reacted: bool,
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or("").to_string()
}

fn format_ts(ms: u64) -> String {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn resolve_comment(nb: &Notebook, note_id: &str, prefix: &str) -> Result<String, SecNotesError> {
    let thread = nb
        .get(note_id)
        .ok_or_else(|| SecNotesError::note_not_found(note_id))?;
    resolve_prefix(
        thread.comments.iter().map(|c| c.id.as_str()),
        prefix,
        SecNotesError::comment_not_found,
    )
}

pub fn run(cli: &Cli, cmd: NoteCommand) -> Result<(), SecNotesError> {
    let ctx = SecNotesContext::resolve(cli)?;
    let mut nb = ctx.load_notebook(cli)?;

    match cmd {
        NoteCommand::Add { file, lines, body } => {
            let range = parse_lines(&lines)?;
            let uri = ctx.resolve_file(&file);
            let id = nb.create_note(uri, range, &body, &ctx.author);
            ctx.commit_note(cli, &mut nb, &id, true)?;
            let comment_id = nb.get(&id).and_then(|t| t.comments.first()).map(|c| c.id.clone());
            output_success(
                cli,
                NoteChangeOutput {
                    note_id: id,
                    comment_id,
                    status: Some("TODO".to_string()),
                },
                |o| format!("Created note {}", o.note_id),
            );
        }
        NoteCommand::Reply { id, body } => {
            let id = nb.resolve_id(&id)?;
            let comment_id = nb
                .reply(&id, &body, &ctx.author)
                .ok_or_else(|| SecNotesError::note_not_found(&id))?;
            ctx.commit_note(cli, &mut nb, &id, false)?;
            output_success(
                cli,
                NoteChangeOutput {
                    note_id: id,
                    comment_id: Some(comment_id),
                    status: None,
                },
                |o| format!("Replied to note {}", short(&o.note_id)),
            );
        }
        NoteCommand::Status { id, status, reply } => {
            let id = nb.resolve_id(&id)?;
            if !nb.set_status(&id, status, &ctx.author, reply.as_deref()) {
                return Err(SecNotesError::note_not_found(&id));
            }
            ctx.commit_note(cli, &mut nb, &id, false)?;
            output_success(
                cli,
                NoteChangeOutput {
                    note_id: id,
                    comment_id: None,
                    status: Some(status.label().to_string()),
                },
                |o| format!("Note {} is now {}", short(&o.note_id), status),
            );
        }
        NoteCommand::Edit { id, comment, body } => {
            let id = nb.resolve_id(&id)?;
            let comment_id = resolve_comment(&nb, &id, &comment)?;
            if !nb.edit_comment(&id, &comment_id, &body) {
                return Err(SecNotesError::comment_not_found(&comment_id));
            }
            ctx.commit_note(cli, &mut nb, &id, false)?;
            output_success(
                cli,
                NoteChangeOutput {
                    note_id: id,
                    comment_id: Some(comment_id),
                    status: None,
                },
                |o| format!("Edited comment {}", short(o.comment_id.as_deref().unwrap_or(""))),
            );
        }
        NoteCommand::DeleteComment { id, comment } => {
            let id = nb.resolve_id(&id)?;
            let comment_id = resolve_comment(&nb, &id, &comment)?;
            let outcome = nb
                .delete_comment(&id, &comment_id)?
                .ok_or_else(|| SecNotesError::comment_not_found(&comment_id))?;
            let note_deleted = outcome == DeleteOutcome::ThreadRemoved;
            if note_deleted {
                ctx.save_notebook(&nb)?;
                ctx.unpublish(cli, &id);
            } else {
                ctx.commit_note(cli, &mut nb, &id, false)?;
            }
            output_success(
                cli,
                NoteDeleteOutput {
                    note_id: id,
                    comment_id: Some(comment_id),
                    note_deleted,
                },
                |o| {
                    if o.note_deleted {
                        format!("Deleted last comment; note {} removed", short(&o.note_id))
                    } else {
                        format!("Deleted comment from note {}", short(&o.note_id))
                    }
                },
            );
        }
        NoteCommand::Delete { id } => {
            let id = nb.resolve_id(&id)?;
            nb.delete_note(&id)
                .ok_or_else(|| SecNotesError::note_not_found(&id))?;
            ctx.save_notebook(&nb)?;
            ctx.unpublish(cli, &id);
            output_success(
                cli,
                NoteDeleteOutput {
                    note_id: id,
                    comment_id: None,
                    note_deleted: true,
                },
                |o| format!("Deleted note {}", short(&o.note_id)),
            );
        }
        NoteCommand::React { id, comment, reaction } => {
            let id = nb.resolve_id(&id)?;
            let comment_id = resolve_comment(&nb, &id, &comment)?;
            if !nb.toggle_reaction(&id, &comment_id, &reaction, &ctx.author) {
                return Err(SecNotesError::InvalidArgs(format!(
                    "unknown reaction '{}'",
                    reaction
                )));
            }
            ctx.commit_note(cli, &mut nb, &id, false)?;
            let r = nb
                .get(&id)
                .and_then(|t| t.comment(&comment_id))
                .and_then(|c| c.reactions.iter().find(|r| r.label == reaction))
                .ok_or_else(|| SecNotesError::comment_not_found(&comment_id))?;
            output_success(
                cli,
                ReactOutput {
                    note_id: id.clone(),
                    comment_id: comment_id.clone(),
                    reaction: reaction.clone(),
                    count: r.count,
                    reacted: r.has_reacted(&ctx.author),
                },
                |o| format!("{} {}", o.reaction, o.count),
            );
        }
        NoteCommand::List { status, path, unset } => {
            let filter = NoteFilter {
                statuses: status,
                include_unset: unset,
                path,
            };
            let notes: Vec<NoteSummaryJson> = nb
                .list(&filter)
                .into_iter()
                .map(|t| NoteSummaryJson::new(nb.workspace(), t))
                .collect();
            let total = notes.len();
            output_success(cli, NoteListOutput { notes, total }, |o| {
                if o.notes.is_empty() {
                    return "No notes".to_string();
                }
                o.notes
                    .iter()
                    .map(NoteSummaryJson::human)
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        NoteCommand::Show { id } => {
            let id = nb.resolve_id(&id)?;
            let thread = nb
                .get(&id)
                .ok_or_else(|| SecNotesError::note_not_found(&id))?;
            let output = NoteShowOutput {
                note: NoteSummaryJson::new(nb.workspace(), thread),
                comments: thread.comments.iter().map(CommentJson::from).collect(),
            };
            output_success(cli, output, |o| {
                let mut lines = vec![o.note.human()];
                for c in &o.comments {
                    lines.push(format!(
                        "  {}  {} ({}): {}",
                        short(&c.comment_id),
                        c.author,
                        format_ts(c.timestamp_ms),
                        c.body
                    ));
                    if !c.reactions.is_empty() {
                        let rs: Vec<String> = c
                            .reactions
                            .iter()
                            .map(|r| format!("{} {}", r.label, r.count))
                            .collect();
                        lines.push(format!("      {}", rs.join("  ")));
                    }
                }
                lines.join("\n")
            });
        }
    }

    Ok(())
}
