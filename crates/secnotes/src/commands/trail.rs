use libsecnotes_core::types::breadcrumb::{format_range_label, snippet_preview};
use libsecnotes_core::{
    BreadcrumbStore, CreateCrumbOptions, CreateTrailOptions, Crumb, SecNotesError, Trail,
    Workspace,
};
use serde::Serialize;

use crate::cli::{Cli, TrailCommand};
use crate::context::{parse_lines, resolve_prefix, SecNotesContext};
use crate::output::{output_success, print_warning};

const PREVIEW_LEN: usize = 80;

#[derive(Serialize)]
struct TrailSummaryJson {
    trail_id: String,
    name: String,
    description: Option<String>,
    active: bool,
    crumb_count: usize,
    created_at: String,
    updated_at: String,
}

impl TrailSummaryJson {
    fn new(trail: &Trail, active_id: Option<&str>) -> Self {
        Self {
            trail_id: trail.id.clone(),
            name: trail.name.clone(),
            description: trail.description.clone(),
            active: active_id == Some(trail.id.as_str()),
            crumb_count: trail.crumbs.len(),
            created_at: trail.created_at.to_rfc3339(),
            updated_at: trail.updated_at.to_rfc3339(),
        }
    }

    fn human(&self) -> String {
        format!(
            "{} {}  {}  ({} crumb{})",
            if self.active { "*" } else { " " },
            short(&self.trail_id),
            self.name,
            self.crumb_count,
            if self.crumb_count == 1 { "" } else { "s" }
        )
    }
}

#[derive(Serialize)]
struct CrumbJson {
    crumb_id: String,
    position: usize,
    path: String,
    lines: String,
    snippet: String,
    note: Option<String>,
    tag: Option<String>,
    created_at: String,
}

impl CrumbJson {
    fn new(ws: &Workspace, crumb: &Crumb, index: usize) -> Self {
        Self {
            crumb_id: crumb.id.clone(),
            position: index + 1,
            path: ws.to_relative(&crumb.uri),
            lines: format_range_label(&crumb.range),
            snippet: crumb.snippet.clone(),
            note: crumb.note.clone(),
            tag: crumb.tag.clone(),
            created_at: crumb.created_at.to_rfc3339(),
        }
    }

    fn human(&self) -> String {
        let mut line = format!(
            "{:>3}. {}  {}:{}  {}",
            self.position,
            short(&self.crumb_id),
            self.path,
            self.lines,
            snippet_preview(&self.snippet, PREVIEW_LEN)
        );
        if let Some(tag) = &self.tag {
            line.push_str(&format!("  #{}", tag));
        }
        if let Some(note) = &self.note {
            line.push_str(&format!("\n       {}", note));
        }
        line
    }
}

#[derive(Serialize)]
struct TrailListOutput {
    trails: Vec<TrailSummaryJson>,
    active_trail_id: Option<String>,
}

#[derive(Serialize)]
struct TrailShowOutput {
    trail: TrailSummaryJson,
    crumbs: Vec<CrumbJson>,
}

#[derive(Serialize)]
struct TrailChangeOutput {
    trail_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crumb_id: Option<String>,
    active_trail_id: Option<String>,
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn resolve_trail(store: &BreadcrumbStore, prefix: &str) -> Result<String, SecNotesError> {
    let trails = store.get_trails();
    resolve_prefix(
        trails.iter().map(|t| t.id.as_str()),
        prefix,
        SecNotesError::trail_not_found,
    )
}

/// Explicit trail, or the active one
fn target_trail(store: &BreadcrumbStore, explicit: Option<&str>) -> Result<Trail, SecNotesError> {
    let id = match explicit {
        Some(p) => resolve_trail(store, p)?,
        None => store.active_trail_id().map(str::to_string).ok_or_else(|| {
            SecNotesError::InvalidArgs(
                "no active trail; create one or pass --trail".to_string(),
            )
        })?,
    };
    store
        .get_trail(&id)
        .ok_or_else(|| SecNotesError::trail_not_found(&id))
}

fn resolve_crumb(trail: &Trail, prefix: &str) -> Result<String, SecNotesError> {
    resolve_prefix(
        trail.crumbs.iter().map(|c| c.id.as_str()),
        prefix,
        SecNotesError::comment_not_found,
    )
}

fn change_output(store: &BreadcrumbStore, trail_id: Option<String>, crumb_id: Option<String>) -> TrailChangeOutput {
    TrailChangeOutput {
        trail_id,
        crumb_id,
        active_trail_id: store.active_trail_id().map(str::to_string),
    }
}

pub fn run(cli: &Cli, cmd: TrailCommand) -> Result<(), SecNotesError> {
    let ctx = SecNotesContext::resolve(cli)?;
    let mut store = ctx.load_breadcrumbs(cli)?;

    match cmd {
        TrailCommand::Create {
            name,
            description,
            no_activate,
        } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(SecNotesError::InvalidArgs("trail name is required".to_string()));
            }
            let trail = store.create_trail(
                name,
                CreateTrailOptions {
                    description: description.filter(|d| !d.trim().is_empty()),
                    set_active: !no_activate,
                },
            );
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, Some(trail.id.clone()), None);
            output_success(cli, out, |_| format!("Created trail \"{}\" ({})", trail.name, short(&trail.id)));
        }
        TrailCommand::Rename {
            id,
            name,
            description,
        } => {
            let id = resolve_trail(&store, &id)?;
            store.rename_trail(&id, name.trim(), description);
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, Some(id), None);
            output_success(cli, out, |_| format!("Renamed trail to \"{}\"", name.trim()));
        }
        TrailCommand::Delete { id } => {
            let id = resolve_trail(&store, &id)?;
            store.delete_trail(&id);
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, Some(id), None);
            output_success(cli, out, |o| match &o.active_trail_id {
                Some(a) => format!("Deleted trail; active trail is now {}", short(a)),
                None => "Deleted trail; no active trail".to_string(),
            });
        }
        TrailCommand::Use { id, clear } => {
            let selected = match (id, clear) {
                (_, true) | (None, false) => None,
                (Some(p), false) => Some(resolve_trail(&store, &p)?),
            };
            store.set_active_trail(selected.clone());
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, selected, None);
            output_success(cli, out, |o| match &o.active_trail_id {
                Some(a) => format!("Active trail set to {}", short(a)),
                None => "Active trail cleared".to_string(),
            });
        }
        TrailCommand::Add {
            file,
            lines,
            note,
            tag,
            trail,
        } => {
            let trail = target_trail(&store, trail.as_deref())?;
            let range = parse_lines(&lines)?;
            let uri = ctx.resolve_file(&file);
            let snippet = ctx.read_snippet(&uri, &range);
            if snippet.is_empty() {
                print_warning(
                    cli,
                    &format!("no source text at {}:{}", file.display(), format_range_label(&range)),
                );
            }
            let crumb = store
                .add_crumb(
                    &trail.id,
                    uri,
                    range,
                    &snippet,
                    CreateCrumbOptions {
                        note: note.filter(|n| !n.trim().is_empty()),
                        tag,
                    },
                )
                .ok_or_else(|| SecNotesError::trail_not_found(&trail.id))?;
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, Some(trail.id.clone()), Some(crumb.id.clone()));
            output_success(cli, out, |_| {
                format!(
                    "Added crumb to \"{}\" at {}:{}",
                    trail.name,
                    ctx.workspace.to_relative(&crumb.uri),
                    format_range_label(&crumb.range)
                )
            });
        }
        TrailCommand::Note { crumb, note, trail } => {
            let trail = target_trail(&store, trail.as_deref())?;
            let crumb_id = resolve_crumb(&trail, &crumb)?;
            store.update_crumb_note(&trail.id, &crumb_id, note.filter(|n| !n.trim().is_empty()));
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, Some(trail.id), Some(crumb_id));
            output_success(cli, out, |_| "Updated crumb note".to_string());
        }
        TrailCommand::Remove { crumb, trail } => {
            let trail = target_trail(&store, trail.as_deref())?;
            let crumb_id = resolve_crumb(&trail, &crumb)?;
            store.remove_crumb(&trail.id, &crumb_id);
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, Some(trail.id), Some(crumb_id));
            output_success(cli, out, |_| "Removed crumb".to_string());
        }
        TrailCommand::Move {
            crumb,
            position,
            trail,
        } => {
            if position == 0 {
                return Err(SecNotesError::InvalidArgs("positions start at 1".to_string()));
            }
            let trail = target_trail(&store, trail.as_deref())?;
            let crumb_id = resolve_crumb(&trail, &crumb)?;
            store.move_crumb(&trail.id, &crumb_id, position - 1);
            ctx.save_breadcrumbs(&store)?;
            let out = change_output(&store, Some(trail.id), Some(crumb_id));
            output_success(cli, out, |_| format!("Moved crumb to position {}", position));
        }
        TrailCommand::List => {
            let active = store.active_trail_id();
            let trails: Vec<TrailSummaryJson> = store
                .get_trails()
                .iter()
                .map(|t| TrailSummaryJson::new(t, active))
                .collect();
            let out = TrailListOutput {
                trails,
                active_trail_id: active.map(str::to_string),
            };
            output_success(cli, out, |o| {
                if o.trails.is_empty() {
                    return "No trails".to_string();
                }
                o.trails
                    .iter()
                    .map(TrailSummaryJson::human)
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        TrailCommand::Show { id } => {
            let trail = target_trail(&store, id.as_deref())?;
            let out = TrailShowOutput {
                trail: TrailSummaryJson::new(&trail, store.active_trail_id()),
                crumbs: trail
                    .crumbs
                    .iter()
                    .enumerate()
                    .map(|(i, c)| CrumbJson::new(&ctx.workspace, c, i))
                    .collect(),
            };
            output_success(cli, out, |o| {
                let mut lines = vec![o.trail.human()];
                if let Some(d) = &o.trail.description {
                    lines.push(format!("  {}", d));
                }
                lines.extend(o.crumbs.iter().map(CrumbJson::human));
                lines.join("\n")
            });
        }
    }

    Ok(())
}
