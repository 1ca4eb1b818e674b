use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ids::generate_id;
use super::now_ms;
use super::range::TextRange;

/// Review status carried as a `[<label>] ` prefix on a note's first comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteStatus {
    Todo,
    Vulnerable,
    NotVulnerable,
}

impl NoteStatus {
    pub const ALL: [NoteStatus; 3] = [
        NoteStatus::Todo,
        NoteStatus::Vulnerable,
        NoteStatus::NotVulnerable,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NoteStatus::Todo => "TODO",
            NoteStatus::Vulnerable => "Vulnerable",
            NoteStatus::NotVulnerable => "Not Vulnerable",
        }
    }

    /// Status encoded in a comment body, if any
    pub fn of(body: &str) -> Option<NoteStatus> {
        let caps = status_prefix_re().captures(body)?;
        NoteStatus::ALL
            .into_iter()
            .find(|s| s.label() == &caps[1])
    }

    /// Replace any status prefix on `body` with this status
    pub fn apply_to(&self, body: &str) -> String {
        format!("[{}] {}", self.label(), strip_status(body))
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "todo" => Ok(NoteStatus::Todo),
            "vulnerable" => Ok(NoteStatus::Vulnerable),
            "notvulnerable" => Ok(NoteStatus::NotVulnerable),
            other => Err(format!(
                "unknown status '{}' (expected todo, vulnerable or not-vulnerable)",
                other
            )),
        }
    }
}

fn status_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(TODO|Vulnerable|Not Vulnerable)\] ").expect("status prefix pattern")
    })
}

/// Remove every leading status prefix from a body
pub fn strip_status(body: &str) -> &str {
    let mut rest = body;
    while let Some(m) = status_prefix_re().find(rest) {
        rest = &rest[m.end()..];
    }
    rest
}

/// Whether a comment is shown rendered or as an open editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommentMode {
    #[default]
    Preview,
    Editing,
}

/// A named reaction counter on a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub label: String,
    pub count: u32,
    /// Absolute path to the icon shown for this reaction
    pub icon_path: PathBuf,
    /// Authors counted in `count`. Older records carry a count with no names.
    pub reacted_by: Vec<String>,
}

impl Reaction {
    pub fn has_reacted(&self, author: &str) -> bool {
        self.reacted_by.iter().any(|a| a == author)
    }
}

/// (label, icon file under `reactions/`)
const REACTION_GROUP: [(&str, &str); 8] = [
    ("😕", "confused.png"),
    ("👀", "eyes.png"),
    ("❤️", "heart.png"),
    ("🎉", "hooray.png"),
    ("😄", "laugh.png"),
    ("🚀", "rocket.png"),
    ("👎", "thumbs_down.png"),
    ("👍", "thumbs_up.png"),
];

/// Fresh zero-count reaction set for a new comment
pub fn default_reactions(assets_dir: &Path) -> Vec<Reaction> {
    REACTION_GROUP
        .iter()
        .map(|(label, icon)| Reaction {
            label: (*label).to_string(),
            count: 0,
            icon_path: assets_dir.join("reactions").join(icon),
            reacted_by: Vec::new(),
        })
        .collect()
}

/// One message in a note thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteComment {
    pub id: String,
    /// Text currently displayed; differs from `saved_body` only while editing
    pub body: String,
    /// Last committed body, restored on cancel
    pub saved_body: String,
    pub author: String,
    pub mode: CommentMode,
    pub reactions: Vec<Reaction>,
    /// Creation time in ms since the epoch; 0 when unknown
    pub timestamp_ms: u64,
    /// When `saved_body` last changed after creation
    pub edited_ms: Option<u64>,
    pub can_delete: bool,
}

impl NoteComment {
    pub fn new(body: impl Into<String>, author: impl Into<String>, reactions: Vec<Reaction>) -> Self {
        Self::with_id(generate_id(), body, author, reactions, now_ms())
    }

    pub fn with_id(
        id: String,
        body: impl Into<String>,
        author: impl Into<String>,
        reactions: Vec<Reaction>,
        timestamp_ms: u64,
    ) -> Self {
        let body = body.into();
        Self {
            id,
            saved_body: body.clone(),
            body,
            author: author.into(),
            mode: CommentMode::Preview,
            reactions,
            timestamp_ms,
            edited_ms: None,
            can_delete: false,
        }
    }

    pub fn begin_edit(&mut self) {
        self.mode = CommentMode::Editing;
    }

    /// Change the draft text. Ignored unless the comment is being edited.
    pub fn set_draft(&mut self, text: impl Into<String>) -> bool {
        if self.mode != CommentMode::Editing {
            return false;
        }
        self.body = text.into();
        true
    }

    pub fn save_edit(&mut self) {
        if self.saved_body != self.body {
            self.saved_body = self.body.clone();
            self.edited_ms = Some(now_ms());
        }
        self.mode = CommentMode::Preview;
    }

    pub fn cancel_edit(&mut self) {
        self.body = self.saved_body.clone();
        self.mode = CommentMode::Preview;
    }

    /// Rewrite the committed body (and the draft, if editing) with a status prefix
    pub fn apply_status(&mut self, status: NoteStatus) {
        let saved = status.apply_to(&self.saved_body);
        if saved != self.saved_body {
            self.saved_body = saved;
            self.edited_ms = Some(now_ms());
        }
        self.body = status.apply_to(&self.body);
    }

    /// Take `other`'s committed body if it was edited later. Equal stamps
    /// fall back to comparing bodies so both sides pick the same one. A draft
    /// in progress is left alone.
    pub fn take_later_edit(&mut self, other: &NoteComment) -> bool {
        if (other.edited_ms, &other.saved_body) <= (self.edited_ms, &self.saved_body) {
            return false;
        }
        self.saved_body = other.saved_body.clone();
        self.edited_ms = other.edited_ms;
        if self.mode == CommentMode::Preview {
            self.body = self.saved_body.clone();
        }
        true
    }

    /// Flip `author`'s reaction. Returns false for an unknown label.
    pub fn toggle_reaction(&mut self, label: &str, author: &str) -> bool {
        let Some(reaction) = self.reactions.iter_mut().find(|r| r.label == label) else {
            return false;
        };
        if let Some(pos) = reaction.reacted_by.iter().position(|a| a == author) {
            reaction.reacted_by.remove(pos);
            reaction.count = reaction.count.saturating_sub(1);
        } else {
            reaction.reacted_by.push(author.to_string());
            reaction.count += 1;
        }
        true
    }
}

/// A status-tagged discussion anchored to a code range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteThread {
    pub id: String,
    /// Absolute path of the annotated file
    pub uri: PathBuf,
    pub range: TextRange,
    pub comments: Vec<NoteComment>,
    /// Bumped on every local mutation; used to tell descendant remote updates
    /// apart from concurrent ones
    pub version: u64,
}

impl NoteThread {
    pub fn new(id: String, uri: PathBuf, range: TextRange) -> Self {
        Self {
            id,
            uri,
            range,
            comments: Vec::new(),
            version: 0,
        }
    }

    pub fn status(&self) -> Option<NoteStatus> {
        self.comments.first().and_then(|c| NoteStatus::of(&c.saved_body))
    }

    pub fn comment(&self, comment_id: &str) -> Option<&NoteComment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut NoteComment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }

    /// Append a comment; replies are deletable, the opening comment is not
    pub fn push_comment(&mut self, mut comment: NoteComment) {
        comment.can_delete = !self.comments.is_empty();
        self.comments.push(comment);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.version += 1;
    }

    pub fn refresh_deletable(&mut self) {
        for (i, c) in self.comments.iter_mut().enumerate() {
            c.can_delete = i > 0;
        }
    }
}
