pub mod types;
pub mod serialization;
pub mod notebook;
pub mod merge;
pub mod remote;
pub mod breadcrumbs;
pub mod store;
pub mod config;
pub mod error;

pub use error::SecNotesError;
pub use types::note::{NoteComment, NoteStatus, NoteThread, Reaction};
pub use types::breadcrumb::{BreadcrumbState, Crumb, Trail};
pub use types::finding::{FindingRecord, ToolFinding};
pub use types::range::{Position, TextRange};
pub use serialization::{SerializedThread, Workspace};
pub use notebook::{DeleteOutcome, NoteFilter, Notebook};
pub use merge::{apply_remote_change, apply_remote_removal, merge_thread, sync_note_map_with_remote, RemoteApply, SyncReport};
pub use remote::RemoteStore;
pub use breadcrumbs::{BreadcrumbEvent, BreadcrumbStore, CreateCrumbOptions, CreateTrailOptions};
pub use store::{LoadOutcome, LocalStore};
pub use config::{load_config, save_config, CollabConfig, Config};
