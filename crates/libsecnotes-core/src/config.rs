use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SecNotesError;
use crate::serialization::Workspace;
use crate::store::LocalStore;

pub const CONFIG_DIR: &str = ".security-notes";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_NOTES_FILE: &str = ".security-notes.json";
pub const DEFAULT_BREADCRUMBS_FILE: &str = ".security-notes-breadcrumbs.json";
pub const DEFAULT_AUTHOR: &str = "anonymous";

/// Workspace configuration stored in .security-notes/config.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name recorded on new comments
    pub author_name: String,
    /// Notes file, relative to the workspace root
    pub notes_file: String,
    /// Breadcrumbs file, relative to the workspace root
    pub breadcrumbs_file: String,
    /// Directory holding reaction icons; defaults to .security-notes/assets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,
    pub collab: CollabConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            author_name: DEFAULT_AUTHOR.to_string(),
            notes_file: DEFAULT_NOTES_FILE.to_string(),
            breadcrumbs_file: DEFAULT_BREADCRUMBS_FILE.to_string(),
            assets_dir: None,
            collab: CollabConfig::default(),
        }
    }
}

/// Shared notes table settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    pub enabled: bool,
    /// Database directory, relative to the workspace root unless absolute
    pub database: PathBuf,
    /// Table name; collaborators on the same project share it
    pub project_name: String,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database: PathBuf::from(CONFIG_DIR).join("shared.db"),
            project_name: "security-notes".to_string(),
        }
    }
}

impl Config {
    pub fn workspace(&self, root: &Path) -> Workspace {
        let assets = match &self.assets_dir {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(CONFIG_DIR).join("assets"),
        };
        Workspace::new(root, assets)
    }

    pub fn local_store(&self, root: &Path) -> LocalStore {
        LocalStore::new(root.join(&self.notes_file), root.join(&self.breadcrumbs_file))
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        if self.collab.database.is_absolute() {
            self.collab.database.clone()
        } else {
            root.join(&self.collab.database)
        }
    }
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load .security-notes/config.toml, or `None` when the workspace has none
pub fn load_config(root: &Path) -> Result<Option<Config>, SecNotesError> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save .security-notes/config.toml
pub fn save_config(root: &Path, config: &Config) -> Result<(), SecNotesError> {
    std::fs::create_dir_all(root.join(CONFIG_DIR))?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(config_path(root), content)?;
    Ok(())
}
