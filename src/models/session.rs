use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

/// Serialized browsing-context state. Opaque to everything except the
/// `Page` implementation that captures and replays it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageState {
    /// Origin the state was captured on; cookies are replayed there.
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub local_storage: BTreeMap<String, String>,
}

/// The session artifact on disk. Read once per run, written at most once.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no artifact exists. An unreadable or corrupt
    /// artifact is treated the same way so the run falls back to login.
    pub fn load(&self) -> Option<StorageState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unable to read session artifact");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt session artifact");
                None
            }
        }
    }

    pub fn save(&self, state: &StorageState) -> Result<(), AppError> {
        let display = self.path.display().to_string();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| AppError::session(&display, e))?;
            }
        }
        let body = serde_json::to_string_pretty(state).map_err(|e| AppError::session(&display, e))?;
        fs::write(&self.path, body).map_err(|e| AppError::session(&display, e))
    }
}
