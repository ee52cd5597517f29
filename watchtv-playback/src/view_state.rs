//! Last-viewed selection
//!
//! Written on every selection, read once at startup to restore the previous
//! context. A missing or unreadable store is a first run, not an error.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Live,
    Movie,
    Series,
}

impl ContentKind {
    /// Live content plays as a broadcast; movies and series are seekable.
    pub fn is_live(&self) -> bool {
        matches!(self, ContentKind::Live)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastViewed {
    pub playlist_id: String,
    pub channel_id: Option<String>,
    pub category_id: Option<String>,
    pub content_type: ContentKind,
}

pub trait ViewStateStore: Send {
    fn load(&self) -> Result<Option<LastViewed>>;

    fn save(&self, state: &LastViewed) -> Result<()>;
}

/// JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ViewStateStore for JsonFileStore {
    fn load(&self) -> Result<Option<LastViewed>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable view state {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    fn save(&self, state: &LastViewed) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-memory store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<LastViewed>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewStateStore for MemoryStore {
    fn load(&self) -> Result<Option<LastViewed>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &LastViewed) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}
