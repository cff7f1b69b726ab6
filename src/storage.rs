//! Persistence collaborators: where the persisted tree is loaded from and saved to.
//!
//! Save failures are reported to the caller and never retried here.

use crate::error::{Error, Result};
use crate::persist::PersistedNode;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Load and save the persisted bookmark tree.
pub trait PersistenceStore {
    /// The saved tree, or `None` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read or decoded.
    fn load(&self) -> Result<Option<PersistedNode>>;

    /// Replace the saved tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree could not be written.
    fn save(&mut self, root: &PersistedNode) -> Result<()>;
}

/// A pretty-printed JSON file on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    /// Store bookmarks at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedNode>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&mut self, root: &PersistedNode) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(root)?;
        // Write beside the target then rename, so a crash never leaves half a file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| Error::io(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    saved: Option<PersistedNode>,
    saves: usize,
    failing: bool,
}

#[derive(Clone, Default)]
/// An in-memory store. Clones share the same contents, so a handle kept outside a session
/// observes what the session saved.
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    /// A store that already holds `root`.
    pub fn with_saved(root: PersistedNode) -> Self {
        let store = Self::default();
        store.lock().saved = Some(root);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.lock().saves
    }

    #[must_use]
    /// The most recently saved tree.
    pub fn last_saved(&self) -> Option<PersistedNode> {
        self.lock().saved.clone()
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }
}

impl PersistenceStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedNode>> {
        Ok(self.lock().saved.clone())
    }

    fn save(&mut self, root: &PersistedNode) -> Result<()> {
        let mut state = self.lock();
        if state.failing {
            return Err(Error::Persistence {
                reason: "memory store is set to fail".to_string(),
            });
        }
        state.saved = Some(root.clone());
        state.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/storage.rs"]
mod tests;
