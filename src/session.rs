//! The state owned by the serialized queue: the tree plus the collaborators it is checked
//! against and saved through.
//!
//! Everything that mutates the tree or writes it out is a method here, and a [`Session`] is
//! only reachable through a [`Task`](crate::exec::Task) on its scheduler. A correcting pass
//! does not save straight away. It arms a single delayed save, so a burst of passes following a
//! checkout collapses into one write that lands after the burst has settled.

use crate::anchor::DocumentService;
use crate::error::{Error, Result};
use crate::exec::Scheduler;
use crate::model::{BookmarkTree, Node};
use crate::persist::{restore, to_persisted};
use crate::reconcile::{reconcile, PassReport};
use crate::storage::PersistenceStore;
use std::sync::Arc;
use std::time::Duration;

/// Delay between a correcting pass and the save it triggers.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(1000);

/// The bookmark tree and the collaborators it is reconciled against and persisted through.
pub struct Session {
    tree: BookmarkTree,
    documents: Box<dyn DocumentService + Send>,
    store: Box<dyn PersistenceStore + Send>,
    scheduler: Arc<dyn Scheduler>,
    save_delay: Duration,
    save_pending: bool,
}

impl Session {
    #[must_use]
    /// Assemble a session around an existing tree.
    pub fn new(
        tree: BookmarkTree,
        documents: Box<dyn DocumentService + Send>,
        store: Box<dyn PersistenceStore + Send>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            tree,
            documents,
            store,
            scheduler,
            save_delay: DEFAULT_SAVE_DELAY,
            save_pending: false,
        }
    }

    /// Build a session from whatever the store holds, or an empty tree if it holds nothing.
    ///
    /// Fingerprints backfilled while loading arm the delayed save, so [`Session::flush`]
    /// writes them even when nothing else changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store has data that cannot be loaded.
    pub fn load(
        documents: Box<dyn DocumentService + Send>,
        store: Box<dyn PersistenceStore + Send>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let (tree, backfilled) = match store.load()? {
            Some(persisted) => {
                let restored = restore(persisted, documents.as_ref());
                (BookmarkTree::new(restored.node), restored.backfilled)
            }
            None => (BookmarkTree::default(), 0),
        };
        tracing::info!(
            target: "linemark.session",
            bookmarks = tree.bookmark_count(),
            backfilled,
            "bookmark tree loaded"
        );
        let mut session = Self::new(tree, documents, store, scheduler);
        if backfilled > 0 {
            // Fingerprints are taken once; store them before the files can drift further.
            session.schedule_save();
        }
        Ok(session)
    }

    #[must_use]
    /// Replace the delay used for the debounced save.
    pub fn with_save_delay(mut self, save_delay: Duration) -> Self {
        self.save_delay = save_delay;
        self
    }

    #[must_use]
    /// The bookmark tree.
    pub fn tree(&self) -> &BookmarkTree {
        &self.tree
    }

    #[must_use]
    /// True while a delayed save is armed and has not yet run.
    pub fn save_pending(&self) -> bool {
        self.save_pending
    }

    /// Run a reconciliation pass and arm a save if it changed anything.
    ///
    /// An empty tree is skipped outright; a pass that changes nothing schedules nothing.
    pub fn reconcile_lines(&mut self) -> PassReport {
        if self.tree.bookmark_count() == 0 {
            tracing::info!(target: "linemark.session", "no bookmarks to correct");
            return PassReport::default();
        }
        let report = reconcile(&mut self.tree, self.documents.as_ref());
        if report.changed() {
            self.schedule_save();
        }
        report
    }

    /// Create a bookmark under `parent_id` (or the root), fingerprinting it if the document is
    /// available. Returns the new node's identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent is missing or is itself a bookmark.
    pub fn add_bookmark(
        &mut self,
        parent_id: Option<&str>,
        name: &str,
        file_path: &str,
        line: usize,
    ) -> Result<String> {
        let mut node = Node::bookmark(name, file_path, line);
        if let Some(bookmark) = node.as_bookmark_mut() {
            bookmark.ensure_fingerprint(self.documents.as_ref());
        }
        let id = node.id.clone();
        self.tree.attach(parent_id, node)?;
        self.schedule_save();
        Ok(id)
    }

    /// Create a group under `parent_id` (or the root). Returns the new node's identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent is missing or is a bookmark.
    pub fn add_group(&mut self, parent_id: Option<&str>, name: &str) -> Result<String> {
        let node = Node::group(name);
        let id = node.id.clone();
        self.tree.attach(parent_id, node)?;
        self.schedule_save();
        Ok(id)
    }

    /// Delete a node and everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if no such node is attached.
    pub fn remove(&mut self, id: &str) -> Result<Node> {
        let removed = self.tree.remove(id).ok_or_else(|| Error::NodeNotFound {
            id: id.to_string(),
        })?;
        self.schedule_save();
        Ok(removed)
    }

    /// Arm the delayed save unless one is already waiting.
    pub fn schedule_save(&mut self) {
        if self.save_pending {
            tracing::debug!(target: "linemark.session", "save already scheduled");
            return;
        }
        self.save_pending = true;
        self.scheduler.schedule_after(
            self.save_delay,
            Box::new(|session: &mut Session| session.run_scheduled_save()),
        );
    }

    fn run_scheduled_save(&mut self) {
        if !self.save_pending {
            return;
        }
        self.save_pending = false;
        if let Err(error) = self.persist() {
            // The in-memory corrections stay; the next save writes them.
            tracing::error!(
                target: "linemark.session",
                error = %error,
                "scheduled bookmark save failed"
            );
        }
    }

    /// Save now if a delayed save is armed. Returns whether a save ran.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the save fails.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.save_pending {
            return Ok(false);
        }
        self.save_pending = false;
        self.persist()?;
        Ok(true)
    }

    /// Write the whole tree to the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the save fails.
    pub fn persist(&mut self) -> Result<()> {
        let persisted = to_persisted(self.tree.root());
        self.store.save(&persisted)?;
        tracing::info!(
            target: "linemark.session",
            bookmarks = self.tree.bookmark_count(),
            "bookmarks saved"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/session.rs"]
mod tests;
