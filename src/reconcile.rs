//! One reconciliation pass over every bookmark in a tree.
//!
//! Each bookmark is classified by the anchor resolver. Moved anchors have their line corrected
//! in place; unresolvable ones are collected and, once the sweep is done, detached from the
//! tree. One bad node never stops the pass.

use crate::anchor::{resolve, DocumentService, Resolution};
use crate::model::BookmarkTree;

#[derive(Clone, Debug, PartialEq, Eq)]
/// A line number rewritten by a pass.
pub struct LineCorrection {
    /// Bookmark that moved.
    pub id: String,
    /// Line recorded before the pass.
    pub from: usize,
    /// Line reported by the live anchor.
    pub to: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// What a pass did to the tree.
pub struct PassReport {
    /// Bookmarks inspected.
    pub examined: usize,
    /// Bookmarks whose line was rewritten.
    pub corrected: Vec<LineCorrection>,
    /// Bookmarks detached because their anchor could not be resolved.
    pub removed: Vec<String>,
}

impl PassReport {
    #[must_use]
    /// True if the pass rewrote or removed anything, i.e. a save is warranted.
    pub fn changed(&self) -> bool {
        !self.corrected.is_empty() || !self.removed.is_empty()
    }
}

/// Correct or prune every bookmark in `tree` against the live documents.
///
/// Must run on the queue that owns the tree.
pub fn reconcile(tree: &mut BookmarkTree, docs: &dyn DocumentService) -> PassReport {
    let mut report = PassReport::default();

    for node in tree.bookmarks_mut() {
        report.examined += 1;
        match resolve(docs, node) {
            Resolution::SameLine(_) => {}
            Resolution::MovedTo(line) => {
                let from = node.as_bookmark().map_or(line, |bookmark| bookmark.line);
                tracing::info!(
                    target: "linemark.reconcile",
                    node_id = %node.id,
                    name = %node.name,
                    from,
                    to = line,
                    "bookmark line corrected"
                );
                report.corrected.push(LineCorrection {
                    id: node.id.clone(),
                    from,
                    to: line,
                });
                if let Some(bookmark) = node.as_bookmark_mut() {
                    bookmark.line = line;
                }
            }
            Resolution::Unresolvable => {
                tracing::warn!(
                    target: "linemark.reconcile",
                    node_id = %node.id,
                    name = %node.name,
                    reason = "anchor_unresolvable",
                    "bookmark queued for removal"
                );
                report.removed.push(node.id.clone());
            }
        }
    }

    if report.changed() {
        for id in &report.removed {
            if tree.remove(id).is_none() {
                tracing::debug!(
                    target: "linemark.reconcile",
                    node_id = %id,
                    "bookmark already detached"
                );
            }
        }
    }

    report
}

#[cfg(test)]
#[path = "tests/reconcile.rs"]
mod tests;
