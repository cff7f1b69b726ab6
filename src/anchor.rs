//! Resolve a bookmark against the host's live documents.
//!
//! The host owns the range-tracking handles that follow a position as text above it changes.
//! This module only asks for the handle's current line on each call; handles are never stored
//! or persisted.

use crate::model::{Bookmark, Node, NodeKind};

/// The document collaborator: live anchors plus read access to line text.
pub trait DocumentService {
    /// Current line of the live anchor for bookmark `node_id`, or `None` if the file is
    /// closed or deleted, or the anchor has been invalidated.
    fn live_line(&self, node_id: &str, bookmark: &Bookmark) -> Option<usize>;

    /// Text of one line without its line terminator.
    fn line_text(&self, file_path: &str, line: usize) -> Option<String>;

    /// Number of lines in the document, zero when it is unavailable.
    fn line_count(&self, file_path: &str) -> usize;

    /// Every line of the document, or `None` when it is unavailable.
    ///
    /// Hosts that load a document in one go should override this. The default asks for each
    /// line in turn, and reports an unavailable document as empty.
    fn lines(&self, file_path: &str) -> Option<Vec<String>> {
        (0..self.line_count(file_path))
            .map(|line| self.line_text(file_path, line))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Where a bookmark's anchor sits now.
pub enum Resolution {
    /// The anchor is still on the recorded line.
    SameLine(usize),
    /// The anchor is valid but has moved to another line.
    MovedTo(usize),
    /// The anchor can no longer be found.
    Unresolvable,
}

#[must_use]
/// Classify a node's anchor. Pure query; nothing is mutated.
///
/// Groups and bookmarks without a file path have no anchor and are reported as unresolvable.
pub fn resolve(docs: &dyn DocumentService, node: &Node) -> Resolution {
    let bookmark = match node.kind() {
        NodeKind::Bookmark(bookmark) if !bookmark.file_path.is_empty() => bookmark,
        NodeKind::Bookmark(_) | NodeKind::Group(_) => return Resolution::Unresolvable,
    };
    match docs.live_line(&node.id, bookmark) {
        Some(line) if line == bookmark.line => Resolution::SameLine(line),
        Some(line) => Resolution::MovedTo(line),
        None => Resolution::Unresolvable,
    }
}

#[cfg(test)]
#[path = "tests/anchor.rs"]
mod tests;
