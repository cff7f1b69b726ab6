//! Conversion between the in-memory tree and its nested persisted form.
//!
//! The persisted form is a plain serde structure mirroring each node attribute for attribute.
//! Loading also backfills fingerprints for bookmarks saved before fingerprinting existed.

use crate::anchor::DocumentService;
use crate::error::Result;
use crate::model::{Bookmark, Group, Node, NodeKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Serialisable snapshot of a node and, for groups, its descendants.
pub struct PersistedNode {
    /// Stable node identifier.
    pub id: String,
    /// Ordering hint among siblings.
    #[serde(default)]
    pub index: usize,
    /// Bookmarked line; zero for groups.
    #[serde(default)]
    pub line: usize,
    /// Free-form note.
    #[serde(default)]
    pub description: String,
    /// User-facing label.
    #[serde(default)]
    pub name: String,
    /// Opaque display selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_key: Option<String>,
    /// True for bookmarks, false for groups.
    pub is_bookmark: bool,
    /// Path of the referenced file, bookmarks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Line digest, absent until a fingerprint has been taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_content_hash: Option<String>,
    /// `prev|current|next` context, absent until a fingerprint has been taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_context: Option<String>,
    /// Nested nodes, always empty for bookmarks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PersistedNode>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[must_use]
/// Flatten a node's attributes depth-first into the persisted form.
///
/// Structurally equal siblings are written once.
pub fn to_persisted(node: &Node) -> PersistedNode {
    let mut persisted = PersistedNode {
        id: node.id.clone(),
        index: node.display_index,
        line: 0,
        description: node.description.clone(),
        name: node.name.clone(),
        icon_key: node.icon_key.clone(),
        is_bookmark: node.is_bookmark(),
        file_path: None,
        line_content_hash: None,
        line_context: None,
        children: Vec::new(),
    };
    match node.kind() {
        NodeKind::Bookmark(bookmark) => {
            persisted.line = bookmark.line;
            persisted.file_path = non_empty(&bookmark.file_path);
            persisted.line_content_hash = non_empty(&bookmark.line_content_hash);
            persisted.line_context = non_empty(&bookmark.line_context);
        }
        NodeKind::Group(group) => {
            persisted.children = group.distinct().into_iter().map(to_persisted).collect();
        }
    }
    persisted
}

#[derive(Debug)]
/// A node rebuilt from its persisted form.
pub struct Restored {
    /// The rebuilt node and its descendants.
    pub node: Node,
    /// Bookmarks whose fingerprint was taken during the rebuild and is not yet stored.
    pub backfilled: usize,
}

#[must_use]
/// Rebuild a node from its persisted form.
///
/// Bookmarks with no stored hash are fingerprinted against the live document when it is
/// available; otherwise the fields stay empty. Children listed on a bookmark record are
/// ignored, and duplicate siblings are dropped.
pub fn from_persisted(persisted: PersistedNode, docs: &dyn DocumentService) -> Node {
    restore(persisted, docs).node
}

#[must_use]
/// Rebuild a node as [`from_persisted`] does, also counting the fingerprints backfilled on
/// the way so the caller knows the store is behind.
pub fn restore(persisted: PersistedNode, docs: &dyn DocumentService) -> Restored {
    let mut backfilled = 0;
    let node = rebuild(persisted, docs, &mut backfilled);
    Restored { node, backfilled }
}

fn rebuild(persisted: PersistedNode, docs: &dyn DocumentService, backfilled: &mut usize) -> Node {
    let PersistedNode {
        id,
        index,
        line,
        description,
        name,
        icon_key,
        is_bookmark,
        file_path,
        line_content_hash,
        line_context,
        children,
    } = persisted;

    let kind = if is_bookmark {
        if !children.is_empty() {
            tracing::warn!(
                target: "linemark.persist",
                node_id = %id,
                dropped = children.len(),
                "ignoring children stored on a bookmark"
            );
        }
        let mut bookmark = Bookmark {
            file_path: file_path.unwrap_or_default(),
            line,
            line_content_hash: line_content_hash.unwrap_or_default(),
            line_context: line_context.unwrap_or_default(),
        };
        if bookmark.ensure_fingerprint(docs) {
            *backfilled += 1;
            tracing::debug!(
                target: "linemark.persist",
                node_id = %id,
                "backfilled fingerprint on load"
            );
        }
        NodeKind::Bookmark(bookmark)
    } else {
        NodeKind::Group(Group::default())
    };

    let mut node = Node::new(id, name, kind);
    node.description = description;
    node.display_index = index;
    node.icon_key = icon_key;

    if let Some(group) = node.as_group_mut() {
        for child in children {
            group.push(rebuild(child, docs, backfilled));
        }
        let _ = group.children();
    }
    node
}

/// Independent copy of any serialisable value via a full serialise/deserialise round trip.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn deep_copy<T>(value: Option<&T>) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned,
{
    let Some(value) = value else {
        return Ok(None);
    };
    let json = serde_json::to_value(value)?;
    Ok(Some(serde_json::from_value(json)?))
}

#[cfg(test)]
#[path = "tests/persist.rs"]
mod tests;
