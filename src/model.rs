//! The bookmark tree: groups that hold ordered children, and bookmarks that point at a line.
//!
//! A node is either a bookmark or a group for its whole life. The variant is fixed at
//! construction and only exposed through accessors, so callers match on [`NodeKind`] rather
//! than asking a node what it is. The tree root exclusively owns every node; no node appears
//! under two parents.

use crate::error::{Error, Result};
use uuid::Uuid;

#[must_use]
/// Generate a fresh process-unique node identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A bookmark or group in the tree, with the labels both variants share.
pub struct Node {
    /// Stable identifier, preserved through reconciliation and serialisation.
    pub id: String,
    /// User-facing label.
    pub name: String,
    /// Free-form note shown alongside the name.
    pub description: String,
    /// Ordering hint among siblings.
    pub display_index: usize,
    /// Opaque display selector, passed through untouched.
    pub icon_key: Option<String>,
    kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The two shapes a node can take.
pub enum NodeKind {
    /// A leaf pointing at a line of a file.
    Bookmark(Bookmark),
    /// A container of further nodes.
    Group(Group),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Position data for a bookmark leaf.
pub struct Bookmark {
    /// Logical path of the referenced text resource. Empty means the bookmark is malformed.
    pub file_path: String,
    /// Zero-based line index, corrected by reconciliation.
    pub line: usize,
    /// Digest of the line's text when it was first fingerprinted, empty until then.
    pub line_content_hash: String,
    /// `prev|current|next` line texts captured alongside the hash.
    pub line_context: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Ordered children of a group node.
pub struct Group {
    children: Vec<Node>,
}

impl Node {
    #[must_use]
    /// Build a node with an explicit identifier, as the loader does.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            display_index: 0,
            icon_key: None,
            kind,
        }
    }

    #[must_use]
    /// Create a bookmark with a fresh identifier and no fingerprint yet.
    pub fn bookmark(name: impl Into<String>, file_path: impl Into<String>, line: usize) -> Self {
        let bookmark = Bookmark {
            file_path: file_path.into(),
            line,
            ..Bookmark::default()
        };
        Self::new(new_id(), name, NodeKind::Bookmark(bookmark))
    }

    #[must_use]
    /// Create an empty group with a fresh identifier.
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(new_id(), name, NodeKind::Group(Group::default()))
    }

    #[must_use]
    /// Which variant this node is, for exhaustive matching.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[must_use]
    /// True for bookmark leaves.
    pub fn is_bookmark(&self) -> bool {
        matches!(self.kind, NodeKind::Bookmark(_))
    }

    #[must_use]
    /// Position data if this node is a bookmark.
    pub fn as_bookmark(&self) -> Option<&Bookmark> {
        match &self.kind {
            NodeKind::Bookmark(bookmark) => Some(bookmark),
            NodeKind::Group(_) => None,
        }
    }

    /// Mutable position data if this node is a bookmark.
    pub fn as_bookmark_mut(&mut self) -> Option<&mut Bookmark> {
        match &mut self.kind {
            NodeKind::Bookmark(bookmark) => Some(bookmark),
            NodeKind::Group(_) => None,
        }
    }

    #[must_use]
    /// Children container if this node is a group.
    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Bookmark(_) => None,
        }
    }

    /// Mutable children container if this node is a group.
    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Bookmark(_) => None,
        }
    }

    /// Replace this node's children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] if this node is a bookmark.
    pub fn set_children(&mut self, children: Vec<Node>) -> Result<()> {
        if let NodeKind::Group(group) = &mut self.kind {
            group.children = children;
            return Ok(());
        }
        Err(self.unsupported())
    }

    /// Append a child to this node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] if this node is a bookmark.
    pub fn push_child(&mut self, child: Node) -> Result<()> {
        if let NodeKind::Group(group) = &mut self.kind {
            group.children.push(child);
            return Ok(());
        }
        Err(self.unsupported())
    }

    fn unsupported(&self) -> Error {
        tracing::error!(
            target: "linemark.model",
            node_id = %self.id,
            "attempted to attach children to a bookmark"
        );
        Error::UnsupportedOperation {
            id: self.id.clone(),
        }
    }
}

impl Group {
    /// Read the children, dropping exact structural duplicates first.
    ///
    /// The first occurrence of each node is kept and order is otherwise preserved. The
    /// deduplication is written back, so later reads see the reduced list.
    pub fn children(&mut self) -> &[Node] {
        if self.children.len() > 1 {
            let mut kept: Vec<Node> = Vec::with_capacity(self.children.len());
            for child in self.children.drain(..) {
                if !kept.contains(&child) {
                    kept.push(child);
                }
            }
            self.children = kept;
        }
        &self.children
    }

    #[must_use]
    /// The children with structural duplicates skipped, first occurrence kept, without
    /// writing the reduced list back.
    pub fn distinct(&self) -> Vec<&Node> {
        let mut kept: Vec<&Node> = Vec::with_capacity(self.children.len());
        for child in &self.children {
            if !kept.contains(&child) {
                kept.push(child);
            }
        }
        kept
    }

    /// Append a child at the end.
    pub fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Iterate the children as stored, without deduplicating.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.children.iter()
    }

    #[must_use]
    /// Number of stored children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    /// True if the group holds no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A rooted tree of bookmarks and groups.
pub struct BookmarkTree {
    root: Node,
}

impl Default for BookmarkTree {
    fn default() -> Self {
        Self::new(Node::group("Bookmarks"))
    }
}

impl BookmarkTree {
    #[must_use]
    /// Wrap an existing root node.
    ///
    /// A bookmark root is allowed, though it makes for a tree that can never grow.
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    #[must_use]
    /// The root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The root node, mutably.
    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    #[must_use]
    /// Consume the tree and hand back its root.
    pub fn into_root(self) -> Node {
        self.root
    }

    #[must_use]
    /// Find a node anywhere in the tree.
    pub fn find(&self, id: &str) -> Option<&Node> {
        find_in(&self.root, id)
    }

    /// Find a node anywhere in the tree, mutably.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Node> {
        find_in_mut(&mut self.root, id)
    }

    #[must_use]
    /// Every bookmark in depth-first order. Groups are structural and skipped.
    pub fn bookmarks(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// Every bookmark in depth-first order, mutably.
    pub fn bookmarks_mut(&mut self) -> Vec<&mut Node> {
        let mut out = Vec::new();
        collect_mut(&mut self.root, &mut out);
        out
    }

    #[must_use]
    /// Number of bookmarks in the tree.
    pub fn bookmark_count(&self) -> usize {
        self.bookmarks().len()
    }

    /// Attach `node` under the group `parent_id`, or under the root when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if the parent is missing and
    /// [`Error::UnsupportedOperation`] if it is a bookmark.
    pub fn attach(&mut self, parent_id: Option<&str>, node: Node) -> Result<()> {
        let parent = match parent_id {
            Some(id) => self.find_mut(id).ok_or_else(|| Error::NodeNotFound {
                id: id.to_string(),
            })?,
            None => &mut self.root,
        };
        parent.push_child(node)
    }

    /// Detach the node `id` from whichever group holds it.
    ///
    /// The root itself cannot be removed.
    pub fn remove(&mut self, id: &str) -> Option<Node> {
        remove_from(&mut self.root, id)
    }
}

fn find_in<'a>(node: &'a Node, id: &str) -> Option<&'a Node> {
    if node.id == id {
        return Some(node);
    }
    node.as_group()?
        .iter()
        .find_map(|child| find_in(child, id))
}

fn find_in_mut<'a>(node: &'a mut Node, id: &str) -> Option<&'a mut Node> {
    if node.id == id {
        return Some(node);
    }
    node.as_group_mut()?
        .children
        .iter_mut()
        .find_map(|child| find_in_mut(child, id))
}

fn collect<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    match node.kind() {
        NodeKind::Bookmark(_) => out.push(node),
        NodeKind::Group(group) => {
            for child in group.iter() {
                collect(child, out);
            }
        }
    }
}

fn collect_mut<'a>(node: &'a mut Node, out: &mut Vec<&'a mut Node>) {
    if node.is_bookmark() {
        out.push(node);
        return;
    }
    if let Some(group) = node.as_group_mut() {
        for child in &mut group.children {
            collect_mut(child, out);
        }
    }
}

fn remove_from(node: &mut Node, id: &str) -> Option<Node> {
    let group = node.as_group_mut()?;
    if let Some(pos) = group.children.iter().position(|child| child.id == id) {
        return Some(group.children.remove(pos));
    }
    group
        .children
        .iter_mut()
        .find_map(|child| remove_from(child, id))
}

#[cfg(test)]
#[path = "tests/model.rs"]
mod tests;
