//! Concrete collaborators: in-memory documents for embedding and tests, documents read from
//! disk for the command line, and a repository source that reads git's `HEAD` directly.

use crate::anchor::DocumentService;
use crate::fingerprint::{line_context, line_hash};
use crate::model::Bookmark;
use crate::watch::RepositorySource;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

#[derive(Default)]
struct MemoryState {
    files: HashMap<String, Vec<String>>,
    anchors: HashMap<String, Option<usize>>,
}

#[derive(Clone, Default)]
/// Open documents held in memory, with anchors the caller moves by hand.
///
/// Clones share state, so a handle kept outside a session can simulate edits and checkouts
/// while the session holds another.
pub struct MemoryDocuments {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDocuments {
    #[must_use]
    /// No open documents.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open (or replace) a document with the given text.
    pub fn insert_file(&self, path: &str, text: &str) {
        let lines = text.lines().map(str::to_string).collect();
        self.lock().files.insert(path.to_string(), lines);
    }

    /// Close a document; every anchor in it stops resolving.
    pub fn remove_file(&self, path: &str) {
        self.lock().files.remove(path);
    }

    /// Report bookmark `node_id`'s anchor at `line` from now on.
    pub fn move_anchor(&self, node_id: &str, line: usize) {
        self.lock().anchors.insert(node_id.to_string(), Some(line));
    }

    /// Mark bookmark `node_id`'s anchor as invalid.
    pub fn invalidate_anchor(&self, node_id: &str) {
        self.lock().anchors.insert(node_id.to_string(), None);
    }
}

impl DocumentService for MemoryDocuments {
    fn live_line(&self, node_id: &str, bookmark: &Bookmark) -> Option<usize> {
        let state = self.lock();
        let lines = state.files.get(&bookmark.file_path)?;
        match state.anchors.get(node_id) {
            Some(anchor) => *anchor,
            // An anchor that was never moved sits where it was recorded.
            None => (bookmark.line < lines.len()).then_some(bookmark.line),
        }
    }

    fn line_text(&self, file_path: &str, line: usize) -> Option<String> {
        self.lock().files.get(file_path)?.get(line).cloned()
    }

    fn line_count(&self, file_path: &str) -> usize {
        self.lock().files.get(file_path).map_or(0, Vec::len)
    }

    fn lines(&self, file_path: &str) -> Option<Vec<String>> {
        self.lock().files.get(file_path).cloned()
    }
}

struct Snapshot {
    modified: Option<SystemTime>,
    len: u64,
    lines: Arc<[String]>,
    hashes: Arc<[String]>,
}

/// Documents read from disk below a root directory.
///
/// Files on disk have no live range markers, so anchors are found again by fingerprint: the
/// recorded line while its hash still matches, otherwise the nearest line with the same hash,
/// preferring one whose neighbours also match.
///
/// Each file is read and hashed once and kept until its size or modification time changes,
/// so a pass over many bookmarks in one file touches the disk once.
pub struct DiskDocuments {
    root: PathBuf,
    snapshots: Mutex<HashMap<PathBuf, Snapshot>>,
}

impl DiskDocuments {
    #[must_use]
    /// Resolve bookmark paths relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Snapshot>> {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, file_path: &str) -> Option<(Arc<[String]>, Arc<[String]>)> {
        let path = self.root.join(file_path);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(error) => {
                tracing::debug!(
                    target: "linemark.host",
                    path = %path.display(),
                    error = %error,
                    "document unavailable"
                );
                self.cache().remove(&path);
                return None;
            }
        };
        let modified = metadata.modified().ok();
        let len = metadata.len();
        if let Some(snapshot) = self
            .cache()
            .get(&path)
            .filter(|snapshot| snapshot.modified == modified && snapshot.len == len)
        {
            return Some((Arc::clone(&snapshot.lines), Arc::clone(&snapshot.hashes)));
        }

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) => {
                tracing::debug!(
                    target: "linemark.host",
                    path = %path.display(),
                    error = %error,
                    "document unreadable"
                );
                return None;
            }
        };
        let lines: Arc<[String]> = text.lines().map(str::to_string).collect();
        let hashes: Arc<[String]> = lines.iter().map(String::as_str).map(line_hash).collect();
        self.cache().insert(
            path,
            Snapshot {
                modified,
                len,
                lines: Arc::clone(&lines),
                hashes: Arc::clone(&hashes),
            },
        );
        Some((lines, hashes))
    }
}

fn context_at(lines: &[String], line: usize) -> String {
    let previous = line.checked_sub(1).and_then(|prev| lines.get(prev));
    line_context(
        previous.map(String::as_str),
        &lines[line],
        lines.get(line + 1).map(String::as_str),
    )
}

impl DocumentService for DiskDocuments {
    fn live_line(&self, _node_id: &str, bookmark: &Bookmark) -> Option<usize> {
        let (lines, hashes) = self.snapshot(&bookmark.file_path)?;
        let wanted = &bookmark.line_content_hash;
        if wanted.is_empty() {
            return (bookmark.line < lines.len()).then_some(bookmark.line);
        }
        if hashes.get(bookmark.line) == Some(wanted) {
            return Some(bookmark.line);
        }
        hashes
            .iter()
            .enumerate()
            .filter(|(_, hash)| *hash == wanted)
            .map(|(index, _)| index)
            .min_by_key(|&index| {
                let context_differs = context_at(&lines, index) != bookmark.line_context;
                (context_differs, index.abs_diff(bookmark.line))
            })
    }

    fn line_text(&self, file_path: &str, line: usize) -> Option<String> {
        let (lines, _) = self.snapshot(file_path)?;
        lines.get(line).cloned()
    }

    fn line_count(&self, file_path: &str) -> usize {
        self.snapshot(file_path).map_or(0, |(lines, _)| lines.len())
    }

    fn lines(&self, file_path: &str) -> Option<Vec<String>> {
        let (lines, _) = self.snapshot(file_path)?;
        Some(lines.to_vec())
    }
}

/// Repository state read straight from each working tree's `.git` directory.
///
/// Repository identifiers are the working tree paths as given.
pub struct GitHeadSource {
    repositories: Vec<PathBuf>,
}

impl GitHeadSource {
    #[must_use]
    /// Watch the given working trees.
    pub fn new(repositories: Vec<PathBuf>) -> Self {
        Self { repositories }
    }

    fn working_tree(&self, repository: &str) -> Option<&Path> {
        self.repositories
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.display().to_string() == repository)
    }

    fn git_dir(&self, repository: &str) -> Option<PathBuf> {
        let dot_git = self.working_tree(repository)?.join(".git");
        if dot_git.is_file() {
            // Linked worktrees and submodules point elsewhere with `gitdir: <path>`.
            let pointer = fs::read_to_string(&dot_git).ok()?;
            let target = pointer.trim().strip_prefix("gitdir:")?.trim();
            let target = PathBuf::from(target);
            return Some(if target.is_absolute() {
                target
            } else {
                dot_git.parent()?.join(target)
            });
        }
        Some(dot_git)
    }

    fn head(&self, repository: &str) -> Option<String> {
        let head = fs::read_to_string(self.git_dir(repository)?.join("HEAD")).ok()?;
        Some(head.trim().to_string())
    }
}

fn packed_ref(git_dir: &Path, reference: &str) -> Option<String> {
    let packed = fs::read_to_string(git_dir.join("packed-refs")).ok()?;
    packed
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with('^'))
        .find_map(|line| {
            let (revision, name) = line.split_once(' ')?;
            (name == reference).then(|| revision.to_string())
        })
}

impl RepositorySource for GitHeadSource {
    fn repositories(&self) -> Vec<String> {
        self.repositories
            .iter()
            .map(|path| path.display().to_string())
            .collect()
    }

    fn current_branch_name(&self, repository: &str) -> Option<String> {
        let head = self.head(repository)?;
        head.strip_prefix("ref: refs/heads/").map(str::to_string)
    }

    fn current_revision(&self, repository: &str) -> Option<String> {
        let git_dir = self.git_dir(repository)?;
        let head = self.head(repository)?;
        if let Some(reference) = head.strip_prefix("ref: ") {
            return match fs::read_to_string(git_dir.join(reference)) {
                Ok(revision) => Some(revision.trim().to_string()),
                // Unborn branches have neither a loose nor a packed ref.
                Err(_) => packed_ref(&git_dir, reference),
            };
        }
        (!head.is_empty()).then_some(head)
    }
}

#[cfg(test)]
#[path = "tests/host.rs"]
mod tests;
