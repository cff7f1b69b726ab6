//! Content fingerprints for bookmarked lines.
//!
//! A fingerprint is a SHA-256 digest of the bookmarked line plus a short `prev|current|next`
//! context string. It is taken once, the first time a bookmark is seen with an empty hash, and
//! never refreshed afterwards: the stored value describes the line as it was when bookmarked.

use crate::anchor::DocumentService;
use crate::model::Bookmark;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Separator between the line texts of a context string.
pub const CONTEXT_SEPARATOR: char = '|';

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Digest and surrounding text captured for a single line.
pub struct Fingerprint {
    /// Lowercase hex SHA-256 of the line text, or empty for an empty line.
    pub hash: String,
    /// Neighbouring line texts joined with [`CONTEXT_SEPARATOR`].
    pub context: String,
}

#[must_use]
/// Hex digest of one line of text. Empty input gives an empty hash.
pub fn line_hash(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

#[must_use]
/// Join the previous, current and next line texts.
///
/// The previous segment and its separator are left out on the first line. On the last line
/// the next segment is left out but the separator after the current line stays.
pub fn line_context(previous: Option<&str>, current: &str, next: Option<&str>) -> String {
    let mut context = String::new();
    if let Some(previous) = previous {
        context.push_str(previous);
        context.push(CONTEXT_SEPARATOR);
    }
    context.push_str(current);
    context.push(CONTEXT_SEPARATOR);
    if let Some(next) = next {
        context.push_str(next);
    }
    context
}

impl Fingerprint {
    #[must_use]
    /// Fingerprint `line` of a whole document's text. `None` if the line does not exist.
    pub fn of_text(document_text: &str, line: usize) -> Option<Self> {
        let lines: Vec<&str> = document_text.lines().collect();
        Self::of_lines(&lines, line)
    }

    #[must_use]
    /// Fingerprint `line` of a document already split into lines.
    pub fn of_lines<S: AsRef<str>>(lines: &[S], line: usize) -> Option<Self> {
        let current = lines.get(line)?.as_ref();
        let previous = line
            .checked_sub(1)
            .and_then(|prev| lines.get(prev))
            .map(AsRef::as_ref);
        let next = lines.get(line + 1).map(AsRef::as_ref);
        Some(Self {
            hash: line_hash(current),
            context: line_context(previous, current, next),
        })
    }

    #[must_use]
    /// Fingerprint `line` of `file_path` through the document collaborator, reading the
    /// document once.
    ///
    /// Returns `None` when the document or the line is not available.
    pub fn compute(docs: &dyn DocumentService, file_path: &str, line: usize) -> Option<Self> {
        let lines = docs.lines(file_path)?;
        Self::of_lines(&lines, line)
    }
}

impl Bookmark {
    /// Take the fingerprint if none was ever taken. Returns whether one was written.
    ///
    /// A bookmark that already has a hash keeps it, even after its line moves.
    pub fn ensure_fingerprint(&mut self, docs: &dyn DocumentService) -> bool {
        if !self.line_content_hash.is_empty() || self.file_path.is_empty() {
            return false;
        }
        let Some(fingerprint) = Fingerprint::compute(docs, &self.file_path, self.line) else {
            tracing::debug!(
                target: "linemark.fingerprint",
                file_path = %self.file_path,
                line = self.line,
                "document unavailable, fingerprint left empty"
            );
            return false;
        };
        self.line_content_hash = fingerprint.hash;
        self.line_context = fingerprint.context;
        true
    }
}

#[cfg(test)]
#[path = "tests/fingerprint.rs"]
mod tests;
