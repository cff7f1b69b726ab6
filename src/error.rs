//! Error type shared by the bookmark model, persistence layer and host adapters.
//!
//! Anchors that no longer resolve and fingerprints that cannot be taken are not errors here:
//! the first is `Resolution::Unresolvable`, the second an empty `Option`. What remains are
//! programmer errors on the tree and failures reported by collaborators.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
/// Failure modes surfaced by the crate.
pub enum Error {
    /// A bookmark was asked to hold child nodes, which only groups can do.
    #[error("bookmark `{id}` does not support child nodes")]
    UnsupportedOperation {
        /// Identifier of the bookmark that was targeted.
        id: String,
    },

    /// No node with the requested identifier exists in the tree.
    #[error("no node with id `{id}` in the bookmark tree")]
    NodeNotFound {
        /// Identifier that was looked up.
        id: String,
    },

    /// The persistence collaborator refused or failed a save or load.
    #[error("bookmark persistence failed: {reason}")]
    Persistence {
        /// Description from the store.
        reason: String,
    },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The persisted form could not be encoded or decoded.
    #[error("bookmark JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
