//! Turn repository change notifications into reconciliation passes.
//!
//! Version-control hosts notify on many events that are not branch switches (index refreshes,
//! fetches, config edits). The trigger filters those out by comparing a per-repository
//! identity, built from branch name and revision, against the last one it saw. A real change
//! schedules one pass on the session queue.
//!
//! ```text
//! notify(repo)
//!   identity unchanged ............................ Unchanged
//!   Idle -> Correcting fails (already correcting) .. Busy
//!   Idle -> Correcting: cache new identity, schedule pass, -> Idle ... Scheduled
//! ```
//!
//! The guard goes back to idle as soon as the pass is scheduled, not when it finishes. It stops
//! scheduling from re-entering itself; a second, distinct change arriving while a pass is
//! still running can schedule another one.

use crate::exec::Scheduler;
use crate::session::Session;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Sentinel written for an identity with neither branch nor revision.
pub const UNKNOWN_IDENTITY: &str = "NULL";

/// The change-notification source, queried for the state behind each notification.
pub trait RepositorySource {
    /// Identifiers of every repository currently tracked.
    fn repositories(&self) -> Vec<String>;

    /// Symbolic branch checked out in `repository`, `None` when detached or unknown.
    fn current_branch_name(&self, repository: &str) -> Option<String>;

    /// Revision checked out in `repository`, `None` when unknown.
    fn current_revision(&self, repository: &str) -> Option<String>;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// What a repository has checked out, reduced to a comparable key.
pub enum BranchIdentity {
    /// `branch_revision`, or just the revision when detached.
    Known(String),
    /// Neither a branch nor a revision is known.
    Unknown,
}

impl BranchIdentity {
    #[must_use]
    /// Combine a branch name and revision into an identity.
    pub fn from_parts(branch: Option<&str>, revision: Option<&str>) -> Self {
        match (branch, revision) {
            (Some(branch), revision) => Self::Known(format!(
                "{branch}_{}",
                revision.unwrap_or(UNKNOWN_IDENTITY)
            )),
            (None, Some(revision)) => Self::Known(revision.to_string()),
            (None, None) => Self::Unknown,
        }
    }
}

impl fmt::Display for BranchIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(key) => f.write_str(key),
            Self::Unknown => f.write_str(UNKNOWN_IDENTITY),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// What `notify` did with a notification.
pub enum NotifyOutcome {
    /// The identity matched the cached one; nothing happened.
    Unchanged,
    /// Another notification was being handled; this one was dropped.
    Busy,
    /// The identity changed and a reconciliation pass was scheduled.
    Scheduled {
        /// Identity cached before this notification, if any.
        previous: Option<BranchIdentity>,
        /// Identity now cached.
        current: BranchIdentity,
    },
}

/// Owner of the identity cache and reentrancy guard for one set of repositories.
pub struct BranchTrigger<S> {
    source: S,
    scheduler: Arc<dyn Scheduler>,
    identities: Mutex<HashMap<String, BranchIdentity>>,
    correcting: AtomicBool,
}

impl<S: RepositorySource> BranchTrigger<S> {
    #[must_use]
    /// Create a trigger and cache the current identity of every known repository, so that the
    /// first notification after start-up does not count as a change.
    pub fn new(source: S, scheduler: Arc<dyn Scheduler>) -> Self {
        let trigger = Self {
            source,
            scheduler,
            identities: Mutex::new(HashMap::new()),
            correcting: AtomicBool::new(false),
        };
        for repository in trigger.source.repositories() {
            let identity = trigger.identity(&repository);
            trigger.cache().insert(repository, identity);
        }
        trigger
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, BranchIdentity>> {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    /// The repository source being watched.
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    /// Query the source for the identity `repository` has right now.
    pub fn identity(&self, repository: &str) -> BranchIdentity {
        let branch = self.source.current_branch_name(repository);
        let revision = self.source.current_revision(repository);
        BranchIdentity::from_parts(branch.as_deref(), revision.as_deref())
    }

    #[must_use]
    /// The identity last recorded for `repository`.
    pub fn cached_identity(&self, repository: &str) -> Option<BranchIdentity> {
        self.cache().get(repository).cloned()
    }

    #[must_use]
    /// Handle one change notification for `repository`.
    ///
    /// Runs synchronously on the notifying thread and never touches the tree; the pass itself
    /// runs later on the session queue.
    pub fn notify(&self, repository: &str) -> NotifyOutcome {
        let current = self.identity(repository);
        let previous = self.cached_identity(repository);
        if previous.as_ref() == Some(&current) {
            return NotifyOutcome::Unchanged;
        }

        if self
            .correcting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                target: "linemark.watch",
                repository,
                "correction already being scheduled, notification dropped"
            );
            return NotifyOutcome::Busy;
        }

        tracing::info!(
            target: "linemark.watch",
            repository,
            from = %previous.as_ref().map_or_else(|| UNKNOWN_IDENTITY.to_string(), ToString::to_string),
            to = %current,
            "branch changed, correcting bookmark lines"
        );
        self.cache().insert(repository.to_string(), current.clone());

        self.scheduler.run_on_ui_queue(Box::new(|session: &mut Session| {
            let report = session.reconcile_lines();
            tracing::info!(
                target: "linemark.watch",
                examined = report.examined,
                corrected = report.corrected.len(),
                removed = report.removed.len(),
                "bookmark line correction finished"
            );
        }));

        self.correcting.store(false, Ordering::Release);
        NotifyOutcome::Scheduled { previous, current }
    }
}

#[cfg(test)]
#[path = "tests/watch.rs"]
mod tests;
