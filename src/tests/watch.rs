use super::{BranchIdentity, BranchTrigger, NotifyOutcome, RepositorySource};
use crate::exec::{ManualScheduler, Scheduler, Task};
use crate::host::MemoryDocuments;
use crate::model::{BookmarkTree, Node};
use crate::session::Session;
use crate::storage::MemoryStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct FakeRepos {
    heads: Arc<Mutex<HashMap<String, (Option<String>, Option<String>)>>>,
}

impl FakeRepos {
    fn checkout(&self, repository: &str, branch: Option<&str>, revision: Option<&str>) {
        self.heads.lock().unwrap().insert(
            repository.to_string(),
            (branch.map(str::to_string), revision.map(str::to_string)),
        );
    }
}

impl RepositorySource for FakeRepos {
    fn repositories(&self) -> Vec<String> {
        self.heads.lock().unwrap().keys().cloned().collect()
    }

    fn current_branch_name(&self, repository: &str) -> Option<String> {
        self.heads.lock().unwrap().get(repository)?.0.clone()
    }

    fn current_revision(&self, repository: &str) -> Option<String> {
        self.heads.lock().unwrap().get(repository)?.1.clone()
    }
}

fn session_with_moved_bookmark(scheduler: Arc<dyn Scheduler>) -> (Session, MemoryDocuments, String) {
    let docs = MemoryDocuments::new();
    docs.insert_file("F", &"x\n".repeat(20));
    let node = Node::bookmark("b", "F", 10);
    let id = node.id.clone();
    let mut root = Node::group("root");
    root.push_child(node).unwrap();
    let session = Session::new(
        BookmarkTree::new(root),
        Box::new(docs.clone()),
        Box::new(MemoryStore::new()),
        scheduler,
    );
    (session, docs, id)
}

#[test]
fn test_identity_forms() {
    assert_eq!(
        BranchIdentity::from_parts(Some("main"), Some("abc123")).to_string(),
        "main_abc123"
    );
    assert_eq!(
        BranchIdentity::from_parts(None, Some("abc123")).to_string(),
        "abc123"
    );
    assert_eq!(
        BranchIdentity::from_parts(Some("main"), None).to_string(),
        "main_NULL"
    );
    assert_eq!(BranchIdentity::from_parts(None, None), BranchIdentity::Unknown);
    assert_eq!(BranchIdentity::Unknown.to_string(), "NULL");
}

#[test]
fn test_new_primes_the_cache() {
    let repos = FakeRepos::default();
    repos.checkout("r", Some("main"), Some("abc"));
    let scheduler = Arc::new(ManualScheduler::new());

    let trigger = BranchTrigger::new(repos, scheduler.clone());

    assert_eq!(
        trigger.cached_identity("r"),
        Some(BranchIdentity::Known("main_abc".to_string()))
    );
    assert_eq!(trigger.notify("r"), NotifyOutcome::Unchanged);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_branch_switch_schedules_one_pass() {
    let repos = FakeRepos::default();
    repos.checkout("r", Some("main"), Some("abc"));
    let scheduler = Arc::new(ManualScheduler::new());
    let shared: Arc<dyn Scheduler> = scheduler.clone();
    let trigger = BranchTrigger::new(repos.clone(), Arc::clone(&shared));
    let (mut session, docs, id) = session_with_moved_bookmark(shared);
    docs.move_anchor(&id, 7);

    repos.checkout("r", Some("feature"), Some("def"));
    let outcome = trigger.notify("r");

    assert_eq!(
        outcome,
        NotifyOutcome::Scheduled {
            previous: Some(BranchIdentity::Known("main_abc".to_string())),
            current: BranchIdentity::Known("feature_def".to_string()),
        }
    );
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(
        session.tree().find(&id).unwrap().as_bookmark().unwrap().line,
        10,
        "nothing changes until the queue runs"
    );

    // The same identity notified again is ignored.
    assert_eq!(trigger.notify("r"), NotifyOutcome::Unchanged);
    assert_eq!(scheduler.pending(), 1);

    scheduler.run_until_idle(&mut session);
    assert_eq!(
        session.tree().find(&id).unwrap().as_bookmark().unwrap().line,
        7
    );
    assert!(session.save_pending());
}

#[test]
fn test_non_branch_notifications_are_ignored() {
    let repos = FakeRepos::default();
    repos.checkout("r", Some("main"), Some("abc"));
    let scheduler = Arc::new(ManualScheduler::new());
    let trigger = BranchTrigger::new(repos, scheduler.clone());

    for _ in 0..5 {
        assert_eq!(trigger.notify("r"), NotifyOutcome::Unchanged);
    }
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_uncached_repository_counts_as_changed() {
    let repos = FakeRepos::default();
    let scheduler = Arc::new(ManualScheduler::new());
    let trigger = BranchTrigger::new(repos.clone(), scheduler.clone());
    repos.checkout("late", Some("main"), Some("abc"));

    let outcome = trigger.notify("late");

    assert!(matches!(
        outcome,
        NotifyOutcome::Scheduled { previous: None, .. }
    ));
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn test_unknown_identity_is_compared_like_any_other() {
    let repos = FakeRepos::default();
    repos.checkout("r", None, None);
    let scheduler = Arc::new(ManualScheduler::new());
    let trigger = BranchTrigger::new(repos.clone(), scheduler.clone());

    assert_eq!(trigger.cached_identity("r"), Some(BranchIdentity::Unknown));
    assert_eq!(trigger.notify("r"), NotifyOutcome::Unchanged);

    repos.checkout("r", None, Some("abc"));
    assert!(matches!(trigger.notify("r"), NotifyOutcome::Scheduled { .. }));
}

#[test]
fn test_repositories_are_tracked_independently() {
    let repos = FakeRepos::default();
    repos.checkout("a", Some("main"), Some("1"));
    repos.checkout("b", Some("main"), Some("1"));
    let scheduler = Arc::new(ManualScheduler::new());
    let trigger = BranchTrigger::new(repos.clone(), scheduler.clone());

    repos.checkout("a", Some("dev"), Some("2"));

    assert_eq!(trigger.notify("b"), NotifyOutcome::Unchanged);
    assert!(matches!(trigger.notify("a"), NotifyOutcome::Scheduled { .. }));
    assert_eq!(trigger.notify("a"), NotifyOutcome::Unchanged);
}

/// Delivers a notification from inside `run_on_ui_queue`, while the guard is held.
struct ReentrantScheduler {
    inner: ManualScheduler,
    hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Scheduler for ReentrantScheduler {
    fn run_on_ui_queue(&self, task: Task) {
        let hook = self.hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.run_on_ui_queue(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        self.inner.schedule_after(delay, task);
    }
}

#[test]
fn test_notification_during_scheduling_is_busy() {
    let repos = FakeRepos::default();
    repos.checkout("r", Some("main"), Some("abc"));
    let scheduler = Arc::new(ReentrantScheduler {
        inner: ManualScheduler::new(),
        hook: Mutex::new(None),
    });
    let trigger = Arc::new(BranchTrigger::new(repos.clone(), scheduler.clone()));

    let nested = Arc::new(Mutex::new(None));
    let (hook_trigger, hook_repos, hook_nested) =
        (Arc::clone(&trigger), repos.clone(), Arc::clone(&nested));
    *scheduler.hook.lock().unwrap() = Some(Box::new(move || {
        hook_repos.checkout("r", Some("other"), Some("fff"));
        *hook_nested.lock().unwrap() = Some(hook_trigger.notify("r"));
    }));

    repos.checkout("r", Some("feature"), Some("def"));
    assert!(matches!(trigger.notify("r"), NotifyOutcome::Scheduled { .. }));

    assert_eq!(*nested.lock().unwrap(), Some(NotifyOutcome::Busy));
    assert_eq!(scheduler.inner.pending(), 1, "exactly one pass scheduled");

    // The guard is released once scheduling returns, so the dropped change is seen next time.
    assert!(matches!(trigger.notify("r"), NotifyOutcome::Scheduled { .. }));
    assert_eq!(scheduler.inner.pending(), 2);
}
