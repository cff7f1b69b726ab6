use super::{ManualScheduler, QueueScheduler, Scheduler};
use crate::host::MemoryDocuments;
use crate::model::BookmarkTree;
use crate::session::Session;
use crate::storage::MemoryStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn session(scheduler: Arc<dyn Scheduler>) -> Session {
    Session::new(
        BookmarkTree::default(),
        Box::new(MemoryDocuments::new()),
        Box::new(MemoryStore::new()),
        scheduler,
    )
}

fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> super::Task) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle = Arc::clone(&log);
    let make = move |label: &'static str| -> super::Task {
        let log = Arc::clone(&handle);
        Box::new(move |_: &mut Session| log.lock().unwrap().push(label))
    };
    (log, make)
}

#[test]
fn test_manual_runs_nothing_until_asked() {
    let scheduler = Arc::new(ManualScheduler::new());
    let mut session = session(scheduler.clone());
    let (log, task) = recorder();

    scheduler.run_on_ui_queue(task("first"));
    scheduler.run_on_ui_queue(task("second"));
    assert_eq!(scheduler.pending(), 2);
    assert!(log.lock().unwrap().is_empty());

    assert_eq!(scheduler.run_until_idle(&mut session), 2);
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_manual_timers_fire_in_due_order() {
    let scheduler = Arc::new(ManualScheduler::new());
    let mut session = session(scheduler.clone());
    let (log, task) = recorder();

    scheduler.schedule_after(Duration::from_millis(300), task("late"));
    scheduler.schedule_after(Duration::from_millis(100), task("early"));
    scheduler.schedule_after(Duration::from_millis(100), task("early-second"));
    assert_eq!(scheduler.timers(), 3);

    assert_eq!(scheduler.advance(Duration::from_millis(99), &mut session), 0);
    assert_eq!(scheduler.advance(Duration::from_millis(1), &mut session), 2);
    assert_eq!(*log.lock().unwrap(), vec!["early", "early-second"]);

    assert_eq!(scheduler.advance(Duration::from_millis(200), &mut session), 1);
    assert_eq!(scheduler.now(), Duration::from_millis(300));
    assert_eq!(scheduler.timers(), 0);
}

#[test]
fn test_manual_runs_tasks_enqueued_by_tasks() {
    let scheduler = Arc::new(ManualScheduler::new());
    let mut session = session(scheduler.clone());
    let (log, task) = recorder();
    let follow_up = task("follow-up");
    let inner = Arc::clone(&scheduler);

    scheduler.run_on_ui_queue(Box::new(move |_: &mut Session| {
        inner.run_on_ui_queue(follow_up);
    }));

    assert_eq!(scheduler.run_until_idle(&mut session), 2);
    assert_eq!(*log.lock().unwrap(), vec!["follow-up"]);
}

#[test]
fn test_queue_worker_owns_session_until_shutdown() {
    let (scheduler, worker) = QueueScheduler::channel();
    let scheduler = Arc::new(scheduler);
    let shared: Arc<dyn Scheduler> = scheduler.clone();
    let handle = worker.spawn(session(Arc::clone(&shared)));

    shared.run_on_ui_queue(Box::new(|session: &mut Session| {
        session.add_group(None, "from the queue").unwrap();
    }));
    shared.schedule_after(
        Duration::ZERO,
        Box::new(|session: &mut Session| {
            session.add_group(None, "from a timer").unwrap();
        }),
    );
    std::thread::sleep(Duration::from_millis(100));
    scheduler.shutdown();

    let session = handle.join().unwrap();
    let names: Vec<String> = session
        .tree()
        .root()
        .as_group()
        .unwrap()
        .iter()
        .map(|node| node.name.clone())
        .collect();
    assert_eq!(names, vec!["from the queue", "from a timer"]);
}

#[test]
fn test_queue_worker_drops_unfired_timers_on_shutdown() {
    let (scheduler, worker) = QueueScheduler::channel();
    let scheduler = Arc::new(scheduler);
    let shared: Arc<dyn Scheduler> = scheduler.clone();
    let handle = worker.spawn(session(Arc::clone(&shared)));

    shared.schedule_after(
        Duration::from_secs(3600),
        Box::new(|session: &mut Session| {
            session.add_group(None, "never").unwrap();
        }),
    );
    scheduler.shutdown();

    let session = handle.join().unwrap();
    assert!(session.tree().root().as_group().unwrap().is_empty());
}

#[test]
fn test_queue_worker_survives_a_panicking_task() {
    let (scheduler, worker) = QueueScheduler::channel();
    let scheduler = Arc::new(scheduler);
    let shared: Arc<dyn Scheduler> = scheduler.clone();
    let handle = worker.spawn(session(Arc::clone(&shared)));

    shared.run_on_ui_queue(Box::new(|_: &mut Session| panic!("document service failed")));
    shared.schedule_after(
        Duration::ZERO,
        Box::new(|_: &mut Session| panic!("timer failed")),
    );
    shared.run_on_ui_queue(Box::new(|session: &mut Session| {
        session.add_group(None, "after the panic").unwrap();
    }));
    std::thread::sleep(Duration::from_millis(100));
    scheduler.shutdown();

    let session = handle.join().unwrap();
    let root = session.tree().root().as_group().unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root.iter().next().unwrap().name, "after the panic");
}
