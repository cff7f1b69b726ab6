//! Execution contexts for work that touches the bookmark tree.
//!
//! All tree mutation and persistence runs on one serialized queue that owns the [`Session`].
//! Work is submitted as a [`Task`] that receives `&mut Session`, so there is no other way to
//! reach the tree from a notification thread. Two schedulers are provided:
//!
//! - [`ManualScheduler`] queues tasks and runs them only when told to, against a fake clock.
//! - [`QueueScheduler`] feeds a [`QueueWorker`] thread that owns the session and keeps its
//!   own timer heap for delayed tasks.

use crate::session::Session;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Unit of work run on the session-owning queue.
pub type Task = Box<dyn FnOnce(&mut Session) + Send + 'static>;

/// Submit work to the serialized queue that owns the session.
pub trait Scheduler: Send + Sync {
    /// Run `task` on the queue as soon as it is free.
    fn run_on_ui_queue(&self, task: Task);

    /// Run `task` on the queue once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, task: Task);
}

struct Timer<T> {
    due: T,
    seq: u64,
    task: Task,
}

impl<T: Ord> PartialEq for Timer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T: Ord> Eq for Timer<T> {}

impl<T: Ord> PartialOrd for Timer<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Timer<T> {
    // Reversed so that `BinaryHeap` pops the earliest timer first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    ready: VecDeque<Task>,
    timers: BinaryHeap<Timer<Duration>>,
}

#[derive(Default)]
/// A scheduler driven by hand, with a fake clock for delayed tasks.
///
/// Nothing runs until [`ManualScheduler::run_until_idle`] or [`ManualScheduler::advance`] is
/// called with the session.
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    #[must_use]
    /// A scheduler with an empty queue at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    /// Tasks waiting to run now.
    pub fn pending(&self) -> usize {
        self.state().ready.len()
    }

    #[must_use]
    /// Delayed tasks whose time has not come.
    pub fn timers(&self) -> usize {
        self.state().timers.len()
    }

    #[must_use]
    /// Time elapsed on the fake clock.
    pub fn now(&self) -> Duration {
        self.state().now
    }

    /// Run ready tasks until the queue is empty, including any they enqueue. Returns how many
    /// ran.
    pub fn run_until_idle(&self, session: &mut Session) -> usize {
        let mut ran = 0;
        loop {
            let next = self.state().ready.pop_front();
            let Some(task) = next else {
                return ran;
            };
            task(session);
            ran += 1;
        }
    }

    /// Move the clock forward, release every timer that falls due, and run the queue dry.
    pub fn advance(&self, by: Duration, session: &mut Session) -> usize {
        {
            let mut state = self.state();
            state.now += by;
            let now = state.now;
            while state.timers.peek().is_some_and(|timer| timer.due <= now) {
                if let Some(timer) = state.timers.pop() {
                    state.ready.push_back(timer.task);
                }
            }
        }
        self.run_until_idle(session)
    }
}

impl Scheduler for ManualScheduler {
    fn run_on_ui_queue(&self, task: Task) {
        self.state().ready.push_back(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        let mut state = self.state();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.timers.push(Timer { due, seq, task });
    }
}

enum Message {
    Run(Task),
    After(Duration, Task),
    Shutdown,
}

/// Handle for submitting work to a [`QueueWorker`] thread.
pub struct QueueScheduler {
    sender: Sender<Message>,
}

/// The receiving half, turned into the session-owning thread by [`QueueWorker::spawn`].
pub struct QueueWorker {
    receiver: Receiver<Message>,
}

impl QueueScheduler {
    #[must_use]
    /// Create a connected scheduler and worker.
    pub fn channel() -> (Self, QueueWorker) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, QueueWorker { receiver })
    }

    /// Ask the worker to stop once the tasks already queued ahead of this request have run.
    /// Timers that have not fired are dropped.
    pub fn shutdown(&self) {
        if self.sender.send(Message::Shutdown).is_err() {
            tracing::debug!(target: "linemark.exec", "queue worker already stopped");
        }
    }

    fn send(&self, message: Message) {
        if self.sender.send(message).is_err() {
            tracing::warn!(target: "linemark.exec", "queue worker stopped, task dropped");
        }
    }
}

impl Scheduler for QueueScheduler {
    fn run_on_ui_queue(&self, task: Task) {
        self.send(Message::Run(task));
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        self.send(Message::After(delay, task));
    }
}

impl QueueWorker {
    /// Move `session` onto a dedicated thread and process tasks until shutdown.
    ///
    /// A task that panics is logged and skipped; the tasks and timers behind it still run.
    ///
    /// The session is handed back through the join handle so the caller can flush it.
    #[must_use]
    pub fn spawn(self, session: Session) -> JoinHandle<Session> {
        thread::spawn(move || self.run(session))
    }

    fn run(self, mut session: Session) -> Session {
        let mut timers: BinaryHeap<Timer<Instant>> = BinaryHeap::new();
        let mut next_seq = 0u64;

        loop {
            let message = match timers.peek() {
                Some(timer) => {
                    let wait = timer.due.saturating_duration_since(Instant::now());
                    match self.receiver.recv_timeout(wait) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };

            match message {
                Some(Message::Run(task)) => run_isolated(task, &mut session),
                Some(Message::After(delay, task)) => {
                    timers.push(Timer {
                        due: Instant::now() + delay,
                        seq: next_seq,
                        task,
                    });
                    next_seq += 1;
                }
                Some(Message::Shutdown) => break,
                None => {}
            }

            let now = Instant::now();
            while timers.peek().is_some_and(|timer| timer.due <= now) {
                if let Some(timer) = timers.pop() {
                    run_isolated(timer.task, &mut session);
                }
            }
        }

        if !timers.is_empty() {
            tracing::debug!(
                target: "linemark.exec",
                dropped = timers.len(),
                "queue worker stopped with pending timers"
            );
        }
        session
    }
}

/// Run one task; a panic is logged and does not reach the worker loop.
fn run_isolated(task: Task, session: &mut Session) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(session))) {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        tracing::error!(
            target: "linemark.exec",
            panic = message,
            "queued task panicked, continuing with the next one"
        );
    }
}

#[cfg(test)]
#[path = "tests/exec.rs"]
mod tests;
