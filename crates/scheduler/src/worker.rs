//! Serial action worker with a dedicated named thread.
//!
//! This module provides the execution primitive the pipeline posts all of
//! its work to. Each worker owns exactly one thread and runs posted actions
//! strictly one at a time, so two actions posted to the same worker never
//! run concurrently and back-of-queue posts preserve submission order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

type Action = Box<dyn FnOnce() + Send>;

/// Handle to a posted action.
///
/// Cancelling is cooperative at the queue level: a cancelled action is
/// skipped when the worker dequeues it. Cancellation has no effect once
/// the action has started running.
///
/// # Example
///
/// ```
/// use docframe_scheduler::ActionWorker;
/// use std::time::Duration;
///
/// let worker = ActionWorker::spawn("doc-example");
/// let task = worker.post_delayed(Duration::from_secs(60), || {
///     unreachable!("cancelled before the delay elapses");
/// });
/// task.cancel();
/// worker.shutdown();
/// ```
#[derive(Clone)]
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that is already cancelled. Returned when posting to a
    /// worker that has shut down.
    fn already_cancelled() -> Self {
        let task = Self::new();
        task.cancel();
        task
    }

    /// Cancel the action. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether the action has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct Task {
    run: Action,
    cancelled: Arc<AtomicBool>,
}

struct TimedTask {
    due: Instant,
    task: Task,
}

struct QueueState {
    front: VecDeque<Task>,
    back: VecDeque<Task>,
    timed: Vec<TimedTask>,
    shutdown: bool,
}

impl QueueState {
    fn new() -> Self {
        Self {
            front: VecDeque::new(),
            back: VecDeque::new(),
            timed: Vec::new(),
            shutdown: false,
        }
    }
}

enum Placement {
    Front,
    Back,
    Delayed(Duration),
}

/// A serial worker executing posted actions on its own named thread.
///
/// Actions posted with [`post`](ActionWorker::post) run in FIFO order.
/// [`post_front`](ActionWorker::post_front) jumps ahead of everything
/// already queued, and [`post_delayed`](ActionWorker::post_delayed) holds
/// an action back until its delay elapses. Delayed actions never preempt
/// a running action; they join the back of the queue when due.
///
/// Dropping the worker shuts it down and joins the thread. Pending actions
/// that have not started are discarded on shutdown.
pub struct ActionWorker {
    state: Arc<(Mutex<QueueState>, Condvar)>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl ActionWorker {
    /// Spawn a worker with the given thread name.
    pub fn spawn(name: &str) -> Self {
        let state = Arc::new((Mutex::new(QueueState::new()), Condvar::new()));
        let state_clone = state.clone();

        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                Self::run(state_clone);
            })
            .expect("Failed to spawn action worker thread");

        tracing::debug!(worker = name, "action worker started");

        Self {
            state,
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
            name: name.to_owned(),
        }
    }

    /// The worker's thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The id of the worker's thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the calling thread is the worker's own thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Post an action at the back of the queue.
    pub fn post(&self, action: impl FnOnce() + Send + 'static) -> ScheduledTask {
        self.enqueue(Box::new(action), Placement::Back)
    }

    /// Post an action at the front of the queue, ahead of everything
    /// already queued.
    pub fn post_front(&self, action: impl FnOnce() + Send + 'static) -> ScheduledTask {
        self.enqueue(Box::new(action), Placement::Front)
    }

    /// Post an action that becomes runnable after `delay`.
    pub fn post_delayed(
        &self,
        delay: Duration,
        action: impl FnOnce() + Send + 'static,
    ) -> ScheduledTask {
        self.enqueue(Box::new(action), Placement::Delayed(delay))
    }

    fn enqueue(&self, run: Action, placement: Placement) -> ScheduledTask {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock().unwrap();
        if state.shutdown {
            return ScheduledTask::already_cancelled();
        }

        let handle = ScheduledTask::new();
        let task = Task {
            run,
            cancelled: handle.cancelled.clone(),
        };
        match placement {
            Placement::Front => state.front.push_back(task),
            Placement::Back => state.back.push_back(task),
            Placement::Delayed(delay) => state.timed.push(TimedTask {
                due: Instant::now() + delay,
                task,
            }),
        }
        cvar.notify_one();
        handle
    }

    /// Shut the worker down and join its thread.
    ///
    /// Pending actions that have not started are discarded. The running
    /// action (if any) completes first. Safe to call more than once; only
    /// the first call joins.
    pub fn shutdown(&self) {
        {
            let (lock, cvar) = &*self.state;
            let mut state = lock.lock().unwrap();
            state.shutdown = true;
            cvar.notify_all();
        }
        tracing::debug!(worker = %self.name, "action worker shutting down");

        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            // A worker cannot join itself; shutdown from its own thread
            // leaves the thread to exit on its own.
            if thread::current().id() != self.thread_id {
                let _ = handle.join();
            }
        }
    }

    fn run(state: Arc<(Mutex<QueueState>, Condvar)>) {
        let (lock, cvar) = &*state;
        let mut guard = lock.lock().unwrap();
        loop {
            if guard.shutdown {
                break;
            }

            // Promote due delayed actions onto the back of the queue,
            // earliest deadline first.
            let now = Instant::now();
            if guard.timed.iter().any(|t| t.due <= now) {
                guard.timed.sort_by_key(|t| t.due);
                while guard.timed.first().is_some_and(|t| t.due <= now) {
                    let timed = guard.timed.remove(0);
                    guard.back.push_back(timed.task);
                }
            }

            let next = guard.front.pop_front().or_else(|| guard.back.pop_front());
            if let Some(task) = next {
                drop(guard);
                if !task.cancelled.load(Ordering::Acquire) {
                    (task.run)();
                }
                guard = lock.lock().unwrap();
                continue;
            }

            // Nothing runnable: sleep until woken or the next deadline.
            if let Some(due) = guard.timed.iter().map(|t| t.due).min() {
                let timeout = due.saturating_duration_since(Instant::now());
                let (next_guard, _) = cvar.wait_timeout(guard, timeout).unwrap();
                guard = next_guard;
            } else {
                guard = cvar.wait(guard).unwrap();
            }
        }
    }
}

impl Drop for ActionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
