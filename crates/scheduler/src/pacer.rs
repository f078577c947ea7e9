//! Frame pacing and repaint coalescing.
//!
//! This module decouples "something changed" from "paint now". Mutations
//! call [`FramePacer::request_frame`] as often as they like; the pacer
//! collapses all requests made during one frame interval into a single
//! tick delivered on the mutation worker. Urgent repaints (a surface was
//! just attached) go through [`FramePacer::request_immediate`], which
//! replaces any pending delayed tick with a front-of-queue one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::worker::{ActionWorker, ScheduledTask};

/// Receiver of coalesced frame ticks.
pub trait FrameTick: Send + Sync {
    /// One frame tick. Runs on the pacer's worker thread.
    fn on_frame(&self);
}

/// Coalesces repaint requests onto a fixed frame interval.
///
/// The listener is held weakly; a tick that fires after the listener is
/// gone is dropped silently. While a tick is pending, further
/// [`request_frame`](FramePacer::request_frame) calls are no-ops, so a
/// burst of mutations costs one paint.
///
/// # Example
///
/// ```
/// use docframe_scheduler::{ActionWorker, FramePacer, FrameTick};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Counter(AtomicUsize);
/// impl FrameTick for Counter {
///     fn on_frame(&self) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let worker = Arc::new(ActionWorker::spawn("doc-pacer-example"));
/// let counter = Arc::new(Counter(AtomicUsize::new(0)));
/// let pacer = Arc::new(FramePacer::new(worker, Duration::from_millis(10)));
/// let listener = Arc::downgrade(&counter);
/// pacer.set_listener(listener);
///
/// // Three requests inside one interval coalesce into one tick.
/// pacer.request_frame();
/// pacer.request_frame();
/// pacer.request_frame();
///
/// std::thread::sleep(Duration::from_millis(100));
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub struct FramePacer {
    worker: Arc<ActionWorker>,
    interval: Duration,
    listener: Mutex<Weak<dyn FrameTick>>,
    requested: AtomicBool,
    pending: Mutex<Option<ScheduledTask>>,
}

impl FramePacer {
    /// Create a pacer posting ticks to `worker` every `interval`.
    pub fn new(worker: Arc<ActionWorker>, interval: Duration) -> Self {
        Self {
            worker,
            interval,
            listener: Mutex::new(Weak::<NullTick>::new()),
            requested: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    /// Install the tick listener. Held weakly.
    pub fn set_listener(&self, listener: Weak<dyn FrameTick>) {
        *self.listener.lock().unwrap() = listener;
    }

    /// The configured frame interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a tick is currently pending.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Request a tick one frame interval from now.
    ///
    /// No-op while a tick is already pending, so repeated calls within
    /// one interval coalesce into a single tick.
    pub fn request_frame(self: &Arc<Self>) {
        if self.requested.swap(true, Ordering::AcqRel) {
            return;
        }
        let pacer = Arc::downgrade(self);
        let task = self.worker.post_delayed(self.interval, move || {
            if let Some(pacer) = pacer.upgrade() {
                pacer.fire();
            }
        });
        *self.pending.lock().unwrap() = Some(task);
    }

    /// Request a tick ahead of everything already queued.
    ///
    /// Cancels a pending delayed tick first so the frame is not painted
    /// twice.
    pub fn request_immediate(self: &Arc<Self>) {
        if let Some(task) = self.pending.lock().unwrap().take() {
            task.cancel();
        }
        self.requested.store(true, Ordering::Release);
        let pacer = Arc::downgrade(self);
        let task = self.worker.post_front(move || {
            if let Some(pacer) = pacer.upgrade() {
                pacer.fire();
            }
        });
        *self.pending.lock().unwrap() = Some(task);
    }

    /// Cancel any pending tick without firing it.
    pub fn cancel_pending(&self) {
        if let Some(task) = self.pending.lock().unwrap().take() {
            task.cancel();
        }
        self.requested.store(false, Ordering::Release);
    }

    fn fire(&self) {
        self.pending.lock().unwrap().take();
        self.requested.store(false, Ordering::Release);
        let listener = self.listener.lock().unwrap().upgrade();
        if let Some(listener) = listener {
            listener.on_frame();
        }
    }
}

struct NullTick;

impl FrameTick for NullTick {
    fn on_frame(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct Counter(AtomicUsize);

    impl Counter {
        fn new() -> Arc<Self> {
            Arc::new(Self(AtomicUsize::new(0)))
        }

        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl FrameTick for Counter {
        fn on_frame(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pacer_with(interval: Duration) -> (Arc<FramePacer>, Arc<Counter>, Arc<ActionWorker>) {
        let worker = Arc::new(ActionWorker::spawn("test-pacer"));
        let counter = Counter::new();
        let pacer = Arc::new(FramePacer::new(worker.clone(), interval));
        let listener = Arc::downgrade(&counter);
        pacer.set_listener(listener);
        (pacer, counter, worker)
    }

    #[test]
    fn test_burst_coalesces_into_one_tick() {
        let (pacer, counter, worker) = pacer_with(Duration::from_millis(20));

        for _ in 0..10 {
            pacer.request_frame();
        }
        thread::sleep(Duration::from_millis(120));

        assert_eq!(counter.count(), 1);
        assert!(!pacer.is_requested());
        worker.shutdown();
    }

    #[test]
    fn test_second_interval_ticks_again() {
        let (pacer, counter, worker) = pacer_with(Duration::from_millis(15));

        pacer.request_frame();
        thread::sleep(Duration::from_millis(80));
        pacer.request_frame();
        thread::sleep(Duration::from_millis(80));

        assert_eq!(counter.count(), 2);
        worker.shutdown();
    }

    #[test]
    fn test_immediate_replaces_pending_tick() {
        let (pacer, counter, worker) = pacer_with(Duration::from_millis(50));

        pacer.request_frame();
        pacer.request_immediate();
        thread::sleep(Duration::from_millis(150));

        // The delayed tick was cancelled; only the immediate one fires.
        assert_eq!(counter.count(), 1);
        worker.shutdown();
    }

    #[test]
    fn test_cancel_pending_suppresses_tick() {
        let (pacer, counter, worker) = pacer_with(Duration::from_millis(30));

        pacer.request_frame();
        pacer.cancel_pending();
        thread::sleep(Duration::from_millis(100));

        assert_eq!(counter.count(), 0);
        assert!(!pacer.is_requested());
        worker.shutdown();
    }

    #[test]
    fn test_dropped_listener_is_ignored() {
        let worker = Arc::new(ActionWorker::spawn("test-pacer-weak"));
        let pacer = Arc::new(FramePacer::new(worker.clone(), Duration::from_millis(10)));
        {
            let counter = Counter::new();
            let listener = Arc::downgrade(&counter);
            pacer.set_listener(listener);
        }
        pacer.request_frame();
        thread::sleep(Duration::from_millis(60));

        // Tick fired into a dead listener without panicking, and the
        // pacer is ready for the next request.
        assert!(!pacer.is_requested());
        worker.shutdown();
    }
}
