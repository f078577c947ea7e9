//! One-shot completion latch for bounded synchronous waits.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A one-shot latch a caller can wait on with a deadline.
///
/// The pipeline uses latches where a caller must not return until a posted
/// action has run (surface attach and detach), but must also never block
/// unboundedly: [`wait_timeout`](CompletionLatch::wait_timeout) gives up
/// after the deadline and reports whether the signal arrived.
///
/// # Example
///
/// ```
/// use docframe_scheduler::CompletionLatch;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let latch = Arc::new(CompletionLatch::new());
/// let latch_clone = latch.clone();
///
/// std::thread::spawn(move || {
///     latch_clone.signal();
/// });
///
/// assert!(latch.wait_timeout(Duration::from_secs(5)));
/// ```
pub struct CompletionLatch {
    done: Mutex<bool>,
    cvar: Condvar,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    /// Release all current and future waiters. Idempotent.
    pub fn signal(&self) {
        let mut done = self.done.lock().unwrap();
        *done = true;
        self.cvar.notify_all();
    }

    /// Whether the latch has been signalled.
    pub fn is_signalled(&self) -> bool {
        *self.done.lock().unwrap()
    }

    /// Block until the latch is signalled or `timeout` elapses.
    ///
    /// Returns `true` when the signal arrived within the deadline.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.done.lock().unwrap();
        while !*done {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self.cvar.wait_timeout(done, deadline - now).unwrap();
            done = next;
        }
        true
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}
