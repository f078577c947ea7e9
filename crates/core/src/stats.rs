//! Backpressure and churn accounting.
//!
//! Two independent throttles live here. The attach backlog counter keeps
//! a burst of surface attaches (a fast fling through a long list) from
//! stacking unboundedly on the surface workers. The detach churn window
//! slows attach/detach traffic down when surfaces are being torn down
//! faster than the native layer can keep up.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::config::RenderConfig;

struct ChurnState {
    window_start: Option<Instant>,
    detaches: u32,
}

/// Snapshot of the throttling counters.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    /// Attach actions currently in flight.
    pub pending_attaches: usize,

    /// Detaches recorded in the current churn window.
    pub detaches_in_window: u32,
}

/// Process-wide attach/detach throttling counters.
///
/// Shared by every surface of every document; one instance per
/// [`RenderRuntime`](crate::RenderRuntime).
pub struct RenderStats {
    pending: Mutex<usize>,
    pending_cvar: Condvar,
    churn: Mutex<ChurnState>,
    max_pending_attaches: usize,
    attach_poll_interval: Duration,
    max_detaches_per_window: u32,
    churn_window: Duration,
    churn_base_delay: Duration,
}

impl RenderStats {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            pending: Mutex::new(0),
            pending_cvar: Condvar::new(),
            churn: Mutex::new(ChurnState {
                window_start: None,
                detaches: 0,
            }),
            max_pending_attaches: config.max_pending_attaches,
            attach_poll_interval: config.attach_poll_interval,
            max_detaches_per_window: config.max_detaches_per_window,
            churn_window: config.churn_window,
            churn_base_delay: config.churn_base_delay,
        }
    }

    /// Attach actions currently in flight.
    pub fn pending_attaches(&self) -> usize {
        *self.pending.lock().unwrap()
    }

    /// Block while the attach backlog is at its ceiling.
    ///
    /// The wait is bounded: one poll round per attach that was pending
    /// when the wait began, so a stalled surface worker delays new
    /// attaches instead of deadlocking them. Returns the number of wait
    /// rounds taken.
    pub fn wait_if_attach_backlog_exceeds(&self) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let mut rounds_left = *pending;
        let mut rounds_taken = 0;
        while *pending >= self.max_pending_attaches && rounds_left > 0 {
            let (next, _) = self
                .pending_cvar
                .wait_timeout(pending, self.attach_poll_interval)
                .unwrap();
            pending = next;
            rounds_left -= 1;
            rounds_taken += 1;
        }
        if rounds_taken > 0 {
            tracing::debug!(rounds_taken, "attach backlog wait");
        }
        rounds_taken
    }

    /// Count an attach as in flight until the returned guard drops.
    ///
    /// The guard decrements on drop, so an attach action that is
    /// discarded on worker shutdown still releases its slot.
    pub fn begin_attach(self: &Arc<Self>) -> AttachGuard {
        *self.pending.lock().unwrap() += 1;
        AttachGuard {
            stats: self.clone(),
        }
    }

    /// Record one surface detach.
    ///
    /// Returns the throttle delay the detaching caller should apply, if
    /// the churn threshold for the current window is exceeded. A detach
    /// that lands after the window has lapsed starts a fresh window.
    pub fn record_detach(&self) -> Option<Duration> {
        let mut churn = self.churn.lock().unwrap();
        let now = Instant::now();
        match churn.window_start {
            Some(start) if now.duration_since(start) <= self.churn_window => {
                churn.detaches += 1;
            }
            _ => {
                churn.window_start = Some(now);
                churn.detaches = 1;
            }
        }
        if churn.detaches > self.max_detaches_per_window {
            let delay = churn_delay(
                churn.detaches,
                self.max_detaches_per_window,
                self.churn_base_delay,
            );
            tracing::debug!(detaches = churn.detaches, ?delay, "detach churn throttle");
            Some(delay)
        } else {
            None
        }
    }

    /// Whether the current churn window has exceeded its threshold.
    ///
    /// While true, surface attach waits synchronously for its action to
    /// complete instead of returning immediately.
    pub fn churn_exceeded(&self) -> bool {
        let churn = self.churn.lock().unwrap();
        match churn.window_start {
            Some(start) => {
                start.elapsed() <= self.churn_window
                    && churn.detaches > self.max_detaches_per_window
            }
            None => false,
        }
    }

    /// Snapshot of both counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pending_attaches: self.pending_attaches(),
            detaches_in_window: self.churn.lock().unwrap().detaches,
        }
    }
}

/// Throttle delay for a detach count over the threshold: one base unit
/// per excess detach.
pub fn churn_delay(detaches: u32, threshold: u32, base: Duration) -> Duration {
    base * detaches.saturating_sub(threshold)
}

/// Releases one attach slot on drop.
pub struct AttachGuard {
    stats: Arc<RenderStats>,
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        let mut pending = self.stats.pending.lock().unwrap();
        *pending = pending.saturating_sub(1);
        self.stats.pending_cvar.notify_all();
    }
}
