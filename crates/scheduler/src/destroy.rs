//! Destroy flag shared between a session and its in-flight actions.
//!
//! Destruction is cooperative: queued actions re-check the flag around
//! every native call so that a session torn down mid-queue degrades to a
//! sequence of no-ops instead of touching a released handle.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// One-way destroy flag for cooperative teardown.
///
/// All clones share the same underlying state. Unlike a generic
/// cancellation token the flag can never be reset: once a session is
/// destroyed it stays destroyed.
///
/// # Example
///
/// ```
/// use docframe_scheduler::DestroyFlag;
///
/// let flag = DestroyFlag::new();
/// let worker_flag = flag.clone();
///
/// flag.mark_destroyed();
/// assert!(worker_flag.is_destroyed());
/// ```
#[derive(Clone)]
pub struct DestroyFlag {
    destroyed: Arc<AtomicBool>,
}

impl DestroyFlag {
    /// Create a flag in the live (not destroyed) state.
    pub fn new() -> Self {
        Self {
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark as destroyed. Idempotent, and visible to all clones.
    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    /// Whether `mark_destroyed` has been called on any clone.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl Default for DestroyFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_live() {
        let flag = DestroyFlag::new();
        assert!(!flag.is_destroyed());
    }

    #[test]
    fn test_mark_destroyed_visible_to_clones() {
        let flag = DestroyFlag::new();
        let clone = flag.clone();

        flag.mark_destroyed();
        assert!(flag.is_destroyed());
        assert!(clone.is_destroyed());
    }

    #[test]
    fn test_idempotent() {
        let flag = DestroyFlag::new();
        flag.mark_destroyed();
        flag.mark_destroyed();
        assert!(flag.is_destroyed());
    }
}
