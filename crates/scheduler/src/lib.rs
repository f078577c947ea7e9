//! Docframe Scheduler Library
//!
//! Serial action workers with cancellable and delayed tasks.
//!
//! This crate provides the threading primitives the rendering pipeline is
//! built on: a serial [`ActionWorker`] that executes posted closures in FIFO
//! order on a dedicated named thread (with front-of-queue and delayed
//! variants), a [`FramePacer`] that coalesces repaint requests onto a fixed
//! frame interval, a [`CompletionLatch`] for bounded synchronous waits, and
//! a [`DestroyFlag`] shared between a session and its in-flight tasks.
//!
//! # Example
//!
//! ```
//! use docframe_scheduler::ActionWorker;
//! use std::sync::mpsc;
//!
//! let worker = ActionWorker::spawn("example-worker");
//! let (tx, rx) = mpsc::channel();
//!
//! worker.post(move || {
//!     tx.send(2 + 2).unwrap();
//! });
//!
//! assert_eq!(rx.recv().unwrap(), 4);
//! worker.shutdown();
//! ```

mod destroy;
mod latch;
mod pacer;
mod worker;

// Re-export public API
pub use destroy::DestroyFlag;
pub use latch::CompletionLatch;
pub use pacer::{FramePacer, FrameTick};
pub use worker::{ActionWorker, ScheduledTask};
