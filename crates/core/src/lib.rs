//! Docframe Core Library
//!
//! Frame rendering pipeline over a native layout/paint engine.
//!
//! This crate coordinates everything between a host UI and the native
//! engine: per-document FIFO mutation queues on a shared worker,
//! per-surface GPU workers with thread-affine render contexts, frame
//! pacing that coalesces repaints onto a fixed interval, a process-wide
//! document registry with host lifecycle fan-out, attach/detach
//! throttling, and image-result retention across pause/resume.
//!
//! # Example
//!
//! ```
//! use docframe_core::{ChannelUiDispatcher, HostScope, RenderConfig, RenderRuntime};
//! use docframe_engine::{MockEngine, SurfaceId};
//! use std::sync::Arc;
//!
//! let (ui, _inbox) = ChannelUiDispatcher::new();
//! let runtime = RenderRuntime::new(Arc::new(MockEngine::new()), ui, RenderConfig::default());
//!
//! // One session per document the host shows.
//! let session = runtime.create_session(HostScope(1));
//! session.create_body("root", Default::default(), Default::default(), vec![]);
//!
//! // The host's surface drives the GPU side.
//! session.surface_available(SurfaceId(7), 360, 640);
//! session.surface_destroyed();
//!
//! runtime.shutdown();
//! ```

mod actions;
mod config;
mod error;
mod events;
mod registry;
mod runtime;
mod session;
mod stats;
mod surface;

// Re-export public API
pub use config::RenderConfig;
pub use error::{RenderError, Result};
pub use events::{
    ChannelUiDispatcher, FrameAdapter, FrameEventListener, ImageAdapter, ImageLoadListener,
    SizeChangedListener, UiDispatcher, UiInbox,
};
pub use registry::{DocumentRegistry, HostScope};
pub use runtime::RenderRuntime;
pub use session::{DocumentSession, Lifecycle};
pub use stats::{churn_delay, AttachGuard, RenderStats, StatsSnapshot};
pub use surface::SurfaceSession;
