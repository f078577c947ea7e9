//! Native engine boundary for the docframe rendering pipeline.
//!
//! The layout/paint engine itself is an external native library. This crate
//! defines the call contract the pipeline consumes: opaque handles for native
//! documents and GPU render contexts, the [`RenderEngine`] trait covering
//! document mutation, layout, paint, and render-context lifecycle, and a
//! recording [`MockEngine`] used by the pipeline's tests.

pub mod bridge;
pub mod mock;
pub mod types;

pub use bridge::{DocumentHandle, RenderContextHandle, RenderEngine};
pub use mock::{EngineCall, MockEngine};
pub use types::{BoxEdge, DocumentKey, HitTestKind, PropMap, SurfaceId};
