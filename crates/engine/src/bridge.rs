//! The native engine call contract.
//!
//! Every method on [`RenderEngine`] is synchronous from the calling worker's
//! perspective. The pipeline guarantees the threading contract: document
//! mutation, layout, and paint calls arrive on the shared mutation worker;
//! render-context calls arrive on the dedicated worker of the surface that
//! owns the context. Implementations may rely on that and skip their own
//! synchronization.

use crate::types::{BoxEdge, DocumentKey, HitTestKind, PropMap, SurfaceId};

/// Opaque handle to a native document (layout tree + styles + event table).
///
/// A zero handle means "not yet created"; the pipeline never passes a zero
/// handle into an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// The null handle ("no native document").
    pub const NULL: DocumentHandle = DocumentHandle(0);

    /// Wrap a raw native pointer value.
    pub fn from_raw(raw: u64) -> Self {
        DocumentHandle(raw)
    }

    /// The raw native pointer value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Whether this is the null handle.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Opaque handle to a native GPU render context bound to one surface.
///
/// A zero handle means "not attached". Render contexts have hard thread
/// affinity in the native layer: all calls against one context must come
/// from the worker that attached it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderContextHandle(u64);

impl RenderContextHandle {
    /// The null handle ("no render context").
    pub const NULL: RenderContextHandle = RenderContextHandle(0);

    /// Wrap a raw native pointer value.
    pub fn from_raw(raw: u64) -> Self {
        RenderContextHandle(raw)
    }

    /// The raw native pointer value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Whether this is the null handle.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Call contract of the native layout/paint engine.
///
/// Mutation calls are best-effort and infallible at the signature level:
/// an unknown ref or a bad style value is the engine's problem to tolerate,
/// not a pipeline error. Geometry queries return whatever the engine knows;
/// a hit-test miss is `None`, not a failure.
pub trait RenderEngine: Send + Sync {
    // -- document lifecycle --------------------------------------------------

    /// Create a native document for `key` and return its handle.
    fn create_document(&self, key: DocumentKey) -> DocumentHandle;

    /// Destroy a native document. The handle must not be used afterwards.
    fn destroy_document(&self, doc: DocumentHandle);

    /// Run a layout pass over the document tree.
    fn layout(&self, doc: DocumentHandle);

    /// Paint the document into `ctx`. Returns `true` when the paint produced
    /// changed content that should be presented.
    fn paint(&self, doc: DocumentHandle, ctx: RenderContextHandle) -> bool;

    /// Laid-out content width in pixels.
    fn document_width(&self, doc: DocumentHandle) -> i32;

    /// Laid-out content height in pixels.
    fn document_height(&self, doc: DocumentHandle) -> i32;

    // -- tree mutation -------------------------------------------------------

    /// Create the body (root) element.
    fn create_body(
        &self,
        doc: DocumentHandle,
        element: &str,
        styles: &PropMap,
        attrs: &PropMap,
        events: &[String],
    );

    /// Insert a new element under `parent` at `index`.
    #[allow(clippy::too_many_arguments)]
    fn add_element(
        &self,
        doc: DocumentHandle,
        element: &str,
        kind: &str,
        parent: &str,
        index: usize,
        styles: &PropMap,
        attrs: &PropMap,
        events: &[String],
    );

    /// Reparent an existing element.
    fn move_element(&self, doc: DocumentHandle, element: &str, parent: &str, index: usize);

    /// Remove an element and its subtree.
    fn remove_element(&self, doc: DocumentHandle, element: &str);

    /// Merge attribute updates into an element.
    fn update_attrs(&self, doc: DocumentHandle, element: &str, attrs: &PropMap);

    /// Merge style updates into an element.
    fn update_styles(&self, doc: DocumentHandle, element: &str, styles: &PropMap);

    /// Register an event type on an element.
    fn add_event(&self, doc: DocumentHandle, element: &str, event: &str);

    /// Unregister an event type from an element.
    fn remove_event(&self, doc: DocumentHandle, element: &str, event: &str);

    // -- fonts ---------------------------------------------------------------

    /// Re-resolve the given font family against the native font table.
    fn refresh_font(&self, doc: DocumentHandle, family: &str);

    /// Register a font file under a family name.
    fn add_font(&self, family: &str, path: &str);

    /// Whether a family/path pair is already registered.
    fn has_font(&self, family: &str, path: &str) -> bool;

    // -- geometry ------------------------------------------------------------

    /// Resolve which element occupies the point, or `None` on a miss.
    fn hit_test(
        &self,
        doc: DocumentHandle,
        kind: HitTestKind,
        x: i32,
        y: i32,
    ) -> Option<String>;

    /// Query one edge of an element's screen-space block box.
    fn block_layout(&self, doc: DocumentHandle, element: &str, edge: BoxEdge) -> i32;

    // -- render context lifecycle (thread-affine) ----------------------------

    /// Acquire a GPU render context bound to the presentable surface.
    fn attach_render_context(
        &self,
        surface: SurfaceId,
        width: u32,
        height: u32,
    ) -> RenderContextHandle;

    /// Update the context's dimensions after the surface was resized.
    fn resize_render_context(&self, ctx: RenderContextHandle, width: u32, height: u32);

    /// Clear the context's back buffer.
    fn clear_buffer(&self, ctx: RenderContextHandle);

    /// Repaint the context's current content into the back buffer.
    fn invalidate_render_context(&self, ctx: RenderContextHandle);

    /// Present the back buffer. Returns `true` when a buffer was presented.
    fn swap_buffers(&self, ctx: RenderContextHandle) -> bool;

    /// Tear down the render context and release the presentable surface.
    fn detach_render_context(&self, ctx: RenderContextHandle, surface: SurfaceId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles() {
        assert!(DocumentHandle::NULL.is_null());
        assert!(RenderContextHandle::NULL.is_null());
        assert!(!DocumentHandle::from_raw(7).is_null());
        assert_eq!(DocumentHandle::from_raw(7).raw(), 7);
    }
}
