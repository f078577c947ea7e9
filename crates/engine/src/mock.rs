//! Recording engine for tests.
//!
//! [`MockEngine`] implements [`RenderEngine`] by appending every call to an
//! in-memory log together with the calling thread, so tests can assert both
//! call ordering (FIFO per document) and the threading contract (mutation
//! calls on the mutation worker, context calls on the surface worker).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crate::bridge::{DocumentHandle, RenderContextHandle, RenderEngine};
use crate::types::{BoxEdge, DocumentKey, HitTestKind, PropMap, SurfaceId};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateDocument { key: DocumentKey },
    DestroyDocument { doc: DocumentHandle },
    Layout { doc: DocumentHandle },
    Paint { doc: DocumentHandle, ctx: RenderContextHandle },
    CreateBody { doc: DocumentHandle, element: String },
    AddElement { doc: DocumentHandle, element: String, parent: String, index: usize },
    MoveElement { doc: DocumentHandle, element: String, parent: String, index: usize },
    RemoveElement { doc: DocumentHandle, element: String },
    UpdateAttrs { doc: DocumentHandle, element: String },
    UpdateStyles { doc: DocumentHandle, element: String },
    AddEvent { doc: DocumentHandle, element: String, event: String },
    RemoveEvent { doc: DocumentHandle, element: String, event: String },
    RefreshFont { doc: DocumentHandle, family: String },
    AddFont { family: String, path: String },
    HitTest { doc: DocumentHandle, kind: HitTestKind, x: i32, y: i32 },
    BlockLayout { doc: DocumentHandle, element: String, edge: BoxEdge },
    AttachContext { surface: SurfaceId, width: u32, height: u32 },
    ResizeContext { ctx: RenderContextHandle, width: u32, height: u32 },
    ClearBuffer { ctx: RenderContextHandle },
    InvalidateContext { ctx: RenderContextHandle },
    SwapBuffers { ctx: RenderContextHandle },
    DetachContext { ctx: RenderContextHandle, surface: SurfaceId },
}

/// A call together with the thread it arrived on.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: EngineCall,
    pub thread: ThreadId,
}

/// Recording [`RenderEngine`] for tests.
///
/// Handles are assigned from simple counters. Document size, paint result,
/// and hit-test result are configurable. An optional call hook runs before
/// each call is recorded, which lets a test flip a destroyed flag "mid
/// flight" between two guarded native calls.
///
/// # Example
///
/// ```
/// use docframe_engine::{DocumentKey, EngineCall, MockEngine, RenderEngine};
///
/// let engine = MockEngine::new();
/// let doc = engine.create_document(DocumentKey(1));
/// engine.layout(doc);
///
/// let calls = engine.call_log();
/// assert_eq!(calls[0], EngineCall::CreateDocument { key: DocumentKey(1) });
/// assert_eq!(calls[1], EngineCall::Layout { doc });
/// ```
pub struct MockEngine {
    calls: Mutex<Vec<RecordedCall>>,
    next_handle: AtomicU64,
    paint_changed: AtomicBool,
    sizes: Mutex<HashMap<DocumentHandle, (i32, i32)>>,
    default_size: Mutex<(i32, i32)>,
    hit_result: Mutex<Option<String>>,
    block_edges: Mutex<[i32; 4]>,
    call_hook: Mutex<Option<Box<dyn Fn(&EngineCall) + Send>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            paint_changed: AtomicBool::new(true),
            sizes: Mutex::new(HashMap::new()),
            default_size: Mutex::new((360, 640)),
            hit_result: Mutex::new(None),
            block_edges: Mutex::new([0, 0, 0, 0]),
            call_hook: Mutex::new(None),
        }
    }

    /// Set whether `paint` reports changed content.
    pub fn set_paint_changed(&self, changed: bool) {
        self.paint_changed.store(changed, Ordering::Release);
    }

    /// Set the laid-out size reported for every document.
    pub fn set_document_size(&self, width: i32, height: i32) {
        *self.default_size.lock().unwrap() = (width, height);
    }

    /// Set the element ref returned by `hit_test` (`None` = miss).
    pub fn set_hit_result(&self, element: Option<&str>) {
        *self.hit_result.lock().unwrap() = element.map(str::to_owned);
    }

    /// Set the block box returned by `block_layout` as (left, top, w, h).
    pub fn set_block_box(&self, left: i32, top: i32, width: i32, height: i32) {
        *self.block_edges.lock().unwrap() = [left, top, width, height];
    }

    /// Install a hook invoked before each call is recorded.
    pub fn set_call_hook(&self, hook: impl Fn(&EngineCall) + Send + 'static) {
        *self.call_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// All recorded calls in arrival order.
    pub fn call_log(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().iter().map(|r| r.call.clone()).collect()
    }

    /// All recorded calls with their arrival threads.
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching the predicate.
    pub fn count_calls(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| predicate(&r.call)).count()
    }

    /// Drop all recorded calls.
    pub fn clear_log(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: EngineCall) {
        if let Some(hook) = self.call_hook.lock().unwrap().as_ref() {
            hook(&call);
        }
        self.calls.lock().unwrap().push(RecordedCall {
            call,
            thread: thread::current().id(),
        });
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for MockEngine {
    fn create_document(&self, key: DocumentKey) -> DocumentHandle {
        self.record(EngineCall::CreateDocument { key });
        let handle = DocumentHandle::from_raw(self.next_raw());
        let size = *self.default_size.lock().unwrap();
        self.sizes.lock().unwrap().insert(handle, size);
        handle
    }

    fn destroy_document(&self, doc: DocumentHandle) {
        self.record(EngineCall::DestroyDocument { doc });
        self.sizes.lock().unwrap().remove(&doc);
    }

    fn layout(&self, doc: DocumentHandle) {
        self.record(EngineCall::Layout { doc });
    }

    fn paint(&self, doc: DocumentHandle, ctx: RenderContextHandle) -> bool {
        self.record(EngineCall::Paint { doc, ctx });
        self.paint_changed.load(Ordering::Acquire)
    }

    fn document_width(&self, doc: DocumentHandle) -> i32 {
        self.sizes.lock().unwrap().get(&doc).map_or(0, |s| s.0)
    }

    fn document_height(&self, doc: DocumentHandle) -> i32 {
        self.sizes.lock().unwrap().get(&doc).map_or(0, |s| s.1)
    }

    fn create_body(
        &self,
        doc: DocumentHandle,
        element: &str,
        _styles: &PropMap,
        _attrs: &PropMap,
        _events: &[String],
    ) {
        self.record(EngineCall::CreateBody { doc, element: element.to_owned() });
    }

    fn add_element(
        &self,
        doc: DocumentHandle,
        element: &str,
        _kind: &str,
        parent: &str,
        index: usize,
        _styles: &PropMap,
        _attrs: &PropMap,
        _events: &[String],
    ) {
        self.record(EngineCall::AddElement {
            doc,
            element: element.to_owned(),
            parent: parent.to_owned(),
            index,
        });
    }

    fn move_element(&self, doc: DocumentHandle, element: &str, parent: &str, index: usize) {
        self.record(EngineCall::MoveElement {
            doc,
            element: element.to_owned(),
            parent: parent.to_owned(),
            index,
        });
    }

    fn remove_element(&self, doc: DocumentHandle, element: &str) {
        self.record(EngineCall::RemoveElement { doc, element: element.to_owned() });
    }

    fn update_attrs(&self, doc: DocumentHandle, element: &str, _attrs: &PropMap) {
        self.record(EngineCall::UpdateAttrs { doc, element: element.to_owned() });
    }

    fn update_styles(&self, doc: DocumentHandle, element: &str, _styles: &PropMap) {
        self.record(EngineCall::UpdateStyles { doc, element: element.to_owned() });
    }

    fn add_event(&self, doc: DocumentHandle, element: &str, event: &str) {
        self.record(EngineCall::AddEvent {
            doc,
            element: element.to_owned(),
            event: event.to_owned(),
        });
    }

    fn remove_event(&self, doc: DocumentHandle, element: &str, event: &str) {
        self.record(EngineCall::RemoveEvent {
            doc,
            element: element.to_owned(),
            event: event.to_owned(),
        });
    }

    fn refresh_font(&self, doc: DocumentHandle, family: &str) {
        self.record(EngineCall::RefreshFont { doc, family: family.to_owned() });
    }

    fn add_font(&self, family: &str, path: &str) {
        self.record(EngineCall::AddFont { family: family.to_owned(), path: path.to_owned() });
    }

    fn has_font(&self, _family: &str, _path: &str) -> bool {
        false
    }

    fn hit_test(&self, doc: DocumentHandle, kind: HitTestKind, x: i32, y: i32) -> Option<String> {
        self.record(EngineCall::HitTest { doc, kind, x, y });
        self.hit_result.lock().unwrap().clone()
    }

    fn block_layout(&self, doc: DocumentHandle, element: &str, edge: BoxEdge) -> i32 {
        self.record(EngineCall::BlockLayout { doc, element: element.to_owned(), edge });
        let edges = *self.block_edges.lock().unwrap();
        match edge {
            BoxEdge::Left => edges[0],
            BoxEdge::Top => edges[1],
            BoxEdge::Width => edges[2],
            BoxEdge::Height => edges[3],
        }
    }

    fn attach_render_context(
        &self,
        surface: SurfaceId,
        width: u32,
        height: u32,
    ) -> RenderContextHandle {
        self.record(EngineCall::AttachContext { surface, width, height });
        RenderContextHandle::from_raw(self.next_raw())
    }

    fn resize_render_context(&self, ctx: RenderContextHandle, width: u32, height: u32) {
        self.record(EngineCall::ResizeContext { ctx, width, height });
    }

    fn clear_buffer(&self, ctx: RenderContextHandle) {
        self.record(EngineCall::ClearBuffer { ctx });
    }

    fn invalidate_render_context(&self, ctx: RenderContextHandle) {
        self.record(EngineCall::InvalidateContext { ctx });
    }

    fn swap_buffers(&self, ctx: RenderContextHandle) -> bool {
        self.record(EngineCall::SwapBuffers { ctx });
        true
    }

    fn detach_render_context(&self, ctx: RenderContextHandle, surface: SurfaceId) {
        self.record(EngineCall::DetachContext { ctx, surface });
    }
}
