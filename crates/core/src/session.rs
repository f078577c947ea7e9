//! Per-document rendering session.
//!
//! A [`DocumentSession`] owns one logical document end to end: its native
//! document handle, its live image results, the frame pacer that coalesces
//! its repaints, and (while a surface is attached) its
//! [`SurfaceSession`]. All tree mutations are posted to the shared
//! mutation worker and run strictly in submission order, so the host can
//! fire-and-forget from any thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use docframe_cache::{Bitmap, ImageKey, ImageMap, ImageResult, ImageResultCache};
use docframe_engine::{
    DocumentHandle, DocumentKey, HitTestKind, PropMap, RenderEngine, SurfaceId,
};
use docframe_scheduler::{ActionWorker, DestroyFlag, FramePacer, FrameTick};

use crate::actions::{self, MutationAction};
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::events::{FrameAdapter, ImageAdapter, UiDispatcher};
use crate::registry::{DocumentRegistry, HostScope};
use crate::stats::RenderStats;
use crate::surface::SurfaceSession;

/// Owned native document handle. Releases the native side on drop, so a
/// handle can never outlive the session state that holds it.
pub(crate) struct NativeDocument {
    handle: DocumentHandle,
    engine: Arc<dyn RenderEngine>,
}

impl NativeDocument {
    pub(crate) fn create(engine: Arc<dyn RenderEngine>, key: DocumentKey) -> Self {
        let handle = engine.create_document(key);
        Self { handle, engine }
    }

    pub(crate) fn handle(&self) -> DocumentHandle {
        self.handle
    }
}

impl Drop for NativeDocument {
    fn drop(&mut self) {
        self.engine.destroy_document(self.handle);
    }
}

/// Where a document is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created, no surface yet.
    Created,

    /// A surface is attached and frames are flowing.
    Active,

    /// No surface; mutations accumulate, paints are suppressed.
    Paused,

    /// Destroyed. Every further operation is a no-op.
    Destroyed,
}

struct SessionState {
    native: Option<NativeDocument>,
    renderer: Option<Arc<SurfaceSession>>,
    width: i32,
    height: i32,
}

/// Everything a session borrows from its runtime.
pub(crate) struct SessionContext {
    pub(crate) engine: Arc<dyn RenderEngine>,
    pub(crate) config: RenderConfig,
    pub(crate) worker: Arc<ActionWorker>,
    pub(crate) ui: Arc<dyn UiDispatcher>,
    pub(crate) registry: Arc<DocumentRegistry>,
    pub(crate) stats: Arc<RenderStats>,
    pub(crate) cache: Arc<ImageResultCache>,
    pub(crate) image_adapter: Option<Arc<dyn ImageAdapter>>,
}

/// One logical document in the rendering pipeline.
///
/// Created through [`RenderRuntime::create_session`](crate::RenderRuntime::create_session).
/// Sessions start paused; the first
/// [`surface_available`](DocumentSession::surface_available) resumes them.
pub struct DocumentSession {
    key: DocumentKey,
    scope: HostScope,
    engine: Arc<dyn RenderEngine>,
    config: RenderConfig,
    worker: Arc<ActionWorker>,
    ui: Arc<dyn UiDispatcher>,
    pacer: Arc<FramePacer>,
    destroy: DestroyFlag,
    paused: AtomicBool,
    state: Mutex<SessionState>,
    images: Mutex<ImageMap>,
    adapter: Mutex<FrameAdapter>,
    image_adapter: Option<Arc<dyn ImageAdapter>>,
    registry: Arc<DocumentRegistry>,
    stats: Arc<RenderStats>,
    cache: Arc<ImageResultCache>,
}

impl DocumentSession {
    pub(crate) fn new(key: DocumentKey, scope: HostScope, ctx: SessionContext) -> Arc<Self> {
        let pacer = Arc::new(FramePacer::new(ctx.worker.clone(), ctx.config.frame_interval));
        let session = Arc::new(Self {
            key,
            scope,
            engine: ctx.engine,
            config: ctx.config,
            worker: ctx.worker,
            ui: ctx.ui,
            pacer: pacer.clone(),
            destroy: DestroyFlag::new(),
            paused: AtomicBool::new(true),
            state: Mutex::new(SessionState {
                native: None,
                renderer: None,
                width: 0,
                height: 0,
            }),
            images: Mutex::new(ImageMap::new()),
            adapter: Mutex::new(FrameAdapter::default()),
            image_adapter: ctx.image_adapter,
            registry: ctx.registry,
            stats: ctx.stats,
            cache: ctx.cache,
        });
        let listener: Weak<DocumentSession> = Arc::downgrade(&session);
        pacer.set_listener(listener);
        session
    }

    /// The document's process-unique key.
    pub fn key(&self) -> DocumentKey {
        self.key
    }

    /// The host container this document lives in.
    pub fn scope(&self) -> HostScope {
        self.scope
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.destroy.is_destroyed() {
            Lifecycle::Destroyed
        } else if self.is_paused() {
            Lifecycle::Paused
        } else if self.state.lock().unwrap().renderer.is_some() {
            Lifecycle::Active
        } else {
            Lifecycle::Created
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroy.is_destroyed()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Install the host callbacks for this document.
    pub fn set_adapter(&self, adapter: FrameAdapter) {
        *self.adapter.lock().unwrap() = adapter;
    }

    /// The laid-out document size from the last frame.
    pub fn document_size(&self) -> Result<(i32, i32)> {
        if self.destroy.is_destroyed() {
            return Err(RenderError::Destroyed(self.key));
        }
        let state = self.state.lock().unwrap();
        if state.native.is_none() {
            return Err(RenderError::NoNativeDocument(self.key));
        }
        Ok((state.width, state.height))
    }

    /// The surface this document currently presents to.
    pub fn presented_surface(&self) -> Result<SurfaceId> {
        if self.destroy.is_destroyed() {
            return Err(RenderError::Destroyed(self.key));
        }
        match &self.state.lock().unwrap().renderer {
            Some(renderer) => Ok(renderer.surface()),
            None => Err(RenderError::NoSurface(self.key)),
        }
    }

    // -- tree mutation -------------------------------------------------------

    /// Create (or recreate) the document's body.
    ///
    /// Recreating replaces the native document wholesale: the old handle
    /// is released and the live image results are dropped before the new
    /// tree is built.
    pub fn create_body(
        self: &Arc<Self>,
        element: &str,
        styles: PropMap,
        attrs: PropMap,
        events: Vec<String>,
    ) {
        self.post_action(MutationAction::CreateBody {
            element: element.to_owned(),
            styles,
            attrs,
            events,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_element(
        self: &Arc<Self>,
        element: &str,
        kind: &str,
        parent: &str,
        index: usize,
        styles: PropMap,
        attrs: PropMap,
        events: Vec<String>,
    ) {
        self.post_action(MutationAction::AddElement {
            element: element.to_owned(),
            kind: kind.to_owned(),
            parent: parent.to_owned(),
            index,
            styles,
            attrs,
            events,
        });
    }

    pub fn move_element(self: &Arc<Self>, element: &str, parent: &str, index: usize) {
        self.post_action(MutationAction::MoveElement {
            element: element.to_owned(),
            parent: parent.to_owned(),
            index,
        });
    }

    pub fn remove_element(self: &Arc<Self>, element: &str) {
        self.post_action(MutationAction::RemoveElement {
            element: element.to_owned(),
        });
    }

    pub fn update_attrs(self: &Arc<Self>, element: &str, attrs: PropMap) {
        self.post_action(MutationAction::UpdateAttrs {
            element: element.to_owned(),
            attrs,
        });
    }

    pub fn update_styles(self: &Arc<Self>, element: &str, styles: PropMap) {
        self.post_action(MutationAction::UpdateStyles {
            element: element.to_owned(),
            styles,
        });
    }

    pub fn add_event(self: &Arc<Self>, element: &str, event: &str) {
        self.post_action(MutationAction::AddEvent {
            element: element.to_owned(),
            event: event.to_owned(),
        });
    }

    pub fn remove_event(self: &Arc<Self>, element: &str, event: &str) {
        self.post_action(MutationAction::RemoveEvent {
            element: element.to_owned(),
            event: event.to_owned(),
        });
    }

    /// Re-resolve a font family against the native font table. No-op on
    /// an empty family name.
    pub fn refresh_font(self: &Arc<Self>, family: &str) {
        if family.is_empty() {
            return;
        }
        self.post_action(MutationAction::RefreshFont {
            family: family.to_owned(),
        });
    }

    /// Resolve which element occupies a point.
    ///
    /// Click hits additionally resolve the element's block box and
    /// deliver [`FrameEventListener::on_click`](crate::FrameEventListener::on_click)
    /// through the UI dispatcher.
    pub fn hit_test(self: &Arc<Self>, kind: HitTestKind, x: i32, y: i32) {
        self.post_action(MutationAction::HitTest { kind, x, y });
    }

    fn post_action(self: &Arc<Self>, action: MutationAction) {
        if self.destroy.is_destroyed() {
            return;
        }
        let session = self.clone();
        self.worker.post(move || actions::execute(&session, action));
    }

    // -- frame pacing --------------------------------------------------------

    /// Request a repaint one frame interval from now. Coalesced.
    pub fn request_frame(&self) {
        self.pacer.request_frame();
    }

    /// Request a repaint ahead of everything already queued.
    pub fn request_immediate(&self) {
        self.pacer.request_immediate();
    }

    // -- pause / destroy -----------------------------------------------------

    /// Pause or resume the document.
    ///
    /// Pausing cancels any pending frame tick, releases the attached
    /// surface session, and flushes the live image results into the
    /// paused-document cache; resuming takes them back. A resumed
    /// document stays surface-less (nothing paints) until the host
    /// supplies a new surface via
    /// [`surface_available`](DocumentSession::surface_available).
    pub fn set_pause(&self, paused: bool) {
        let was = self.paused.swap(paused, Ordering::AcqRel);
        if was == paused {
            return;
        }
        if paused {
            self.pacer.cancel_pending();
            let renderer = self.state.lock().unwrap().renderer.take();
            if let Some(renderer) = renderer {
                renderer.detach();
            }
            let images = std::mem::take(&mut *self.images.lock().unwrap());
            if !images.is_empty() {
                self.cache.put(self.key, images);
            }
            tracing::debug!(document = %self.key, "paused");
        } else {
            if let Some(images) = self.cache.take(self.key) {
                *self.images.lock().unwrap() = images;
            }
            tracing::debug!(document = %self.key, "resumed");
        }
    }

    /// Destroy the document.
    ///
    /// Marks the session destroyed immediately (queued mutations degrade
    /// to no-ops), removes it from the registry and the paused-document
    /// cache, and posts the native teardown ahead of everything still
    /// queued. Idempotent.
    pub fn destroy(self: &Arc<Self>) {
        if self.destroy.is_destroyed() {
            return;
        }
        self.destroy.mark_destroyed();
        self.pacer.cancel_pending();
        self.registry.remove(self.key);
        self.cache.remove(self.key);
        let session = self.clone();
        self.worker.post_front(move || session.teardown());
    }

    fn teardown(&self) {
        let (native, renderer) = {
            let mut state = self.state.lock().unwrap();
            (state.native.take(), state.renderer.take())
        };
        self.images.lock().unwrap().clear();
        drop(native);
        if let Some(renderer) = renderer {
            renderer.detach();
        }
        tracing::debug!(document = %self.key, "destroyed");
    }

    // -- surface lifecycle ---------------------------------------------------

    /// A presentable surface became available for this document.
    ///
    /// Resumes the document, replaces any previous surface session, and
    /// attaches a GPU render context on the new surface's worker. When
    /// detach churn is high the call waits (bounded) for the attach to
    /// complete before returning.
    pub fn surface_available(self: &Arc<Self>, surface: SurfaceId, width: u32, height: u32) {
        if self.destroy.is_destroyed() {
            return;
        }
        self.set_pause(false);
        let old = self.state.lock().unwrap().renderer.take();
        if let Some(old) = old {
            old.detach();
        }
        let renderer = SurfaceSession::new(self, surface);
        self.state.lock().unwrap().renderer = Some(renderer.clone());
        renderer.attach(width, height);
    }

    /// The attached surface changed dimensions.
    pub fn surface_resized(&self, width: u32, height: u32) {
        let renderer = self.state.lock().unwrap().renderer.clone();
        if let Some(renderer) = renderer {
            renderer.resize(width, height);
        }
    }

    /// The attached surface is going away.
    ///
    /// Pauses the document and detaches the render context synchronously
    /// (bounded wait). Applies the churn throttle delay when surfaces are
    /// being torn down faster than the native layer keeps up.
    pub fn surface_destroyed(&self) {
        // Taken before the pause so the detach is counted into the churn
        // window; pausing detaches any renderer it still finds.
        let renderer = self.state.lock().unwrap().renderer.take();
        self.set_pause(true);
        if let Some(renderer) = renderer {
            renderer.detach();
            if let Some(delay) = self.stats.record_detach() {
                std::thread::sleep(delay);
            }
        }
    }

    // -- images --------------------------------------------------------------

    /// Resolve an image request, starting a load through the image
    /// adapter on first sight. Returns `None` on a destroyed document.
    pub fn resolve_image(
        self: &Arc<Self>,
        element: &str,
        url: &str,
        width: u32,
        height: u32,
        placeholder: bool,
    ) -> Option<Arc<ImageResult>> {
        if self.destroy.is_destroyed() {
            return None;
        }
        let key = ImageKey::new(url, width, height, placeholder);
        let (result, fresh) = {
            let mut images = self.images.lock().unwrap();
            match images.get(&key) {
                Some(result) => (result.clone(), false),
                None => {
                    let result = Arc::new(ImageResult::loading(element, key.clone()));
                    images.insert(key, result.clone());
                    (result, true)
                }
            }
        };
        if fresh {
            if let Some(adapter) = &self.image_adapter {
                adapter.load(self.key, result.clone());
            }
        }
        Some(result)
    }

    /// Complete an image load and schedule a repaint.
    ///
    /// `None` marks the load failed. First completion wins; late or
    /// duplicate completions are dropped, as are repaints for paused or
    /// destroyed documents. Real (non-placeholder) assets additionally
    /// notify the host's image-load listener on the UI dispatcher.
    pub fn complete_image(&self, result: &ImageResult, bitmap: Option<Arc<Bitmap>>) {
        let success = bitmap.is_some();
        let completed = match bitmap {
            Some(bitmap) => result.mark_loaded(bitmap),
            None => result.mark_failed(),
        };
        if !completed || self.destroy.is_destroyed() {
            return;
        }
        if success && !self.is_paused() {
            self.request_frame();
        }
        if result.key().placeholder {
            return;
        }
        let adapter = self.adapter.lock().unwrap().clone();
        if let Some(listener) = adapter.image_load {
            let element = result.element().to_owned();
            let url = result.key().url.clone();
            let destroy = self.destroy.clone();
            self.ui.post(Box::new(move || {
                if !destroy.is_destroyed() {
                    listener.on_image_loaded(&element, &url, success);
                }
            }));
        }
    }

    /// Drop the live image results. Used under memory pressure.
    pub fn clear_images(&self) {
        self.images.lock().unwrap().clear();
    }

    /// Number of live image results.
    pub fn image_count(&self) -> usize {
        self.images.lock().unwrap().len()
    }

    // -- internals shared with the action executor ---------------------------

    pub(crate) fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    pub(crate) fn stats(&self) -> &Arc<RenderStats> {
        &self.stats
    }

    pub(crate) fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub(crate) fn native_handle(&self) -> Option<DocumentHandle> {
        self.state.lock().unwrap().native.as_ref().map(|n| n.handle())
    }

    pub(crate) fn take_native(&self) -> Option<NativeDocument> {
        self.state.lock().unwrap().native.take()
    }

    pub(crate) fn install_native(&self, native: NativeDocument) {
        self.state.lock().unwrap().native = Some(native);
    }

    pub(crate) fn dispatch_click(&self, element: String, edges: [i32; 4]) {
        let adapter = self.adapter.lock().unwrap().clone();
        let Some(listener) = adapter.events else {
            return;
        };
        let destroy = self.destroy.clone();
        self.ui.post(Box::new(move || {
            if destroy.is_destroyed() {
                return;
            }
            listener.on_click(&element, edges[0], edges[1], edges[2], edges[3]);
        }));
    }

    fn refresh_document_size(&self, doc: DocumentHandle) {
        let width = self.engine.document_width(doc);
        let height = self.engine.document_height(doc);
        let changed = {
            let mut state = self.state.lock().unwrap();
            if state.width != width || state.height != height {
                state.width = width;
                state.height = height;
                true
            } else {
                false
            }
        };
        if !changed {
            return;
        }
        let adapter = self.adapter.lock().unwrap().clone();
        let Some(listener) = adapter.size_changed else {
            return;
        };
        if adapter.deliver_size_on_ui {
            let destroy = self.destroy.clone();
            self.ui.post(Box::new(move || {
                if !destroy.is_destroyed() {
                    listener.on_size_changed(width, height);
                }
            }));
        } else {
            listener.on_size_changed(width, height);
        }
    }
}

impl FrameTick for DocumentSession {
    /// One coalesced frame: layout, size bookkeeping, paint, and (when
    /// the paint changed anything) a present on the surface worker.
    /// Runs on the mutation worker.
    fn on_frame(&self) {
        if self.destroy.is_destroyed() || self.is_paused() {
            return;
        }
        let (doc, renderer) = {
            let state = self.state.lock().unwrap();
            match (&state.native, &state.renderer) {
                (Some(native), Some(renderer)) => (native.handle(), renderer.clone()),
                _ => return,
            }
        };
        self.engine.layout(doc);
        if self.destroy.is_destroyed() {
            return;
        }
        self.refresh_document_size(doc);
        let ctx = renderer.context();
        if ctx.is_null() {
            return;
        }
        let changed = self.engine.paint(doc, ctx);
        if changed && !self.destroy.is_destroyed() {
            renderer.present();
        }
    }
}
