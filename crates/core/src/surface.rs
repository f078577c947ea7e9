//! GPU surface session.
//!
//! Each host surface gets its own [`SurfaceSession`] with a dedicated
//! worker thread. The native render context has hard thread affinity:
//! every context call runs on that worker, asserted at each call site.
//! Attach and detach coordinate with the process-wide throttling counters
//! in [`RenderStats`](crate::RenderStats).

use std::sync::{Arc, Mutex, Weak};

use docframe_engine::{RenderContextHandle, RenderEngine, SurfaceId};
use docframe_scheduler::{ActionWorker, CompletionLatch, DestroyFlag};

use crate::config::RenderConfig;
use crate::session::DocumentSession;
use crate::stats::RenderStats;

/// One GPU-bound surface of one document.
///
/// Holds the render context handle, doubling as the paint/present lock:
/// the context is only ever touched from this session's worker. The
/// document is held weakly so a surface outliving its document (a late
/// present after destroy) upgrades to nothing instead of keeping the
/// session alive.
pub struct SurfaceSession {
    surface: SurfaceId,
    document: Weak<DocumentSession>,
    worker: Arc<ActionWorker>,
    context: Mutex<RenderContextHandle>,
    destroy: DestroyFlag,
    engine: Arc<dyn RenderEngine>,
    stats: Arc<RenderStats>,
    config: RenderConfig,
    size: Mutex<(u32, u32)>,
}

impl SurfaceSession {
    pub(crate) fn new(document: &Arc<DocumentSession>, surface: SurfaceId) -> Arc<Self> {
        let worker = Arc::new(ActionWorker::spawn(&format!(
            "docframe-surface-{}",
            document.key()
        )));
        Arc::new(Self {
            surface,
            document: Arc::downgrade(document),
            worker,
            context: Mutex::new(RenderContextHandle::NULL),
            destroy: DestroyFlag::new(),
            engine: document.engine().clone(),
            stats: document.stats().clone(),
            config: document.config().clone(),
            size: Mutex::new((0, 0)),
        })
    }

    /// The host surface this session renders to.
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Whether a render context is currently attached.
    pub fn is_attached(&self) -> bool {
        !self.context().is_null()
    }

    /// Current surface dimensions.
    pub fn size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    pub(crate) fn context(&self) -> RenderContextHandle {
        *self.context.lock().unwrap()
    }

    /// Attach a render context on the surface worker.
    ///
    /// Waits (bounded) first when the process-wide attach backlog is at
    /// its ceiling, then posts the attach ahead of anything queued. The
    /// attach slot is held by a guard inside the posted action, so a
    /// discarded action still releases it. When detach churn is high the
    /// caller additionally waits, bounded, for the attach to finish.
    pub(crate) fn attach(self: &Arc<Self>, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
        self.stats.wait_if_attach_backlog_exceeds();
        let slot = self.stats.begin_attach();
        let gated = self.stats.churn_exceeded();
        let latch = Arc::new(CompletionLatch::new());

        let this = self.clone();
        let task_latch = latch.clone();
        self.worker.post_front(move || {
            let _slot = slot;
            this.run_attach(width, height);
            task_latch.signal();
        });

        if gated {
            latch.wait_timeout(self.config.attach_wait_timeout);
        }
    }

    fn run_attach(&self, width: u32, height: u32) {
        self.assert_worker();
        if self.destroy.is_destroyed() {
            return;
        }
        let ctx = self.engine.attach_render_context(self.surface, width, height);
        *self.context.lock().unwrap() = ctx;
        tracing::debug!(surface = self.surface.0, "render context attached");
        if self.destroy.is_destroyed() {
            return;
        }
        self.engine.clear_buffer(ctx);
        if self.destroy.is_destroyed() {
            return;
        }
        self.engine.swap_buffers(ctx);
        if let Some(document) = self.document.upgrade() {
            if !document.is_destroyed() {
                document.request_immediate();
            }
        }
    }

    /// Resize the render context on the surface worker.
    pub(crate) fn resize(self: &Arc<Self>, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
        let this = self.clone();
        self.worker.post(move || this.run_resize(width, height));
    }

    fn run_resize(&self, width: u32, height: u32) {
        self.assert_worker();
        if self.destroy.is_destroyed() {
            return;
        }
        let ctx = self.context();
        if ctx.is_null() {
            return;
        }
        self.engine.resize_render_context(ctx, width, height);
        // One repaint/present cycle per swapchain buffer, so both carry
        // the new dimensions before the next real frame.
        for _ in 0..2 {
            if self.destroy.is_destroyed() {
                return;
            }
            self.engine.invalidate_render_context(ctx);
            if self.destroy.is_destroyed() {
                return;
            }
            self.engine.swap_buffers(ctx);
        }
        if let Some(document) = self.document.upgrade() {
            document.request_frame();
        }
    }

    /// Repaint and present the current content on the surface worker.
    pub(crate) fn present(self: &Arc<Self>) {
        let this = self.clone();
        self.worker.post(move || this.run_present());
    }

    fn run_present(&self) {
        self.assert_worker();
        if self.destroy.is_destroyed() {
            return;
        }
        let ctx = self.context();
        if ctx.is_null() {
            return;
        }
        self.engine.invalidate_render_context(ctx);
        if self.destroy.is_destroyed() {
            return;
        }
        self.engine.swap_buffers(ctx);
    }

    /// Detach the render context and retire the worker.
    ///
    /// Marks the surface destroyed first (queued presents degrade to
    /// no-ops), waits bounded for the detach to run, then joins the
    /// worker thread.
    pub(crate) fn detach(self: &Arc<Self>) {
        self.destroy.mark_destroyed();
        let latch = Arc::new(CompletionLatch::new());
        let this = self.clone();
        let task_latch = latch.clone();
        self.worker.post(move || {
            this.run_detach();
            task_latch.signal();
        });
        latch.wait_timeout(self.config.detach_wait_timeout);
        self.worker.shutdown();
    }

    fn run_detach(&self) {
        self.assert_worker();
        let ctx = {
            let mut context = self.context.lock().unwrap();
            std::mem::replace(&mut *context, RenderContextHandle::NULL)
        };
        if ctx.is_null() {
            return;
        }
        self.engine.detach_render_context(ctx, self.surface);
        tracing::debug!(surface = self.surface.0, "render context detached");
    }

    fn assert_worker(&self) {
        assert!(
            self.worker.is_current(),
            "render context touched off its surface worker"
        );
    }
}
