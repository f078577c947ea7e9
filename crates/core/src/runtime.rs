//! Pipeline entry point.
//!
//! A [`RenderRuntime`] is the one object a host embeds: it owns the
//! shared mutation worker, the document registry, the throttling
//! counters, and the paused-document image cache, and it mints document
//! sessions. Hosts create exactly one runtime per process and hand it
//! their engine binding and UI dispatcher; nothing in the pipeline is a
//! global.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docframe_cache::ImageResultCache;
use docframe_engine::{DocumentKey, RenderEngine};
use docframe_scheduler::{ActionWorker, CompletionLatch};

use crate::config::RenderConfig;
use crate::events::{ImageAdapter, UiDispatcher};
use crate::registry::{DocumentRegistry, HostScope};
use crate::session::{DocumentSession, SessionContext};
use crate::stats::RenderStats;

/// The rendering pipeline for one process.
///
/// # Example
///
/// ```
/// use docframe_core::{ChannelUiDispatcher, HostScope, RenderConfig, RenderRuntime};
/// use docframe_engine::MockEngine;
/// use std::sync::Arc;
///
/// let (ui, _inbox) = ChannelUiDispatcher::new();
/// let runtime = RenderRuntime::new(Arc::new(MockEngine::new()), ui, RenderConfig::default());
///
/// let session = runtime.create_session(HostScope(1));
/// session.create_body("root", Default::default(), Default::default(), vec![]);
///
/// runtime.shutdown();
/// ```
pub struct RenderRuntime {
    engine: Arc<dyn RenderEngine>,
    config: RenderConfig,
    worker: Arc<ActionWorker>,
    ui: Arc<dyn UiDispatcher>,
    registry: Arc<DocumentRegistry>,
    stats: Arc<RenderStats>,
    cache: Arc<ImageResultCache>,
    image_adapter: Option<Arc<dyn ImageAdapter>>,
    next_key: AtomicU64,
}

impl RenderRuntime {
    /// Create a runtime around a native engine binding.
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        ui: Arc<dyn UiDispatcher>,
        config: RenderConfig,
    ) -> Self {
        let stats = Arc::new(RenderStats::new(&config));
        let cache = Arc::new(ImageResultCache::new(config.image_cache_capacity));
        tracing::info!("render runtime starting");
        Self {
            engine,
            worker: Arc::new(ActionWorker::spawn("docframe-mutation")),
            ui,
            registry: Arc::new(DocumentRegistry::new()),
            stats,
            cache,
            image_adapter: None,
            next_key: AtomicU64::new(1),
            config,
        }
    }

    /// Install the host's image loader.
    pub fn with_image_adapter(mut self, adapter: Arc<dyn ImageAdapter>) -> Self {
        self.image_adapter = Some(adapter);
        self
    }

    /// Create a document session under a host scope.
    ///
    /// Keys come from a monotonic counter and are never reused.
    pub fn create_session(&self, scope: HostScope) -> Arc<DocumentSession> {
        let key = DocumentKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        let session = DocumentSession::new(
            key,
            scope,
            SessionContext {
                engine: self.engine.clone(),
                config: self.config.clone(),
                worker: self.worker.clone(),
                ui: self.ui.clone(),
                registry: self.registry.clone(),
                stats: self.stats.clone(),
                cache: self.cache.clone(),
                image_adapter: self.image_adapter.clone(),
            },
        );
        self.registry.insert(&session);
        tracing::debug!(document = %key, scope = scope.0, "session created");
        session
    }

    /// Look up a live session by key.
    pub fn session(&self, key: DocumentKey) -> Option<Arc<DocumentSession>> {
        self.registry.get(key)
    }

    // -- host lifecycle fan-out ----------------------------------------------

    /// The host container came back to the foreground: repaint every
    /// document in its scope.
    pub fn on_host_resumed(&self, scope: HostScope) {
        for session in self.registry.live_sessions_in(scope) {
            session.request_frame();
        }
    }

    /// The host container is going away: destroy every document in its
    /// scope.
    pub fn on_host_destroyed(&self, scope: HostScope) {
        for session in self.registry.live_sessions_in(scope) {
            session.destroy();
        }
    }

    /// The platform reported memory pressure: drop all retained image
    /// results, cached and live.
    pub fn on_low_memory(&self) {
        self.cache.clear();
        for session in self.registry.live_sessions() {
            session.clear_images();
        }
    }

    // -- fonts ---------------------------------------------------------------

    /// Register a font file and re-resolve it in every live document.
    ///
    /// No-op when the family/path pair is already registered. The
    /// registration and the per-document refresh all run on the mutation
    /// worker, serialized with any queued mutations.
    pub fn add_font(&self, family: &str, path: &str) {
        if self.engine.has_font(family, path) {
            return;
        }
        let engine = self.engine.clone();
        let registry = self.registry.clone();
        let family = family.to_owned();
        let path = path.to_owned();
        self.worker.post(move || {
            engine.add_font(&family, &path);
            for session in registry.live_sessions() {
                session.refresh_font(&family);
            }
        });
    }

    // -- observability and teardown ------------------------------------------

    /// Throttling counters shared by every surface.
    pub fn stats(&self) -> &Arc<RenderStats> {
        &self.stats
    }

    /// The paused-document image cache.
    pub fn image_cache(&self) -> &Arc<ImageResultCache> {
        &self.cache
    }

    /// The active configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Number of registered documents.
    pub fn document_count(&self) -> usize {
        self.registry.len()
    }

    /// Wait until everything queued on the mutation worker so far has
    /// run. Returns `false` if the deadline passed first.
    pub fn drain(&self, timeout: Duration) -> bool {
        let latch = Arc::new(CompletionLatch::new());
        let task_latch = latch.clone();
        self.worker.post(move || task_latch.signal());
        latch.wait_timeout(timeout)
    }

    /// Destroy every document and retire the mutation worker.
    pub fn shutdown(&self) {
        for session in self.registry.live_sessions() {
            session.destroy();
        }
        self.drain(Duration::from_secs(1));
        self.worker.shutdown();
        tracing::info!("render runtime stopped");
    }
}
