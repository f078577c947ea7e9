//! Host-facing callback seams.
//!
//! The pipeline never calls back into host UI code from its own workers
//! directly. Everything that must land on the host's UI thread goes
//! through a [`UiDispatcher`]; hosts with their own main loop implement
//! the trait, tests use [`UiInbox`].

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use docframe_cache::ImageResult;
use docframe_engine::DocumentKey;

/// Listener for UI events resolved against the document tree.
pub trait FrameEventListener: Send + Sync {
    /// A click resolved to an element. Coordinates are the element's
    /// screen-space block box. Delivered on the UI dispatcher.
    fn on_click(&self, element: &str, x: i32, y: i32, width: i32, height: i32);
}

/// Listener for laid-out document size changes.
pub trait SizeChangedListener: Send + Sync {
    fn on_size_changed(&self, width: i32, height: i32);
}

/// Listener for image-load completion.
///
/// Fires for real assets only, not placeholder variants. Delivered on
/// the UI dispatcher.
pub trait ImageLoadListener: Send + Sync {
    fn on_image_loaded(&self, element: &str, url: &str, success: bool);
}

/// Host-supplied image loader.
///
/// Called when the paint path needs an image that is not yet available.
/// The adapter fetches and decodes off the pipeline's workers, then
/// completes the result via `DocumentSession::complete_image`.
pub trait ImageAdapter: Send + Sync {
    fn load(&self, document: DocumentKey, result: Arc<ImageResult>);
}

/// Host callbacks for one document.
#[derive(Clone)]
pub struct FrameAdapter {
    /// Click listener, if the host wants resolved UI events.
    pub events: Option<Arc<dyn FrameEventListener>>,

    /// Size listener, if the host tracks the laid-out document size.
    pub size_changed: Option<Arc<dyn SizeChangedListener>>,

    /// Image-load listener, if the host tracks asset arrival.
    pub image_load: Option<Arc<dyn ImageLoadListener>>,

    /// Deliver size changes on the UI dispatcher (the default). Hosts
    /// that consume sizes on the mutation worker opt out via
    /// [`with_size_on_worker`](FrameAdapter::with_size_on_worker).
    /// Clicks and image loads always go through the dispatcher.
    pub deliver_size_on_ui: bool,
}

impl Default for FrameAdapter {
    fn default() -> Self {
        Self {
            events: None,
            size_changed: None,
            image_load: None,
            deliver_size_on_ui: true,
        }
    }
}

impl FrameAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the click listener.
    pub fn with_events(mut self, events: Arc<dyn FrameEventListener>) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the size listener.
    pub fn with_size_changed(mut self, listener: Arc<dyn SizeChangedListener>) -> Self {
        self.size_changed = Some(listener);
        self
    }

    /// Set the image-load listener.
    pub fn with_image_load(mut self, listener: Arc<dyn ImageLoadListener>) -> Self {
        self.image_load = Some(listener);
        self
    }

    /// Deliver size changes on the mutation worker instead of the UI
    /// dispatcher.
    pub fn with_size_on_worker(mut self) -> Self {
        self.deliver_size_on_ui = false;
        self
    }
}

/// Marshals closures onto the host's UI thread.
pub trait UiDispatcher: Send + Sync {
    fn post(&self, action: Box<dyn FnOnce() + Send>);
}

/// Sender half of a channel-backed [`UiDispatcher`].
///
/// For hosts (and tests) that pump their UI work from a loop they own:
/// the dispatcher posts into a channel and [`UiInbox::drain`] runs
/// whatever has accumulated.
///
/// # Example
///
/// ```
/// use docframe_core::{ChannelUiDispatcher, UiDispatcher};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let (dispatcher, inbox) = ChannelUiDispatcher::new();
/// let ran = Arc::new(AtomicBool::new(false));
///
/// let ran_clone = ran.clone();
/// dispatcher.post(Box::new(move || {
///     ran_clone.store(true, Ordering::SeqCst);
/// }));
///
/// assert_eq!(inbox.drain(), 1);
/// assert!(ran.load(Ordering::SeqCst));
/// ```
pub struct ChannelUiDispatcher {
    tx: Mutex<Sender<Box<dyn FnOnce() + Send>>>,
}

impl ChannelUiDispatcher {
    /// Create a dispatcher and the inbox that drains it.
    pub fn new() -> (Arc<Self>, UiInbox) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(Self { tx: Mutex::new(tx) }),
            UiInbox { rx },
        )
    }
}

impl UiDispatcher for ChannelUiDispatcher {
    fn post(&self, action: Box<dyn FnOnce() + Send>) {
        // A dead inbox means the host loop is gone; drop the action.
        let _ = self.tx.lock().unwrap().send(action);
    }
}

/// Receiver half of a channel-backed [`UiDispatcher`].
pub struct UiInbox {
    rx: Receiver<Box<dyn FnOnce() + Send>>,
}

impl UiInbox {
    /// Run every action currently queued. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(action) => {
                    action();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Block until one action arrives and run it. Returns `false` when
    /// the dispatcher side is gone.
    pub fn run_one(&self) -> bool {
        match self.rx.recv() {
            Ok(action) => {
                action();
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_adapter_delivers_sizes_on_ui_by_default() {
        let adapter = FrameAdapter::new();
        assert!(adapter.deliver_size_on_ui);
        assert!(!adapter.with_size_on_worker().deliver_size_on_ui);
    }

    #[test]
    fn test_drain_runs_in_post_order() {
        let (dispatcher, inbox) = ChannelUiDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            dispatcher.post(Box::new(move || order.lock().unwrap().push(i)));
        }

        assert_eq!(inbox.drain(), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_drain_empty_inbox() {
        let (_dispatcher, inbox) = ChannelUiDispatcher::new();
        assert_eq!(inbox.drain(), 0);
    }

    #[test]
    fn test_post_after_inbox_dropped_is_silent() {
        let (dispatcher, inbox) = ChannelUiDispatcher::new();
        drop(inbox);
        dispatcher.post(Box::new(|| {}));
    }

    #[test]
    fn test_dispatch_from_another_thread() {
        let (dispatcher, inbox) = ChannelUiDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let dispatcher_clone = dispatcher.clone();
        std::thread::spawn(move || {
            dispatcher_clone.post(Box::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }));
        })
        .join()
        .unwrap();

        assert_eq!(inbox.drain(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
