//! Image results and their identity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Decoded pixel data for one image (RGBA format).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Raw pixel data (RGBA format)
    pub pixels: Vec<u8>,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,
}

impl Bitmap {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Memory size of the pixel data in bytes.
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Identity of one image request within a document.
///
/// The same URL decoded at two different target sizes, or as a placeholder
/// versus the real asset, is a different image as far as the native paint
/// path is concerned, so all four fields participate in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    /// Source URL of the image
    pub url: String,

    /// Requested decode width in pixels
    pub width: u32,

    /// Requested decode height in pixels
    pub height: u32,

    /// Whether this is the placeholder variant of the request
    pub placeholder: bool,
}

impl ImageKey {
    pub fn new(url: &str, width: u32, height: u32, placeholder: bool) -> Self {
        Self {
            url: url.to_owned(),
            width,
            height,
            placeholder,
        }
    }
}

/// Load state of one image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLoadState {
    /// Fetch/decode is in flight.
    Loading,

    /// Decode finished; the bitmap is available.
    Loaded,

    /// Fetch or decode failed; no bitmap will arrive.
    Failed,
}

struct ImageInner {
    state: ImageLoadState,
    bitmap: Option<Arc<Bitmap>>,
}

/// One image request and its (eventually) decoded result.
///
/// Created in the `Loading` state when the paint path first asks for the
/// image, then completed exactly once by the host's decode callback.
/// Results are shared as `Arc<ImageResult>` between the owning document
/// and the paused-document cache, so completion is interior-mutable.
pub struct ImageResult {
    element: String,
    key: ImageKey,
    inner: Mutex<ImageInner>,
}

impl ImageResult {
    /// Create a result in the `Loading` state for the given element ref.
    pub fn loading(element: &str, key: ImageKey) -> Self {
        Self {
            element: element.to_owned(),
            key,
            inner: Mutex::new(ImageInner {
                state: ImageLoadState::Loading,
                bitmap: None,
            }),
        }
    }

    /// The element ref this image belongs to.
    pub fn element(&self) -> &str {
        &self.element
    }

    /// The request identity.
    pub fn key(&self) -> &ImageKey {
        &self.key
    }

    /// Current load state.
    pub fn state(&self) -> ImageLoadState {
        self.inner.lock().unwrap().state
    }

    /// The decoded bitmap, if loading has succeeded.
    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        self.inner.lock().unwrap().bitmap.clone()
    }

    /// Complete the request with a decoded bitmap.
    ///
    /// Returns `false` if the request was already completed; the first
    /// completion wins.
    pub fn mark_loaded(&self, bitmap: Arc<Bitmap>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != ImageLoadState::Loading {
            return false;
        }
        inner.state = ImageLoadState::Loaded;
        inner.bitmap = Some(bitmap);
        true
    }

    /// Complete the request as failed.
    ///
    /// Returns `false` if the request was already completed.
    pub fn mark_failed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != ImageLoadState::Loading {
            return false;
        }
        inner.state = ImageLoadState::Failed;
        true
    }
}

/// All image results of one document, by request identity.
pub type ImageMap = HashMap<ImageKey, Arc<ImageResult>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_identity_includes_size_and_placeholder() {
        let a = ImageKey::new("u", 10, 10, false);
        let b = ImageKey::new("u", 10, 10, true);
        let c = ImageKey::new("u", 20, 10, false);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, ImageKey::new("u", 10, 10, false));
    }

    #[test]
    fn test_result_lifecycle() {
        let result = ImageResult::loading("img-1", ImageKey::new("u", 4, 4, false));
        assert_eq!(result.state(), ImageLoadState::Loading);
        assert!(result.bitmap().is_none());

        let bitmap = Arc::new(Bitmap::new(vec![0; 4 * 4 * 4], 4, 4));
        assert!(result.mark_loaded(bitmap));
        assert_eq!(result.state(), ImageLoadState::Loaded);
        assert_eq!(result.bitmap().unwrap().memory_size(), 64);
    }

    #[test]
    fn test_first_completion_wins() {
        let result = ImageResult::loading("img-1", ImageKey::new("u", 1, 1, false));
        assert!(result.mark_failed());
        assert!(!result.mark_loaded(Arc::new(Bitmap::new(vec![0; 4], 1, 1))));
        assert_eq!(result.state(), ImageLoadState::Failed);
        assert!(result.bitmap().is_none());
    }
}
