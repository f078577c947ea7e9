//! Docframe Cache Library
//!
//! Image-result retention for paused documents.
//!
//! When a document's surface goes away (the host view is scrolled off
//! screen or its activity is backgrounded), the decoded image results that
//! belong to the document would otherwise be lost and re-fetched on every
//! resume. This crate provides [`ImageResultCache`], an LRU store that
//! holds each paused document's image-result map by [`DocumentKey`] until
//! the document resumes, is destroyed, or the entry is evicted.
//!
//! # Example
//!
//! ```
//! use docframe_cache::{ImageKey, ImageResult, ImageResultCache};
//! use docframe_engine::DocumentKey;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let cache = ImageResultCache::new(512);
//!
//! // Pause flushes a document's image results into the cache...
//! let key = ImageKey::new("https://example.com/a.png", 64, 64, false);
//! let mut images = HashMap::new();
//! images.insert(key.clone(), Arc::new(ImageResult::loading("img-1", key)));
//! cache.put(DocumentKey(1), images);
//!
//! // ...and resume takes them back.
//! let restored = cache.take(DocumentKey(1)).unwrap();
//! assert_eq!(restored.len(), 1);
//! ```

mod image;
mod store;

// Re-export public API
pub use image::{Bitmap, ImageKey, ImageLoadState, ImageMap, ImageResult};
pub use store::{CacheStats, ImageResultCache};
