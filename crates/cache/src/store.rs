//! LRU store of paused documents' image results.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use docframe_engine::DocumentKey;

use crate::image::ImageMap;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of documents currently in cache
    pub document_count: usize,

    /// Maximum number of documents allowed
    pub capacity: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of documents evicted due to capacity pressure
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Internal cache state
struct CacheState {
    /// Map from document key to its image results
    entries: HashMap<DocumentKey, ImageMap>,

    /// LRU queue (most recently used at back, least recently used at front)
    lru_queue: VecDeque<DocumentKey>,

    /// Statistics
    stats: CacheStats,
}

impl CacheState {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            stats: CacheStats {
                capacity,
                ..Default::default()
            },
        }
    }

    /// Move a key to the back of the LRU queue (mark as most recently used)
    fn touch(&mut self, key: DocumentKey) {
        self.lru_queue.retain(|&k| k != key);
        self.lru_queue.push_back(key);
    }

    /// Evict the least recently used document
    fn evict_lru(&mut self) {
        if let Some(key) = self.lru_queue.pop_front() {
            if self.entries.remove(&key).is_some() {
                self.stats.evictions += 1;
                self.stats.document_count = self.entries.len();
                tracing::debug!(document = %key, "evicted paused document images");
            }
        }
    }
}

/// LRU cache of paused documents' image-result maps.
///
/// Capacity is counted in documents, not bytes: each entry is one
/// document's entire [`ImageMap`], flushed in on pause and taken back out
/// on resume. When a new entry would exceed capacity the least recently
/// paused document's images are dropped.
///
/// Thread-safe; pause runs on the mutation worker while destroy and
/// low-memory pressure arrive from host threads.
///
/// # Example
///
/// ```
/// use docframe_cache::ImageResultCache;
/// use docframe_engine::DocumentKey;
/// use std::collections::HashMap;
///
/// let cache = ImageResultCache::new(512);
/// cache.put(DocumentKey(7), HashMap::new());
///
/// assert!(cache.take(DocumentKey(7)).is_some());
/// assert!(cache.take(DocumentKey(7)).is_none());
/// ```
pub struct ImageResultCache {
    state: Mutex<CacheState>,
}

impl ImageResultCache {
    /// Create a cache holding at most `capacity` documents.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::new(capacity)),
        }
    }

    /// Store a paused document's image results.
    ///
    /// Replaces any existing entry for the same document. Evicts the
    /// least recently used entries when over capacity.
    pub fn put(&self, key: DocumentKey, images: ImageMap) {
        let mut state = self.state.lock().unwrap();
        state.entries.insert(key, images);
        state.touch(key);
        while state.entries.len() > state.stats.capacity {
            state.evict_lru();
        }
        state.stats.document_count = state.entries.len();
    }

    /// Take a document's image results back out of the cache.
    ///
    /// Removes the entry; a second take for the same document misses.
    pub fn take(&self, key: DocumentKey) -> Option<ImageMap> {
        let mut state = self.state.lock().unwrap();
        let entry = state.entries.remove(&key);
        state.lru_queue.retain(|&k| k != key);
        match entry {
            Some(images) => {
                state.stats.hits += 1;
                state.stats.document_count = state.entries.len();
                Some(images)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Drop a document's entry without counting a hit or miss.
    ///
    /// Used when the document is destroyed while paused.
    pub fn remove(&self, key: DocumentKey) {
        let mut state = self.state.lock().unwrap();
        state.entries.remove(&key);
        state.lru_queue.retain(|&k| k != key);
        state.stats.document_count = state.entries.len();
    }

    /// Drop every entry. Used under memory pressure.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        let dropped = state.entries.len();
        state.entries.clear();
        state.lru_queue.clear();
        state.stats.document_count = 0;
        if dropped > 0 {
            tracing::debug!(dropped, "cleared paused image cache");
        }
    }

    /// Number of documents currently cached.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().unwrap().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageKey, ImageResult};
    use std::sync::Arc;

    fn one_image_map(url: &str) -> ImageMap {
        let key = ImageKey::new(url, 8, 8, false);
        let mut map = ImageMap::new();
        map.insert(key.clone(), Arc::new(ImageResult::loading("img", key)));
        map
    }

    #[test]
    fn test_put_take_round_trip() {
        let cache = ImageResultCache::new(4);
        cache.put(DocumentKey(1), one_image_map("a"));

        let images = cache.take(DocumentKey(1)).unwrap();
        assert_eq!(images.len(), 1);
        assert!(cache.take(DocumentKey(1)).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_evicts_least_recently_paused() {
        let cache = ImageResultCache::new(2);
        cache.put(DocumentKey(1), one_image_map("a"));
        cache.put(DocumentKey(2), one_image_map("b"));
        cache.put(DocumentKey(3), one_image_map("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.take(DocumentKey(1)).is_none());
        assert!(cache.take(DocumentKey(2)).is_some());
        assert!(cache.take(DocumentKey(3)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_repause_refreshes_lru_position() {
        let cache = ImageResultCache::new(2);
        cache.put(DocumentKey(1), one_image_map("a"));
        cache.put(DocumentKey(2), one_image_map("b"));
        // Re-pausing document 1 makes document 2 the eviction candidate.
        cache.put(DocumentKey(1), one_image_map("a2"));
        cache.put(DocumentKey(3), one_image_map("c"));

        assert!(cache.take(DocumentKey(2)).is_none());
        assert!(cache.take(DocumentKey(1)).is_some());
    }

    #[test]
    fn test_remove_counts_no_miss() {
        let cache = ImageResultCache::new(2);
        cache.put(DocumentKey(1), one_image_map("a"));
        cache.remove(DocumentKey(1));
        cache.remove(DocumentKey(99));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_drops_everything() {
        let cache = ImageResultCache::new(8);
        cache.put(DocumentKey(1), one_image_map("a"));
        cache.put(DocumentKey(2), one_image_map("b"));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.take(DocumentKey(1)).is_none());
    }
}
