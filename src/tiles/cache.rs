use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use super::TileKey;
use crate::bitmap::Bitmap;

/// Tile image store the renderer draws from.
///
/// Bitmaps are handed out as `Arc`s: the renderer holds its lease for the
/// duration of one draw call, so eviction by another thread never frees a
/// bitmap that is being drawn.
pub trait TileCache {
    /// The tile will be drawn this frame; keep it around.
    fn prefetch_hint(&self, key: TileKey);

    /// Returns the tile if resident, otherwise queues it for loading.
    /// Lower `priority` values load first.
    fn get_with_priority(&self, key: TileKey, priority: i64) -> Option<Arc<Bitmap>>;

    /// Returns the tile if resident without queuing anything.
    fn get_if_present(&self, key: TileKey) -> Option<Arc<Bitmap>>;

    fn cancel_pending_jobs(&self);

    fn set_capacity(&self, capacity: usize);
}

impl<T: TileCache + ?Sized> TileCache for Arc<T> {
    fn prefetch_hint(&self, key: TileKey) {
        (**self).prefetch_hint(key)
    }

    fn get_with_priority(&self, key: TileKey, priority: i64) -> Option<Arc<Bitmap>> {
        (**self).get_with_priority(key, priority)
    }

    fn get_if_present(&self, key: TileKey) -> Option<Arc<Bitmap>> {
        (**self).get_if_present(key)
    }

    fn cancel_pending_jobs(&self) {
        (**self).cancel_pending_jobs()
    }

    fn set_capacity(&self, capacity: usize) {
        (**self).set_capacity(capacity)
    }
}

#[derive(Debug)]
struct CacheEntry {
    bitmap: Arc<Bitmap>,
    last_used: u64,
}

#[derive(Debug)]
struct CacheInner {
    entries: HashMap<TileKey, CacheEntry>,
    pending: HashMap<TileKey, i64>,
    capacity: usize,
    clock: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &TileKey) -> Option<Arc<Bitmap>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            Arc::clone(&entry.bitmap)
        })
    }

    fn evict_to_capacity(&mut self) {
        if self.entries.len() <= self.capacity {
            return;
        }
        let mut by_age: Vec<(TileKey, u64)> = self
            .entries
            .iter()
            .map(|(key, entry)| (*key, entry.last_used))
            .collect();
        by_age.sort_by_key(|(_, last_used)| *last_used);
        let excess = self.entries.len() - self.capacity;
        for (key, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        trace!(target: "tiles", evicted = excess, "evicted least recently used tiles");
    }
}

/// In-memory LRU tile cache. Missing tiles requested with a priority are
/// collected as pending loads which a loader drains with
/// [`MemoryTileCache::take_pending`] and answers with [`MemoryTileCache::insert`].
#[derive(Debug)]
pub struct MemoryTileCache {
    inner: Mutex<CacheInner>,
}

impl MemoryTileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                pending: HashMap::new(),
                capacity: capacity.max(1),
                clock: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, key: TileKey, bitmap: Bitmap) {
        let mut inner = self.lock();
        inner.clock += 1;
        let last_used = inner.clock;
        inner.pending.remove(&key);
        inner.entries.insert(
            key,
            CacheEntry {
                bitmap: Arc::new(bitmap),
                last_used,
            },
        );
        inner.evict_to_capacity();
    }

    /// Drains pending loads, highest priority (lowest value) first.
    pub fn take_pending(&self) -> Vec<(TileKey, i64)> {
        let mut pending: Vec<(TileKey, i64)> = self.lock().pending.drain().collect();
        pending.sort_by_key(|(key, priority)| (*priority, *key));
        pending
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn contains(&self, key: TileKey) -> bool {
        self.lock().entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }
}

impl TileCache for MemoryTileCache {
    fn prefetch_hint(&self, key: TileKey) {
        self.lock().touch(&key);
    }

    fn get_with_priority(&self, key: TileKey, priority: i64) -> Option<Arc<Bitmap>> {
        let mut inner = self.lock();
        if let Some(bitmap) = inner.touch(&key) {
            return Some(bitmap);
        }
        let slot = inner.pending.entry(key).or_insert(priority);
        *slot = (*slot).min(priority);
        None
    }

    fn get_if_present(&self, key: TileKey) -> Option<Arc<Bitmap>> {
        self.lock().entries.get(&key).map(|entry| Arc::clone(&entry.bitmap))
    }

    fn cancel_pending_jobs(&self) {
        self.lock().pending.clear();
    }

    fn set_capacity(&self, capacity: usize) {
        let mut inner = self.lock();
        inner.capacity = capacity.max(1);
        debug!(target: "tiles", capacity = inner.capacity, "tile cache resized");
        inner.evict_to_capacity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32) -> TileKey {
        TileKey::new(3, x, 0)
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = MemoryTileCache::new(2);
        cache.insert(key(0), Bitmap::new(1, 1));
        cache.insert(key(1), Bitmap::new(1, 1));
        cache.prefetch_hint(key(0));
        cache.insert(key(2), Bitmap::new(1, 1));
        assert!(cache.contains(key(0)));
        assert!(!cache.contains(key(1)));
        assert!(cache.contains(key(2)));
    }

    #[test]
    fn lease_outlives_eviction() {
        let cache = MemoryTileCache::new(1);
        cache.insert(key(0), Bitmap::filled(1, 1, [1, 2, 3, 255]));
        let lease = cache.get_if_present(key(0)).unwrap();
        cache.insert(key(1), Bitmap::new(1, 1));
        assert!(!cache.contains(key(0)));
        assert_eq!(lease.pixel(0, 0), Some([1, 2, 3, 255]));
    }

    #[test]
    fn misses_queue_with_best_priority() {
        let cache = MemoryTileCache::new(4);
        assert!(cache.get_with_priority(key(0), 50).is_none());
        assert!(cache.get_with_priority(key(1), 10).is_none());
        assert!(cache.get_with_priority(key(0), 5).is_none());
        assert!(cache.get_if_present(key(2)).is_none());
        assert_eq!(cache.take_pending(), vec![(key(0), 5), (key(1), 10)]);
        assert_eq!(cache.pending(), 0);
    }

    #[test]
    fn cancel_drops_pending_and_insert_resolves_it() {
        let cache = MemoryTileCache::new(4);
        cache.get_with_priority(key(0), 1);
        cache.get_with_priority(key(1), 1);
        cache.insert(key(1), Bitmap::new(1, 1));
        assert_eq!(cache.pending(), 1);
        cache.cancel_pending_jobs();
        assert_eq!(cache.pending(), 0);
    }

    #[test]
    fn shrinking_capacity_evicts() {
        let cache = MemoryTileCache::new(8);
        for x in 0..8 {
            cache.insert(key(x), Bitmap::new(1, 1));
        }
        cache.set_capacity(3);
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(key(7)));
    }
}
