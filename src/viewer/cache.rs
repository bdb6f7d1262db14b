//! Bounded set of pages whose content is materialized

use lru::LruCache;

/// Insertion-ordered page set
///
/// Eviction takes the oldest insertion. Looking a page up never promotes
/// it; only [`PageCache::insert`] moves a page to the young end. The set is
/// allowed to grow past capacity until [`PageCache::pop_oldest`] is used to
/// prune it, so the caller can reset each evicted page.
pub struct PageCache {
    pages: LruCache<usize, ()>,
    capacity: usize,
}

impl PageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pages: LruCache::unbounded(),
            capacity: capacity.max(1),
        }
    }

    /// Adds `page` as the youngest entry, moving it if already present
    pub fn insert(&mut self, page: usize) {
        self.pages.pop(&page);
        self.pages.put(page, ());
    }

    pub fn remove(&mut self, page: usize) -> bool {
        self.pages.pop(&page).is_some()
    }

    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        self.pages.contains(&page)
    }

    /// Removes and returns the oldest entry
    pub fn pop_oldest(&mut self) -> Option<usize> {
        self.pages.pop_lru().map(|(page, _)| page)
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Pages from oldest to youngest
    #[must_use]
    pub fn pages(&self) -> Vec<usize> {
        self.pages.iter().rev().map(|(page, _)| *page).collect()
    }

    #[must_use]
    pub fn is_over_capacity(&self) -> bool {
        self.pages.len() > self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
