//! In-memory page cache with bounded residency and a free list of recyclable frames.
//!
//! The `buffer` module defines [`BufferPool`], a bounded `{PageId -> Page}` cache sitting in
//! front of the backing file. It does not own the file itself — it tracks which pages are
//! resident and evicts the least-recently-used one when a new page needs room, handing the
//! evicted page back to the caller so it can be written through to disk if dirty.
//!
//! # Responsibilities
//!
//! - Caching pages by id, up to a configured residency limit.
//! - Evicting the least-recently-accessed page when the pool is full, without writing it
//!   itself.
//! - Tracking a free list of page ids whose backing frames have been deleted and can be
//!   reused for the next allocation, avoiding unbounded file growth.
//!
//! # See Also
//! - [`page`](crate::storage::page): the cached unit itself.
//! - [`store`](crate::storage::store): owns the file and drives eviction writeback.

use std::collections::HashMap;

use log::trace;

use super::page::{Page, PageId};

/// Bounded, LRU-evicting cache of resident pages.
#[derive(Debug)]
pub struct BufferPool {
    resident: HashMap<PageId, Page>,
    max_resident: usize,
    free_list: Vec<PageId>,
    clock: u64,
}

impl BufferPool {
    /// Creates an empty pool that holds at most `max_resident` pages at once.
    ///
    /// The free list starts empty: a page id is only pushed onto it when a page is
    /// explicitly freed, never pre-populated with placeholder entries.
    pub fn new(max_resident: usize) -> Self {
        Self {
            resident: HashMap::with_capacity(max_resident),
            max_resident: max_resident.max(1),
            free_list: Vec::new(),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Returns the page with the given id if resident, refreshing its recency.
    pub fn get(&mut self, id: PageId) -> Option<&Page> {
        let tick = self.tick();
        let page = self.resident.get_mut(&id)?;
        page.last_accessed = tick;
        Some(page)
    }

    /// Returns a mutable reference to the page with the given id if resident, refreshing
    /// its recency.
    pub fn get_mut(&mut self, id: PageId) -> Option<&mut Page> {
        let tick = self.tick();
        let page = self.resident.get_mut(&id)?;
        page.last_accessed = tick;
        Some(page)
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.resident.contains_key(&id)
    }

    /// Inserts `page` into the pool, evicting the least-recently-used resident page first
    /// if the pool is at capacity. The evicted page (which may be dirty) is returned to the
    /// caller, which is responsible for writing it back before it is lost.
    pub fn insert(&mut self, mut page: Page) -> Option<Page> {
        page.last_accessed = self.tick();
        let id = page.id;

        let evicted = if !self.resident.contains_key(&id) && self.resident.len() >= self.max_resident {
            self.evict()
        } else {
            None
        };

        self.resident.insert(id, page);
        evicted
    }

    /// Evicts and returns the least-recently-accessed resident page, breaking ties by the
    /// lowest page id. Returns `None` if the pool holds no pages.
    fn evict(&mut self) -> Option<Page> {
        let victim = self
            .resident
            .values()
            .min_by_key(|page| (page.last_accessed, page.id))?
            .id;
        trace!("buffer pool: evicting page {victim}");
        self.resident.remove(&victim)
    }

    /// Removes and returns a resident page without going through eviction, e.g. when the
    /// page's backing frame has been freed.
    pub fn remove(&mut self, id: PageId) -> Option<Page> {
        self.resident.remove(&id)
    }

    /// Drains every resident page, for use when flushing the whole pool on close.
    pub fn drain(&mut self) -> Vec<Page> {
        self.resident.drain().map(|(_, page)| page).collect()
    }

    /// Mutable iterator over every resident page, without affecting recency or capacity.
    pub fn resident_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.resident.values_mut()
    }

    /// Pushes a freed page id onto the free list for reuse by a later allocation.
    pub fn push_free(&mut self, id: PageId) {
        self.free_list.push(id);
    }

    /// Pops the most recently freed page id, if any.
    pub fn pop_free(&mut self) -> Option<PageId> {
        self.free_list.pop()
    }

    /// The ids currently sitting in the free list, for meta persistence.
    pub fn free_list(&self) -> &[PageId] {
        &self.free_list
    }

    /// Replaces the free list wholesale, e.g. when restoring it from a meta page.
    pub fn set_free_list(&mut self, ids: Vec<PageId>) {
        self.free_list = ids;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::Page;

    fn page(id: PageId) -> Page {
        Page::new(id, 8, 8)
    }

    #[test]
    fn insert_and_get_round_trip() {
        let mut pool = BufferPool::new(4);
        pool.insert(page(1));
        assert!(pool.get(1).is_some());
        assert!(pool.get(2).is_none());
    }

    #[test]
    fn eviction_is_least_recently_used() {
        let mut pool = BufferPool::new(2);
        pool.insert(page(1));
        pool.insert(page(2));
        // touch page 1 so page 2 becomes the least-recently-used entry
        pool.get(1);

        let evicted = pool.insert(page(3));
        assert_eq!(evicted.map(|p| p.id), Some(2));
        assert!(pool.contains(1));
        assert!(pool.contains(3));
        assert!(!pool.contains(2));
    }

    #[test]
    fn eviction_ties_break_on_lowest_page_id() {
        let mut pool = BufferPool::new(2);
        pool.insert(page(5));
        pool.insert(page(2));
        let evicted = pool.insert(page(9));
        assert_eq!(evicted.map(|p| p.id), Some(2));
    }

    #[test]
    fn reinserting_a_resident_page_does_not_evict() {
        let mut pool = BufferPool::new(1);
        pool.insert(page(1));
        let evicted = pool.insert(page(1));
        assert!(evicted.is_none());
        assert!(pool.contains(1));
    }

    #[test]
    fn free_list_starts_empty() {
        let pool = BufferPool::new(4);
        assert!(pool.free_list().is_empty());
    }

    #[test]
    fn free_list_is_last_in_first_out() {
        let mut pool = BufferPool::new(4);
        pool.push_free(3);
        pool.push_free(7);
        assert_eq!(pool.pop_free(), Some(7));
        assert_eq!(pool.pop_free(), Some(3));
        assert_eq!(pool.pop_free(), None);
    }

    #[test]
    fn drain_returns_all_resident_pages() {
        let mut pool = BufferPool::new(4);
        pool.insert(page(1));
        pool.insert(page(2));
        let mut drained: Vec<_> = pool.drain().into_iter().map(|p| p.id).collect();
        drained.sort();
        assert_eq!(drained, vec![1, 2]);
        assert!(pool.drain().is_empty());
    }
}
