//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting
//! - Automatic dirty page write-back on eviction
//! - At-most-one resident copy per page id

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageRef};
use crate::common::config::DEFAULT_BUCKET_SIZE;
use crate::common::{FrameId, PageId, Result};
use crate::hash::ExtendibleHashTable;
use crate::recovery::LogManager;
use crate::storage::DiskManager;

/// Pool state mutated only under the latch: the frame array, the free
/// list, and the disk manager.
struct PoolState {
    frames: Vec<Frame>,
    free_list: VecDeque<FrameId>,
    disk: DiskManager,
}

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────┐  ┌─────────────────────────────────┐  │
/// │  │    page_table    │  │ latch ─▶ frames: Vec<Frame>     │  │
/// │  │ PageId → FrameId │─▶│          free_list: VecDeque    │  │
/// │  │ (extendible hash)│  │          disk: DiskManager      │  │
/// │  └──────────────────┘  └─────────────────────────────────┘  │
/// │  ┌──────────────────┐  ┌──────────────┐  ┌───────────────┐  │
/// │  │     replacer     │  │  log_manager │  │     stats     │  │
/// │  │ LRU over FrameId │  │  (optional)  │  │   (atomics)   │  │
/// │  └──────────────────┘  └──────────────┘  └───────────────┘  │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Frame states
/// Under the latch every frame is in exactly one of three states:
/// - *Free*: no page bound, referenced only by the free list
/// - *Pinned*: page bound, `pin_count > 0`, referenced only by the
///   page table
/// - *Unpinned resident*: page bound, `pin_count == 0`, referenced by
///   the page table and the replacer
///
/// # Locking
/// One coarse latch serializes every public operation, including the
/// blocking disk I/O those operations perform. This trades throughput for
/// invariant simplicity; two operations on the same page are linearized
/// in the order their latch acquisitions commit. The page table and the
/// replacer keep their own internal mutexes so they stay safe standalone;
/// under the latch those inner locks are uncontended. Lock order is
/// strictly pool → page table and pool → replacer.
///
/// Pin counts are plain integers under the latch. Page *contents* are the
/// exception to the coarse scheme: each frame's buffer has its own
/// `RwLock` so [`PageRef`] holders can touch bytes without the latch.
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.db")?;
/// let bpm = BufferPoolManager::new(10, dm);
///
/// let page = bpm.new_page()?.expect("pool exhausted");
/// page.write().as_mut_slice()[0] = 0xAB;
/// bpm.unpin_page(page.page_id(), true);
/// ```
pub struct BufferPoolManager {
    /// Frames, free list, and disk manager, all guarded together.
    latch: Mutex<PoolState>,

    /// Maps resident page IDs to frame IDs.
    page_table: ExtendibleHashTable<PageId, FrameId>,

    /// Eviction candidates among unpinned resident frames.
    replacer: LruReplacer<FrameId>,

    /// WAL barrier, flushed before dirty write-back when present.
    log_manager: Option<Arc<LogManager>>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        Self::with_log_manager(pool_size, disk_manager, None)
    }

    /// Create a buffer pool manager with a write-ahead-log barrier.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn with_log_manager(
        pool_size: usize,
        disk_manager: DiskManager,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        // Allocate all frames upfront; they all start free
        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: VecDeque<FrameId> = (0..pool_size).map(FrameId::new).collect();

        debug!(pool_size, "buffer pool initialized");

        Self {
            latch: Mutex::new(PoolState {
                frames,
                free_list,
                disk: disk_manager,
            }),
            page_table: ExtendibleHashTable::new(DEFAULT_BUCKET_SIZE),
            replacer: LruReplacer::new(),
            log_manager,
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: Fetch and unpin
    // ========================================================================

    /// Fetch a page, pinning its frame.
    ///
    /// If the page is already resident this is a cache hit. Otherwise a
    /// frame is taken from the free list or evicted from the replacer
    /// (writing it back first if dirty) and the page is read from disk.
    ///
    /// Returns `Ok(None)` when the page is not resident and every frame
    /// is pinned - the pool is exhausted. On success exactly one resident
    /// frame holds this page with `pin_count >= 1`.
    ///
    /// # Errors
    /// Disk failures from the read or from a victim's write-back.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PageRef>> {
        let mut state = self.latch.lock();

        if let Some(frame_id) = self.page_table.find(&page_id) {
            let frame = &mut state.frames[frame_id.0];
            frame.pin();
            let data = frame.data();

            // A frame pinned again is no longer an eviction candidate
            self.replacer.erase(&frame_id);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);

            return Ok(Some(PageRef::new(page_id, frame_id, data)));
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let frame_id = match self.select_victim_frame(&mut state)? {
            Some(fid) => fid,
            None => return Ok(None),
        };

        let data = state.frames[frame_id.0].data();
        let read_result = {
            let mut page = data.write();
            state.disk.read_page(page_id, &mut page)
        };
        if let Err(e) = read_result {
            // The victim is already detached from its old page; park the
            // frame on the free list rather than losing it.
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        let frame = &mut state.frames[frame_id.0];
        frame.set_page_id(page_id);
        frame.pin();
        self.page_table.insert(page_id, frame_id);
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        Ok(Some(PageRef::new(page_id, frame_id, data)))
    }

    /// Unpin a page, optionally reporting it modified.
    ///
    /// Returns false if the page is not resident or its pin count is
    /// already zero; no state changes in that case. When the pin count
    /// drops to zero the frame becomes an eviction candidate.
    ///
    /// The dirty flag is monotone between loads and write-backs:
    /// `is_dirty = false` never clears a flag set by an earlier unpin.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.latch.lock();

        let frame_id = match self.page_table.find(&page_id) {
            Some(fid) => fid,
            None => return false,
        };

        let frame = &mut state.frames[frame_id.0];
        if frame.pin_count() == 0 {
            return false;
        }

        if frame.unpin() == 0 {
            self.replacer.insert(frame_id);
        }
        if is_dirty {
            frame.mark_dirty();
        }
        true
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Allocate a new page on disk and pin it in a frame.
    ///
    /// The frame is claimed *before* the disk allocation, so an exhausted
    /// pool (`Ok(None)`) allocates nothing. The new page's buffer is
    /// zeroed and its pin count starts at 1.
    ///
    /// # Errors
    /// Disk failures from the allocation or from a victim's write-back.
    pub fn new_page(&self) -> Result<Option<PageRef>> {
        let mut state = self.latch.lock();

        let frame_id = match self.select_victim_frame(&mut state)? {
            Some(fid) => fid,
            None => return Ok(None),
        };

        let page_id = match state.disk.allocate_page() {
            Ok(pid) => pid,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        let data = state.frames[frame_id.0].data();
        data.write().reset();

        let frame = &mut state.frames[frame_id.0];
        frame.set_page_id(page_id);
        frame.pin();
        self.page_table.insert(page_id, frame_id);

        trace!(page_id = %page_id, frame_id = %frame_id, "allocated new page");

        Ok(Some(PageRef::new(page_id, frame_id, data)))
    }

    /// Delete a resident page and release its identifier.
    ///
    /// Returns `Ok(false)` if the page is not resident, or if it is
    /// pinned (in which case nothing changes). On success the frame is
    /// reset and returned to the free list, the identifier is handed back
    /// to the disk manager, and the result is `Ok(true)`.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.latch.lock();

        let frame_id = match self.page_table.find(&page_id) {
            Some(fid) => fid,
            None => return Ok(false),
        };

        if state.frames[frame_id.0].is_pinned() {
            return Ok(false);
        }

        self.page_table.remove(&page_id);
        self.replacer.erase(&frame_id);
        state.frames[frame_id.0].reset();
        state.disk.deallocate_page(page_id)?;
        state.free_list.push_back(frame_id);

        trace!(page_id = %page_id, frame_id = %frame_id, "deleted page");

        Ok(true)
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a resident page to disk and clear its dirty flag.
    ///
    /// Returns `Ok(false)` for [`PageId::INVALID`] or a non-resident
    /// page. The write is unconditional and the page may be pinned; two
    /// successive flushes with no intervening modification write
    /// identical bytes.
    ///
    /// # Errors
    /// Disk failures from the write.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.latch.lock();

        if !page_id.is_valid() {
            return Ok(false);
        }
        let frame_id = match self.page_table.find(&page_id) {
            Some(fid) => fid,
            None => return Ok(false),
        };

        self.flush_frame(&mut state, frame_id, page_id)?;
        Ok(true)
    }

    /// Flush every resident page to disk.
    ///
    /// # Errors
    /// Disk failures from the writes; flushing stops at the first.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.latch.lock();

        let resident: Vec<(FrameId, PageId)> = state
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| !frame.is_free())
            .map(|(i, frame)| (FrameId::new(i), frame.page_id()))
            .collect();

        debug!(pages = resident.len(), "flushing all resident pages");

        for (frame_id, page_id) in resident {
            self.flush_frame(&mut state, frame_id, page_id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Introspection
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    /// Get the number of unpinned resident frames (eviction candidates).
    pub fn replacer_size(&self) -> usize {
        self.replacer.size()
    }

    /// Get the number of pinned frames.
    pub fn pinned_frame_count(&self) -> usize {
        self.latch
            .lock()
            .frames
            .iter()
            .filter(|frame| frame.is_pinned())
            .count()
    }

    /// Get the number of pages resident in the buffer pool.
    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Check whether a page is resident.
    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.page_table.find(&page_id).is_some()
    }

    /// Get the pin count of a resident page, or None if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock();
        self.page_table
            .find(&page_id)
            .map(|frame_id| state.frames[frame_id.0].pin_count())
    }

    // ========================================================================
    // Internal: Victim selection and write-back
    // ========================================================================

    /// Claim a frame for a new occupant: the free list first, then the
    /// replacer. Returns `Ok(None)` when both are empty.
    ///
    /// An evicted victim is written back first when dirty (behind the WAL
    /// barrier) and its old mapping is removed. If the write-back fails
    /// the victim goes back into the replacer still dirty and still
    /// mapped - a dirty frame is never reused until its write succeeds.
    fn select_victim_frame(&self, state: &mut PoolState) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let frame_id = match self.replacer.victim() {
            Some(fid) => fid,
            None => return Ok(None),
        };

        let old_page_id = state.frames[frame_id.0].page_id();

        if state.frames[frame_id.0].is_dirty() {
            // WAL rule: log records describing this page must be durable
            // before the page overwrites its disk copy
            if let Some(log) = &self.log_manager {
                log.flush();
            }

            let data = state.frames[frame_id.0].data();
            let write_result = {
                let page = data.read();
                state.disk.write_page(old_page_id, &page)
            };
            if let Err(e) = write_result {
                self.replacer.insert(frame_id);
                return Err(e);
            }

            state.frames[frame_id.0].clear_dirty();
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        }

        self.page_table.remove(&old_page_id);
        state.frames[frame_id.0].set_page_id(PageId::INVALID);
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        trace!(page_id = %old_page_id, frame_id = %frame_id, "evicted page");

        Ok(Some(frame_id))
    }

    /// Write a resident frame to disk unconditionally and clear its
    /// dirty flag.
    fn flush_frame(&self, state: &mut PoolState, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let data = state.frames[frame_id.0].data();
        {
            let page = data.read();
            state.disk.write_page(page_id, &page)?;
        }
        state.frames[frame_id.0].clear_dirty();
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Helper to create a BPM with a temporary database file.
    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let dm = DiskManager::create(&path).unwrap();
        (BufferPoolManager::new(pool_size, dm), dir)
    }

    /// Helper to create a BPM over a file that already holds `pages`
    /// zeroed pages.
    fn create_test_bpm_with_pages(
        pool_size: usize,
        pages: u32,
    ) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut dm = DiskManager::create(&path).unwrap();
        for _ in 0..pages {
            dm.allocate_page().unwrap();
        }
        (BufferPoolManager::new(pool_size, dm), dir)
    }

    #[test]
    fn test_new_page() {
        let (bpm, _dir) = create_test_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        assert_eq!(page.page_id(), PageId::new(0));
        assert_eq!(bpm.get_pin_count(page.page_id()), Some(1));

        let page = bpm.new_page().unwrap().unwrap();
        assert_eq!(page.page_id(), PageId::new(1));
    }

    #[test]
    fn test_fetch_unpin_round_trip() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = {
            let page = bpm.new_page().unwrap().unwrap();
            page.write().as_mut_slice()[0] = 0xAB;
            page.page_id()
        };
        assert!(bpm.unpin_page(pid, true));

        // Fetch hit: pinned again, data still there
        let page = bpm.fetch_page(pid).unwrap().unwrap();
        assert_eq!(page.read().as_slice()[0], 0xAB);
        assert_eq!(bpm.get_pin_count(pid), Some(1));

        // Unpinning leaves the page resident and evictable
        assert!(bpm.unpin_page(pid, false));
        assert_eq!(bpm.get_pin_count(pid), Some(0));
        assert!(bpm.contains_page(pid));
        assert_eq!(bpm.replacer_size(), 1);
    }

    #[test]
    fn test_unpin_below_zero_returns_false() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = bpm.new_page().unwrap().unwrap().page_id();
        assert!(bpm.unpin_page(pid, false));

        // Pin count is already zero; further unpins are rejected
        assert!(!bpm.unpin_page(pid, false));
        assert_eq!(bpm.get_pin_count(pid), Some(0));
    }

    #[test]
    fn test_unpin_unknown_page_returns_false() {
        let (bpm, _dir) = create_test_bpm(10);
        assert!(!bpm.unpin_page(PageId::new(99), false));
    }

    #[test]
    fn test_dirty_flag_is_monotone() {
        let (bpm, _dir) = create_test_bpm_with_pages(1, 2);
        let pid = PageId::new(0);

        // Two pins, one dirty unpin, one clean unpin: the clean unpin must
        // not wash out the dirty flag
        let _a = bpm.fetch_page(pid).unwrap().unwrap();
        let _b = bpm.fetch_page(pid).unwrap().unwrap();
        assert_eq!(bpm.get_pin_count(pid), Some(2));

        assert!(bpm.unpin_page(pid, true));
        assert!(bpm.unpin_page(pid, false));

        // Eviction still sees a dirty frame and writes it back
        bpm.fetch_page(PageId::new(1)).unwrap().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 1);
    }

    #[test]
    fn test_fetch_hit_uses_single_frame() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = bpm.new_page().unwrap().unwrap().page_id();
        let a = bpm.fetch_page(pid).unwrap().unwrap();
        let b = bpm.fetch_page(pid).unwrap().unwrap();

        // At most one resident copy per page id
        assert_eq!(a.frame_id(), b.frame_id());
        assert_eq!(bpm.page_count(), 1);
        assert_eq!(bpm.get_pin_count(pid), Some(3));
    }

    #[test]
    fn test_fetch_exhausted_pool_returns_none() {
        let (bpm, _dir) = create_test_bpm_with_pages(3, 4);

        // Pin three pages and never unpin them
        for i in 0..3 {
            let page = bpm.fetch_page(PageId::new(i)).unwrap().unwrap();
            assert_eq!(page.page_id(), PageId::new(i));
        }

        // No free frame and no victim: out of buffer
        assert!(bpm.fetch_page(PageId::new(3)).unwrap().is_none());
    }

    #[test]
    fn test_new_page_exhausted_pool_returns_none() {
        let (bpm, _dir) = create_test_bpm(3);

        for _ in 0..3 {
            bpm.new_page().unwrap().unwrap();
        }
        assert!(bpm.new_page().unwrap().is_none());

        // Nothing was allocated on disk for the failed attempt
        assert!(bpm.unpin_page(PageId::new(0), false));
        let page = bpm.new_page().unwrap().unwrap();
        assert_eq!(page.page_id(), PageId::new(3));
    }

    #[test]
    fn test_eviction_writes_dirty_page() {
        let (bpm, _dir) = create_test_bpm_with_pages(3, 4);

        // Dirty page 0, then leave it as the only eviction candidate
        let page = bpm.fetch_page(PageId::new(0)).unwrap().unwrap();
        page.write().as_mut_slice()[0] = 0x42;
        assert!(bpm.unpin_page(PageId::new(0), true));

        let _p1 = bpm.fetch_page(PageId::new(1)).unwrap().unwrap();
        let _p2 = bpm.fetch_page(PageId::new(2)).unwrap().unwrap();

        // Page 3 must evict page 0, writing it back first
        let _p3 = bpm.fetch_page(PageId::new(3)).unwrap().unwrap();
        assert!(!bpm.contains_page(PageId::new(0)));
        assert_eq!(bpm.stats().snapshot().pages_written, 1);
        assert_eq!(bpm.stats().snapshot().evictions, 1);

        // All frames pinned now: page 0 cannot come back
        assert!(bpm.fetch_page(PageId::new(0)).unwrap().is_none());

        // After an unpin it reloads from disk with the written data
        assert!(bpm.unpin_page(PageId::new(1), false));
        let page = bpm.fetch_page(PageId::new(0)).unwrap().unwrap();
        assert_eq!(page.read().as_slice()[0], 0x42);
    }

    #[test]
    fn test_lru_eviction_order() {
        let (bpm, _dir) = create_test_bpm(3);

        let a = bpm.new_page().unwrap().unwrap().page_id();
        let b = bpm.new_page().unwrap().unwrap().page_id();
        let c = bpm.new_page().unwrap().unwrap().page_id();

        bpm.unpin_page(a, false);
        bpm.unpin_page(b, false);
        bpm.unpin_page(c, false);

        // a was unpinned first, so it is the least recent candidate
        bpm.new_page().unwrap().unwrap();
        assert!(!bpm.contains_page(a));
        assert!(bpm.contains_page(b));
        assert!(bpm.contains_page(c));

        bpm.new_page().unwrap().unwrap();
        assert!(!bpm.contains_page(b));
        assert!(bpm.contains_page(c));
    }

    #[test]
    fn test_flush_page() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = {
            let page = bpm.new_page().unwrap().unwrap();
            page.write().as_mut_slice()[0] = 0xFF;
            page.page_id()
        };
        bpm.unpin_page(pid, true);

        // Flush works on resident pages, pinned or not
        assert!(bpm.flush_page(pid).unwrap());
        assert_eq!(bpm.stats().snapshot().pages_written, 1);

        // A clean page still gets written
        assert!(bpm.flush_page(pid).unwrap());
        assert_eq!(bpm.stats().snapshot().pages_written, 2);

        // Sentinel and non-resident ids are rejected
        assert!(!bpm.flush_page(PageId::INVALID).unwrap());
        assert!(!bpm.flush_page(PageId::new(42)).unwrap());
    }

    #[test]
    fn test_flush_pinned_page() {
        let (bpm, _dir) = create_test_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        page.write().as_mut_slice()[7] = 0x07;

        // Still pinned: flush is allowed
        assert!(bpm.flush_page(page.page_id()).unwrap());
    }

    #[test]
    fn test_flush_all_pages() {
        let (bpm, _dir) = create_test_bpm(10);

        for i in 0..5u8 {
            let page = bpm.new_page().unwrap().unwrap();
            page.write().as_mut_slice()[0] = i;
            bpm.unpin_page(page.page_id(), true);
        }

        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 5);
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = bpm.new_page().unwrap().unwrap().page_id();
        bpm.unpin_page(pid, false);
        assert_eq!(bpm.page_count(), 1);
        assert_eq!(bpm.free_frame_count(), 9);

        assert!(bpm.delete_page(pid).unwrap());

        assert!(!bpm.contains_page(pid));
        assert_eq!(bpm.page_count(), 0);
        assert_eq!(bpm.free_frame_count(), 10);
        assert_eq!(bpm.replacer_size(), 0);

        // The identifier went back to the disk manager exactly once: the
        // next allocation reuses it
        let page = bpm.new_page().unwrap().unwrap();
        assert_eq!(page.page_id(), pid);
    }

    #[test]
    fn test_delete_pinned_page_fails() {
        let (bpm, _dir) = create_test_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        let pid = page.page_id();

        assert!(!bpm.delete_page(pid).unwrap());
        assert!(bpm.contains_page(pid));
        assert_eq!(bpm.get_pin_count(pid), Some(1));
    }

    #[test]
    fn test_delete_missing_page_fails() {
        let (bpm, _dir) = create_test_bpm(10);
        assert!(!bpm.delete_page(PageId::new(5)).unwrap());
    }

    #[test]
    fn test_deleted_page_fetches_fresh_from_disk() {
        let (bpm, _dir) = create_test_bpm(2);

        let pid = {
            let page = bpm.new_page().unwrap().unwrap();
            page.write().as_mut_slice()[0] = 0x99;
            page.page_id()
        };
        bpm.unpin_page(pid, true);
        assert!(bpm.delete_page(pid).unwrap());

        // The id still addresses a disk slot; fetching it reads whatever
        // the disk holds, with no trace of the deleted frame
        let page = bpm.fetch_page(pid).unwrap().unwrap();
        assert_eq!(page.read().as_slice()[0], 0);
    }

    #[test]
    fn test_frame_accounting_invariant() {
        let (bpm, _dir) = create_test_bpm(4);

        let check = |bpm: &BufferPoolManager| {
            assert_eq!(
                bpm.free_frame_count() + bpm.replacer_size() + bpm.pinned_frame_count(),
                bpm.pool_size()
            );
        };

        check(&bpm);

        let a = bpm.new_page().unwrap().unwrap().page_id();
        let b = bpm.new_page().unwrap().unwrap().page_id();
        check(&bpm);

        bpm.unpin_page(a, true);
        check(&bpm);

        bpm.fetch_page(a).unwrap().unwrap();
        check(&bpm);

        bpm.unpin_page(a, false);
        bpm.unpin_page(b, false);
        bpm.delete_page(b).unwrap();
        check(&bpm);

        // Force an eviction
        bpm.new_page().unwrap().unwrap();
        bpm.new_page().unwrap().unwrap();
        bpm.new_page().unwrap().unwrap();
        bpm.new_page().unwrap().unwrap();
        check(&bpm);
    }

    #[test]
    fn test_cache_hit_stats() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = bpm.new_page().unwrap().unwrap().page_id();
        bpm.unpin_page(pid, false);

        for _ in 0..3 {
            bpm.fetch_page(pid).unwrap().unwrap();
            bpm.unpin_page(pid, false);
        }

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_misses, 0);
    }

    #[test]
    fn test_wal_flushed_before_dirty_eviction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let dm = DiskManager::create(&path).unwrap();

        let log = Arc::new(LogManager::new());
        let bpm = BufferPoolManager::with_log_manager(1, dm, Some(Arc::clone(&log)));

        let pid = bpm.new_page().unwrap().unwrap().page_id();
        let lsn = log.next_lsn();
        bpm.unpin_page(pid, true);
        assert_eq!(log.flushed_lsn(), 0);

        // Evicting the dirty page must advance the log horizon first
        bpm.new_page().unwrap().unwrap();
        assert!(log.flushed_lsn() >= lsn);
    }

    #[test]
    fn test_concurrent_fetch_unpin() {
        use std::thread;

        let (bpm, _dir) = create_test_bpm(10);
        let bpm = Arc::new(bpm);

        let pid = {
            let page = bpm.new_page().unwrap().unwrap();
            page.write().as_mut_slice()[0] = 0x42;
            page.page_id()
        };
        bpm.unpin_page(pid, true);

        let mut handles = vec![];
        for _ in 0..8 {
            let bpm = Arc::clone(&bpm);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let page = bpm.fetch_page(pid).unwrap().unwrap();
                    assert_eq!(page.read().as_slice()[0], 0x42);
                    assert!(bpm.unpin_page(pid, false));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bpm.get_pin_count(pid), Some(0));
        assert_eq!(bpm.stats().snapshot().cache_hits, 800);
    }
}
