//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a page buffer plus the metadata needed for buffer
//! management:
//! - Which page is loaded (or [`PageId::INVALID`] when free)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking

use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::PageId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// Frames are the "slots" in the buffer pool; each can hold one page. The
/// pool allocates a fixed number of frames at startup and never destroys
/// them.
///
/// Metadata (`page_id`, `pin_count`, `is_dirty`) is plain data: it is only
/// read or written while the pool latch is held, so no per-field
/// synchronization is needed. The page buffer itself sits behind an
/// `Arc<RwLock<_>>` so callers holding a [`PageRef`](crate::buffer::PageRef)
/// can read and write page bytes after the latch is released.
pub struct Frame {
    /// The page data. Shared with outstanding page handles.
    data: Arc<RwLock<Page>>,

    /// Which page is currently loaded, or INVALID if the frame is free.
    page_id: PageId,

    /// Number of active borrowers of this frame.
    pin_count: u32,

    /// Whether the page has been modified since it was loaded.
    is_dirty: bool,
}

impl Frame {
    /// Create a new free frame.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Page::new())),
            page_id: PageId::INVALID,
            pin_count: 0,
            is_dirty: false,
        }
    }

    /// Shared handle to the page buffer.
    #[inline]
    pub fn data(&self) -> Arc<RwLock<Page>> {
        Arc::clone(&self.data)
    }

    /// The page this frame holds, INVALID when free.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Bind the frame to a page.
    #[inline]
    pub fn set_page_id(&mut self, page_id: PageId) {
        self.page_id = page_id;
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.pin_count
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// The caller checks for a positive pin count first; decrementing a
    /// zero pin count is a bug in the pool itself.
    #[inline]
    pub fn unpin(&mut self) -> u32 {
        debug_assert!(self.pin_count > 0, "pin count underflow");
        self.pin_count -= 1;
        self.pin_count
    }

    /// Current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Check if the frame is currently pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Mark the frame as dirty (modified since load).
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Clear the dirty flag after a write-back.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.is_dirty = false;
    }

    /// Check if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Check if the frame holds no page.
    #[inline]
    pub fn is_free(&self) -> bool {
        self.page_id == PageId::INVALID
    }

    /// Return the frame to its free state: no page, unpinned, clean,
    /// zeroed buffer.
    pub fn reset(&mut self) {
        self.data.write().reset();
        self.page_id = PageId::INVALID;
        self.pin_count = 0;
        self.is_dirty = false;
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
