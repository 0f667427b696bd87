//! Page handle returned by the buffer pool.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

/// A handle to a page resident in the buffer pool.
///
/// Returned by [`BufferPoolManager::fetch_page`] and
/// [`BufferPoolManager::new_page`]. The handle gives access to the page
/// bytes through its own read/write lock, independent of the pool latch,
/// so page content can be examined and modified without serializing
/// against other pool operations.
///
/// # Pinning
/// Holding a `PageRef` does **not** pin the page; pinning is the explicit
/// fetch/unpin protocol on the pool. The frame behind this handle stays
/// bound to the page only while the pin count is positive - touching the
/// handle after the matching [`unpin_page`] call may observe whatever page
/// the frame was rebound to, exactly like a stale page pointer in any
/// other storage engine. Unpin last.
///
/// [`BufferPoolManager::fetch_page`]: crate::buffer::BufferPoolManager::fetch_page
/// [`BufferPoolManager::new_page`]: crate::buffer::BufferPoolManager::new_page
/// [`unpin_page`]: crate::buffer::BufferPoolManager::unpin_page
#[derive(Clone)]
pub struct PageRef {
    page_id: PageId,
    frame_id: FrameId,
    data: Arc<RwLock<Page>>,
}

impl PageRef {
    pub(crate) fn new(page_id: PageId, frame_id: FrameId, data: Arc<RwLock<Page>>) -> Self {
        Self {
            page_id,
            frame_id,
            data,
        }
    }

    /// The page this handle refers to.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// The frame holding the page.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Acquire shared access to the page bytes.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.data.read()
    }

    /// Acquire exclusive access to the page bytes.
    ///
    /// Writing through the handle does not set the frame's dirty flag;
    /// report modifications through `unpin_page(id, true)`.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.data.write()
    }
}
