//! stratum - the in-memory page-caching core of a disk-backed storage
//! engine.
//!
//! Higher layers (executors, index code, log replay) see a large
//! addressable set of fixed-size pages; stratum keeps a bounded number of
//! them resident, fetching from disk on demand and writing dirty pages
//! back when their frames are reclaimed.
//!
//! # Architecture
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     callers (pin/unpin)                   │
//! └────────────────────────────┬──────────────────────────────┘
//! ┌────────────────────────────▼──────────────────────────────┐
//! │              Buffer Pool (buffer/)                        │
//! │   BufferPoolManager + Frame + LruReplacer + Statistics    │
//! └───────┬──────────────────────────────────────────┬────────┘
//! ┌───────▼───────────────────┐   ┌──────────────────▼────────┐
//! │  Page Table (hash/)       │   │  Storage Layer (storage/) │
//! │  ExtendibleHashTable      │   │  DiskManager + Page       │
//! └───────────────────────────┘   └───────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction
//! - [`hash`] - The extendible hash table backing the page table
//! - [`storage`] - Disk I/O and the page type
//! - [`recovery`] - Write-ahead-log ordering hooks
//!
//! # Quick Start
//! ```no_run
//! use stratum::storage::DiskManager;
//! use stratum::BufferPoolManager;
//!
//! let dm = DiskManager::create("my_database.db").unwrap();
//! let bpm = BufferPoolManager::new(64, dm);
//!
//! let page = bpm.new_page().unwrap().expect("pool exhausted");
//! page.write().as_mut_slice()[0] = 0xAB;
//! bpm.unpin_page(page.page_id(), true);
//! ```

pub mod buffer;
pub mod common;
pub mod hash;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, PageRef, StatsSnapshot};
pub use buffer::replacer::LruReplacer;
pub use hash::ExtendibleHashTable;
pub use recovery::{LogManager, Lsn};
pub use storage::{DiskManager, Page};
