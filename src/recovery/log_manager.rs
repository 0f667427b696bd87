//! Log manager - the write-ahead-log ordering hook for the buffer pool.

use std::sync::atomic::{AtomicU64, Ordering};

/// Log sequence number.
pub type Lsn = u64;

/// Tracks the WAL durability horizon for the buffer pool.
///
/// The buffer pool's only WAL obligation is ordering: a dirty page must
/// not be written back before the log records describing its changes are
/// durable. [`LogManager`] carries just enough state for that barrier -
/// an LSN dispenser for log producers and a flushed-LSN horizon the pool
/// advances (via [`flush`](LogManager::flush)) immediately before a dirty
/// victim's write-back.
///
/// Log record storage, formats, and recovery live outside this crate;
/// attach a `LogManager` to a pool only when something produces LSNs.
/// A pool constructed without one makes no logging calls at all.
pub struct LogManager {
    /// Next LSN to hand out. LSN 0 is never assigned.
    next_lsn: AtomicU64,

    /// Highest LSN known durable.
    flushed_lsn: AtomicU64,
}

impl LogManager {
    /// Create a log manager with no records assigned or flushed.
    pub fn new() -> Self {
        Self {
            next_lsn: AtomicU64::new(1),
            flushed_lsn: AtomicU64::new(0),
        }
    }

    /// Hand out the next log sequence number.
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.fetch_add(1, Ordering::Relaxed)
    }

    /// Highest LSN known durable.
    pub fn flushed_lsn(&self) -> Lsn {
        self.flushed_lsn.load(Ordering::Acquire)
    }

    /// Make every assigned LSN durable.
    ///
    /// Called by the buffer pool before writing back a dirty victim.
    pub fn flush(&self) {
        let assigned = self.next_lsn.load(Ordering::Relaxed) - 1;
        self.flushed_lsn.fetch_max(assigned, Ordering::Release);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsn_monotonic() {
        let log = LogManager::new();

        let a = log.next_lsn();
        let b = log.next_lsn();
        assert!(b > a);
        assert_eq!(a, 1);
    }

    #[test]
    fn test_flush_advances_horizon() {
        let log = LogManager::new();
        assert_eq!(log.flushed_lsn(), 0);

        let last = {
            log.next_lsn();
            log.next_lsn()
        };

        log.flush();
        assert_eq!(log.flushed_lsn(), last);

        // Flushing again with nothing new assigned is a no-op
        log.flush();
        assert_eq!(log.flushed_lsn(), last);
    }
}
