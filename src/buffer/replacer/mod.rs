//! Eviction policy implementations (replacers).
//!
//! - [`LruReplacer`] - least-recently-inserted eviction

mod lru;

pub use lru::LruReplacer;
