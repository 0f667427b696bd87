//! Write-ahead logging hooks.
//!
//! - [`LogManager`] - LSN dispenser and durability horizon for the
//!   pool's flush-before-write-back barrier

mod log_manager;

pub use log_manager::{LogManager, Lsn};
