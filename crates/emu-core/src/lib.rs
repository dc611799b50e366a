//! Core traits and types for cycle-accurate emulation.
//!
//! The CPU is the sole bus master: it fetches, reads, and writes through
//! the [`Bus`] trait and returns elapsed ticks to whoever drives the loop.

mod bus;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use ticks::Ticks;
