//! Sharp SM83 CPU core — the processor inside the Game Boy.
//!
//! A Z80 derivative with a trimmed register file (no IX/IY, no alternate
//! set, no I/O space), four flags, and a single 0xCB escape table.
//! Instruction-level stepping: `step()` executes one instruction through
//! the bus and returns elapsed T-cycles.

mod alu;
mod cpu;
mod flags;
mod registers;

pub use cpu::{Sm83, StepError};
pub use flags::{CF, HF, NF, ZF};
pub use registers::{Model, Registers};
