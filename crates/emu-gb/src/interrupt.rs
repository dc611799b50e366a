//! Interrupt request/enable line.
//!
//! IF and IE live here as atomics so peripheral threads can raise a
//! request with a single read-modify-write while the CPU thread clears
//! it the same way, with no lock on the hot path. The mutex/condvar
//! pair exists only for the low-power waits.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Request bits, lowest bit = highest priority.
const INT_MASK: u8 = 0x1F;

/// Low-power waits are bounded so a single-threaded driver is never
/// wedged on a HALT with nothing to deliver; the halted CPU re-checks
/// and idles if nothing arrived.
const WAKE_BOUND: Duration = Duration::from_millis(1);

/// Interrupt sources, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// Bit position in IF/IE.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::VBlank => 0x01,
            Self::LcdStat => 0x02,
            Self::Timer => 0x04,
            Self::Serial => 0x08,
            Self::Joypad => 0x10,
        }
    }
}

/// Shared IF/IE register pair.
#[derive(Debug, Default)]
pub struct InterruptLine {
    flags: AtomicU8,
    enable: AtomicU8,
    wake: Mutex<()>,
    woken: Condvar,
}

impl InterruptLine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a request. Callable from any thread.
    pub fn request(&self, interrupt: Interrupt) {
        self.flags.fetch_or(interrupt.bit(), Ordering::AcqRel);
        self.woken.notify_all();
    }

    /// Clear a single request bit when the CPU services it.
    pub fn acknowledge(&self, bit: u8) {
        self.flags.fetch_and(!bit, Ordering::AcqRel);
    }

    /// Raw IF value.
    #[must_use]
    pub fn flags(&self) -> u8 {
        self.flags.load(Ordering::Acquire)
    }

    /// Guest write to IF. Replaces all request bits.
    pub fn set_flags(&self, value: u8) {
        self.flags.store(value & INT_MASK, Ordering::Release);
        self.woken.notify_all();
    }

    /// Raw IE value.
    #[must_use]
    pub fn enable(&self) -> u8 {
        self.enable.load(Ordering::Acquire)
    }

    /// Guest write to IE. All eight bits are stored and read back.
    pub fn set_enable(&self, value: u8) {
        self.enable.store(value, Ordering::Release);
        self.woken.notify_all();
    }

    /// Bits both requested and enabled.
    #[must_use]
    pub fn pending(&self) -> u8 {
        self.flags() & self.enable() & INT_MASK
    }

    /// Block (bounded) until some pending-and-enabled request exists.
    pub fn wait_until_pending(&self) {
        let guard = self.wake.lock().unwrap_or_else(PoisonError::into_inner);
        if self.pending() == 0 {
            drop(
                self.woken
                    .wait_timeout(guard, WAKE_BOUND)
                    .unwrap_or_else(PoisonError::into_inner),
            );
        }
    }

    /// Block (bounded) until a joypad request exists. The enable mask
    /// does not gate this wake.
    pub fn wait_for_joypad(&self) {
        let guard = self.wake.lock().unwrap_or_else(PoisonError::into_inner);
        if self.flags() & Interrupt::Joypad.bit() == 0 {
            drop(
                self.woken
                    .wait_timeout(guard, WAKE_BOUND)
                    .unwrap_or_else(PoisonError::into_inner),
            );
        }
    }
}
