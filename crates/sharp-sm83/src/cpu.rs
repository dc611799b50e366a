//! SM83 CPU core with instruction-level stepping.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

use core::fmt;

use emu_core::{Bus, Ticks};

use crate::flags::{CF, ZF};
use crate::registers::{Model, Registers};

/// Interrupt request bits, lowest bit = highest priority.
const INT_MASK: u8 = 0x1F;
/// Joypad request bit, the only one that wakes STOP.
const INT_JOYPAD: u8 = 0x10;

/// IF and IE as seen from the address bus.
const REG_IF: u16 = 0xFF0F;

/// Fatal decode failure.
///
/// The SM83 has eleven holes in its opcode table; real hardware locks up
/// on them, so hitting one is a programming-contract violation rather
/// than a recoverable runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    IllegalOpcode { opcode: u8, pc: u16 },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalOpcode { opcode, pc } => {
                write!(f, "illegal opcode {opcode:#04X} at {pc:#06X}")
            }
        }
    }
}

impl std::error::Error for StepError {}

/// Sharp SM83 CPU.
///
/// The CPU does not own the bus. The bus is passed to `step()` for each
/// instruction so it can be shared with the rest of the machine, and so
/// tests can substitute a flat RAM bus.
#[derive(Debug)]
pub struct Sm83 {
    pub(crate) regs: Registers,

    /// Low-power state entered by HALT.
    halted: bool,
    /// Deeper low-power state entered by STOP.
    stopped: bool,
    /// EI takes effect after the instruction that follows it.
    ei_pending: bool,

    /// Total T-cycles elapsed.
    total_ticks: Ticks,
}

impl Sm83 {
    /// Create a CPU in the documented post-boot state for the given model.
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self {
            regs: Registers::power_on(model),
            halted: false,
            stopped: false,
            ei_pending: false,
            total_ticks: Ticks::ZERO,
        }
    }

    /// Total T-cycles elapsed since creation.
    #[must_use]
    pub const fn total_ticks(&self) -> Ticks {
        self.total_ticks
    }

    /// Snapshot of all registers for inspection.
    #[must_use]
    pub const fn registers(&self) -> Registers {
        self.regs
    }

    /// Replace the register file. Used by savestates and test harnesses.
    pub fn set_registers(&mut self, regs: Registers) {
        self.regs = regs;
    }

    /// True while the CPU sits in HALT or STOP.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted || self.stopped
    }

    /// Reset to the post-boot state.
    pub fn reset(&mut self, model: Model) {
        self.regs = Registers::power_on(model);
        self.halted = false;
        self.stopped = false;
        self.ei_pending = false;
        self.total_ticks = Ticks::ZERO;
    }

    /// Execute one instruction (or service one interrupt, or idle in a
    /// low-power state) and return the elapsed T-cycles.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::IllegalOpcode`] on an undefined opcode; the
    /// CPU must not silently decode it as a no-op.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<Ticks, StepError> {
        if self.stopped {
            // STOP wakes only on a joypad-class request; the enable mask
            // does not gate the wake.
            if bus.read(REG_IF) & INT_JOYPAD == 0 {
                bus.wait_for_joypad();
                if bus.read(REG_IF) & INT_JOYPAD == 0 {
                    return Ok(self.idle());
                }
            }
            self.stopped = false;
        }

        if self.halted {
            // Any pending-and-enabled interrupt wakes HALT; IME only
            // decides whether it is also dispatched.
            if bus.pending_interrupts() == 0 {
                bus.wait_for_interrupt();
                if bus.pending_interrupts() == 0 {
                    return Ok(self.idle());
                }
            }
            self.halted = false;
        }

        if self.regs.ime {
            let pending = bus.pending_interrupts();
            if pending != 0 {
                return Ok(self.dispatch_interrupt(bus, pending));
            }
        }

        let enable_ime = self.ei_pending;
        self.ei_pending = false;

        let pc = self.regs.pc;
        let opcode = self.fetch8(bus);
        let cycles = self.execute(bus, opcode, pc)?;

        if enable_ime {
            self.regs.ime = true;
        }

        let ticks = Ticks::new(u64::from(cycles));
        self.total_ticks += ticks;
        Ok(ticks)
    }

    /// Burn one machine cycle while in a low-power state.
    fn idle(&mut self) -> Ticks {
        let ticks = Ticks::new(4);
        self.total_ticks += ticks;
        ticks
    }

    /// Service the lowest-numbered pending-and-enabled interrupt.
    ///
    /// Clears IME, atomically clears the request bit, pushes PC, and
    /// jumps to the fixed vector: bit0→0x40 up through bit4→0x60.
    fn dispatch_interrupt<B: Bus>(&mut self, bus: &mut B, pending: u8) -> Ticks {
        let bit = pending & pending.wrapping_neg();
        debug_assert!(bit & INT_MASK != 0);

        self.regs.ime = false;
        self.ei_pending = false;
        bus.acknowledge_interrupt(bit);

        self.push16(bus, self.regs.pc);
        self.regs.pc = 0x0040 + 8 * u16::from(bit.trailing_zeros() as u8);

        let ticks = Ticks::new(20);
        self.total_ticks += ticks;
        ticks
    }

    // === Fetch and stack helpers ===

    pub(crate) fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    pub(crate) fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = bus.read16(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        value
    }

    /// Pre-decrement SP by 2, then store high byte at SP+1, low at SP.
    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        bus.write16(self.regs.sp, value);
    }

    /// Read from SP, then post-increment by 2.
    pub(crate) fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = bus.read16(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    // === Decode helpers ===

    /// Register by 3-bit encoding; index 6 is the (HL) memory cell.
    pub(crate) fn read_r8<B: Bus>(&mut self, bus: &mut B, r: u8) -> u8 {
        match r & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => bus.read(self.regs.hl()),
            _ => self.regs.a,
        }
    }

    pub(crate) fn write_r8<B: Bus>(&mut self, bus: &mut B, r: u8, value: u8) {
        match r & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            6 => bus.write(self.regs.hl(), value),
            _ => self.regs.a = value,
        }
    }

    /// Register pair by 2-bit encoding (BC, DE, HL, SP).
    pub(crate) fn read_rp(&self, rp: u8) -> u16 {
        match rp & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    pub(crate) fn write_rp(&mut self, rp: u8, value: u16) {
        match rp & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair for PUSH/POP (AF instead of SP).
    pub(crate) fn read_rp_af(&self, rp: u8) -> u16 {
        match rp & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.af(),
        }
    }

    pub(crate) fn write_rp_af(&mut self, rp: u8, value: u16) {
        match rp & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.set_af(value),
        }
    }

    /// Evaluate condition code (NZ, Z, NC, C).
    pub(crate) fn condition(&self, cc: u8) -> bool {
        match cc & 3 {
            0 => self.regs.f & ZF == 0,
            1 => self.regs.f & ZF != 0,
            2 => self.regs.f & CF == 0,
            _ => self.regs.f & CF != 0,
        }
    }

    pub(crate) fn enter_halt(&mut self) {
        self.halted = true;
    }

    pub(crate) fn enter_stop(&mut self) {
        self.stopped = true;
    }

    pub(crate) fn set_ei_pending(&mut self) {
        self.ei_pending = true;
    }

    pub(crate) fn clear_ei_pending(&mut self) {
        self.ei_pending = false;
    }
}

// Instruction execution split into separate file for readability
mod execute;

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    fn cpu_at(pc: u16) -> Sm83 {
        let mut cpu = Sm83::new(Model::Dmg);
        let mut regs = cpu.registers();
        regs.pc = pc;
        cpu.set_registers(regs);
        cpu
    }

    #[test]
    fn interrupt_priority_prefers_lowest_bit() {
        let mut cpu = cpu_at(0x0150);
        let mut regs = cpu.registers();
        regs.ime = true;
        regs.sp = 0xFFFE;
        cpu.set_registers(regs);

        let mut bus = SimpleBus::new();
        bus.interrupt_flags = 0b0000_0011;
        bus.interrupt_enable = 0b0000_0011;

        let ticks = cpu.step(&mut bus).unwrap();
        assert_eq!(ticks, Ticks::new(20));
        // Bit 0 → vector 0x40, not 0x48
        assert_eq!(cpu.registers().pc, 0x0040);
        // Only bit 0 acknowledged, bit 1 still pending
        assert_eq!(bus.interrupt_flags, 0b0000_0010);
        assert!(!cpu.registers().ime);
        // Return address pushed high-at-SP+1, low-at-SP
        assert_eq!(bus.read(0xFFFC), 0x50);
        assert_eq!(bus.read(0xFFFD), 0x01);
    }

    #[test]
    fn interrupts_held_off_while_ime_clear() {
        let mut cpu = cpu_at(0xC000);
        let mut bus = SimpleBus::new();
        bus.interrupt_flags = 0x01;
        bus.interrupt_enable = 0x01;
        bus.load(0xC000, &[0x00]); // NOP

        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.registers().pc, 0xC001);
        assert_eq!(bus.interrupt_flags, 0x01);
    }

    #[test]
    fn ei_enables_after_following_instruction() {
        let mut cpu = cpu_at(0xC000);
        let mut bus = SimpleBus::new();
        bus.interrupt_flags = 0x01;
        bus.interrupt_enable = 0x01;
        bus.load(0xC000, &[0xFB, 0x00, 0x00]); // EI; NOP; NOP

        cpu.step(&mut bus).unwrap(); // EI
        assert!(!cpu.registers().ime);
        cpu.step(&mut bus).unwrap(); // NOP — IME set after this
        assert!(cpu.registers().ime);
        let ticks = cpu.step(&mut bus).unwrap(); // dispatch, not the second NOP
        assert_eq!(ticks, Ticks::new(20));
        assert_eq!(cpu.registers().pc, 0x0040);
    }

    #[test]
    fn halt_wakes_without_dispatch_when_ime_clear() {
        let mut cpu = cpu_at(0xC000);
        let mut bus = SimpleBus::new();
        bus.load(0xC000, &[0x76, 0x00]); // HALT; NOP

        cpu.step(&mut bus).unwrap(); // HALT
        assert!(cpu.is_halted());

        // No interrupt: stays halted, burns a machine cycle
        assert_eq!(cpu.step(&mut bus).unwrap(), Ticks::new(4));
        assert!(cpu.is_halted());

        // Pending-and-enabled wakes it; IME clear means no dispatch
        bus.interrupt_flags = 0x04;
        bus.interrupt_enable = 0x04;
        cpu.step(&mut bus).unwrap();
        assert!(!cpu.is_halted());
        assert_eq!(cpu.registers().pc, 0xC002); // executed the NOP
        assert_eq!(bus.interrupt_flags, 0x04); // request not consumed
    }

    #[test]
    fn stop_waits_for_joypad_class_request() {
        let mut cpu = cpu_at(0xC000);
        let mut bus = SimpleBus::new();
        bus.load(0xC000, &[0x10, 0x00, 0x00]); // STOP; (pad); NOP

        cpu.step(&mut bus).unwrap();
        assert!(cpu.is_halted());

        // A non-joypad request does not wake STOP
        bus.interrupt_flags = 0x01;
        bus.interrupt_enable = 0x01;
        cpu.step(&mut bus).unwrap();
        assert!(cpu.is_halted());

        bus.interrupt_flags |= 0x10;
        cpu.step(&mut bus).unwrap();
        assert!(!cpu.is_halted());
    }

    #[test]
    fn illegal_opcode_is_fatal() {
        let mut cpu = cpu_at(0xC000);
        let mut bus = SimpleBus::new();
        bus.load(0xC000, &[0xD3]);

        let err = cpu.step(&mut bus).unwrap_err();
        assert_eq!(
            err,
            StepError::IllegalOpcode {
                opcode: 0xD3,
                pc: 0xC000
            }
        );
        assert_eq!(err.to_string(), "illegal opcode 0xD3 at 0xC000");
    }
}
