//! Instruction execution for the SM83.
//!
//! One match arm per opcode family, grouped by encoding where the SM83's
//! octal-style layout allows it. Each arm returns the T-cycles consumed,
//! including the taken/not-taken split for conditional transfers.

#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use emu_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, NF, ZF};

use super::{Sm83, StepError};

impl Sm83 {
    /// Execute one already-fetched base-table opcode.
    ///
    /// `pc` is the address the opcode was fetched from, used only for
    /// error reporting.
    pub(super) fn execute<B: Bus>(
        &mut self,
        bus: &mut B,
        opcode: u8,
        pc: u16,
    ) -> Result<u8, StepError> {
        let cycles = match opcode {
            // NOP
            0x00 => 4,

            // LD rr, nn (01=BC, 11=DE, 21=HL, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let nn = self.fetch16(bus);
                self.write_rp((opcode >> 4) & 3, nn);
                12
            }

            // LD (BC), A / LD (DE), A
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a);
                8
            }
            0x12 => {
                bus.write(self.regs.de(), self.regs.a);
                8
            }

            // INC rr / DEC rr (no flags)
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = (opcode >> 4) & 3;
                self.write_rp(rp, self.read_rp(rp).wrapping_add(1));
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = (opcode >> 4) & 3;
                self.write_rp(rp, self.read_rp(rp).wrapping_sub(1));
                8
            }

            // INC r (34 = (HL))
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (opcode >> 3) & 7;
                let result = alu::inc8(self.read_r8(bus, r));
                self.write_r8(bus, r, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                if r == 6 { 12 } else { 4 }
            }

            // DEC r (35 = (HL))
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (opcode >> 3) & 7;
                let result = alu::dec8(self.read_r8(bus, r));
                self.write_r8(bus, r, result.value);
                self.regs.f = (self.regs.f & CF) | result.flags;
                if r == 6 { 12 } else { 4 }
            }

            // LD r, n (36 = (HL))
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let n = self.fetch8(bus);
                let r = (opcode >> 3) & 7;
                self.write_r8(bus, r, n);
                if r == 6 { 12 } else { 8 }
            }

            // RLCA / RLA / RRCA / RRA — accumulator rotates clear Z
            0x07 => {
                let result = alu::rlc8(self.regs.a);
                self.regs.a = result.value;
                self.regs.f = result.flags & CF;
                4
            }
            0x17 => {
                let result = alu::rl8(self.regs.a, self.regs.f & CF != 0);
                self.regs.a = result.value;
                self.regs.f = result.flags & CF;
                4
            }
            0x0F => {
                let result = alu::rrc8(self.regs.a);
                self.regs.a = result.value;
                self.regs.f = result.flags & CF;
                4
            }
            0x1F => {
                let result = alu::rr8(self.regs.a, self.regs.f & CF != 0);
                self.regs.a = result.value;
                self.regs.f = result.flags & CF;
                4
            }

            // LD (nn), SP
            0x08 => {
                let nn = self.fetch16(bus);
                bus.write16(nn, self.regs.sp);
                20
            }

            // ADD HL, rr — Z preserved
            0x09 | 0x19 | 0x29 | 0x39 => {
                let rr = self.read_rp((opcode >> 4) & 3);
                let (value, flags) = alu::add16(self.regs.hl(), rr);
                self.regs.set_hl(value);
                self.regs.f = (self.regs.f & ZF) | flags;
                8
            }

            // LD A, (BC) / LD A, (DE)
            0x0A => {
                self.regs.a = bus.read(self.regs.bc());
                8
            }
            0x1A => {
                self.regs.a = bus.read(self.regs.de());
                8
            }

            // STOP — two-byte encoding, the pad byte is consumed
            0x10 => {
                let _pad = self.fetch8(bus);
                self.enter_stop();
                4
            }

            // JR e — displacement relative to the address after the instruction
            0x18 => {
                let e = self.fetch8(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add(e as u16);
                12
            }

            // JR cc, e (20=NZ, 28=Z, 30=NC, 38=C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let e = self.fetch8(bus) as i8;
                if self.condition((opcode >> 3) & 3) {
                    self.regs.pc = self.regs.pc.wrapping_add(e as u16);
                    12
                } else {
                    8
                }
            }

            // LD (HL+), A / LD A, (HL+) / LD (HL-), A / LD A, (HL-)
            0x22 => {
                let hl = self.regs.hl();
                bus.write(hl, self.regs.a);
                self.regs.set_hl(hl.wrapping_add(1));
                8
            }
            0x2A => {
                let hl = self.regs.hl();
                self.regs.a = bus.read(hl);
                self.regs.set_hl(hl.wrapping_add(1));
                8
            }
            0x32 => {
                let hl = self.regs.hl();
                bus.write(hl, self.regs.a);
                self.regs.set_hl(hl.wrapping_sub(1));
                8
            }
            0x3A => {
                let hl = self.regs.hl();
                self.regs.a = bus.read(hl);
                self.regs.set_hl(hl.wrapping_sub(1));
                8
            }

            // DAA
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.f = result.flags;
                4
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f = (self.regs.f & (ZF | CF)) | NF | HF;
                4
            }

            // SCF / CCF
            0x37 => {
                self.regs.f = (self.regs.f & ZF) | CF;
                4
            }
            0x3F => {
                self.regs.f = (self.regs.f & ZF) | ((self.regs.f & CF) ^ CF);
                4
            }

            // HALT sits in the middle of the LD r,r' block
            0x76 => {
                self.enter_halt();
                4
            }

            // LD r, r'
            0x40..=0x7F => {
                let dst = (opcode >> 3) & 7;
                let src = opcode & 7;
                let value = self.read_r8(bus, src);
                self.write_r8(bus, dst, value);
                if dst == 6 || src == 6 { 8 } else { 4 }
            }

            // ALU A, r (80-87 ADD, 88-8F ADC, 90-97 SUB, 98-9F SBC,
            //           A0-A7 AND, A8-AF XOR, B0-B7 OR, B8-BF CP)
            0x80..=0xBF => {
                let value = self.read_r8(bus, opcode & 7);
                self.alu_a((opcode >> 3) & 7, value);
                if opcode & 7 == 6 { 8 } else { 4 }
            }

            // ALU A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let n = self.fetch8(bus);
                self.alu_a((opcode >> 3) & 7, n);
                8
            }

            // RET cc (C0=NZ, C8=Z, D0=NC, D8=C)
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition((opcode >> 3) & 3) {
                    self.regs.pc = self.pop16(bus);
                    20
                } else {
                    8
                }
            }

            // POP qq (F1 = AF, low nibble of F dropped)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop16(bus);
                self.write_rp_af((opcode >> 4) & 3, value);
                12
            }

            // JP cc, nn
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let nn = self.fetch16(bus);
                if self.condition((opcode >> 3) & 3) {
                    self.regs.pc = nn;
                    16
                } else {
                    12
                }
            }

            // JP nn
            0xC3 => {
                self.regs.pc = self.fetch16(bus);
                16
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let nn = self.fetch16(bus);
                if self.condition((opcode >> 3) & 3) {
                    self.push16(bus, self.regs.pc);
                    self.regs.pc = nn;
                    24
                } else {
                    12
                }
            }

            // PUSH qq
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let value = self.read_rp_af((opcode >> 4) & 3);
                self.push16(bus, value);
                16
            }

            // RST p — vectors 00/08/10/18/20/28/30/38
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push16(bus, self.regs.pc);
                self.regs.pc = u16::from(opcode & 0x38);
                16
            }

            // RET / RETI
            0xC9 => {
                self.regs.pc = self.pop16(bus);
                16
            }
            0xD9 => {
                self.regs.pc = self.pop16(bus);
                self.regs.ime = true;
                16
            }

            // CB escape: the extended bit/rotate/shift table
            0xCB => self.execute_cb(bus),

            // CALL nn
            0xCD => {
                let nn = self.fetch16(bus);
                self.push16(bus, self.regs.pc);
                self.regs.pc = nn;
                24
            }

            // LDH (n), A / LDH A, (n)
            0xE0 => {
                let n = self.fetch8(bus);
                bus.write(0xFF00 | u16::from(n), self.regs.a);
                12
            }
            0xF0 => {
                let n = self.fetch8(bus);
                self.regs.a = bus.read(0xFF00 | u16::from(n));
                12
            }

            // LD (FF00+C), A / LD A, (FF00+C)
            0xE2 => {
                bus.write(0xFF00 | u16::from(self.regs.c), self.regs.a);
                8
            }
            0xF2 => {
                self.regs.a = bus.read(0xFF00 | u16::from(self.regs.c));
                8
            }

            // ADD SP, e
            0xE8 => {
                let e = self.fetch8(bus) as i8;
                let (value, flags) = alu::add_sp(self.regs.sp, e);
                self.regs.sp = value;
                self.regs.f = flags;
                16
            }

            // JP HL
            0xE9 => {
                self.regs.pc = self.regs.hl();
                4
            }

            // LD (nn), A / LD A, (nn)
            0xEA => {
                let nn = self.fetch16(bus);
                bus.write(nn, self.regs.a);
                16
            }
            0xFA => {
                let nn = self.fetch16(bus);
                self.regs.a = bus.read(nn);
                16
            }

            // DI — immediate; also cancels a pending EI
            0xF3 => {
                self.regs.ime = false;
                self.clear_ei_pending();
                4
            }

            // EI — takes effect after the following instruction
            0xFB => {
                self.set_ei_pending();
                4
            }

            // LD HL, SP+e
            0xF8 => {
                let e = self.fetch8(bus) as i8;
                let (value, flags) = alu::add_sp(self.regs.sp, e);
                self.regs.set_hl(value);
                self.regs.f = flags;
                12
            }

            // LD SP, HL
            0xF9 => {
                self.regs.sp = self.regs.hl();
                8
            }

            // The eleven holes in the opcode table
            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                return Err(StepError::IllegalOpcode { opcode, pc });
            }
        };

        Ok(cycles)
    }

    /// Arithmetic/logic group dispatch on A by 3-bit operation index.
    fn alu_a(&mut self, op: u8, value: u8) {
        let carry = self.regs.f & CF != 0;
        let result = match op & 7 {
            0 => alu::add8(self.regs.a, value, false),
            1 => alu::add8(self.regs.a, value, carry),
            2 => alu::sub8(self.regs.a, value, false),
            3 => alu::sub8(self.regs.a, value, carry),
            4 => alu::and8(self.regs.a, value),
            5 => alu::xor8(self.regs.a, value),
            6 => alu::or8(self.regs.a, value),
            // CP: flags only, A unchanged
            _ => {
                let result = alu::sub8(self.regs.a, value, false);
                self.regs.f = result.flags;
                return;
            }
        };
        self.regs.a = result.value;
        self.regs.f = result.flags;
    }

    /// Execute one CB-prefixed opcode. Returns total T-cycles including
    /// the prefix fetch.
    fn execute_cb<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let opcode = self.fetch8(bus);
        let r = opcode & 7;
        let bit = (opcode >> 3) & 7;

        match opcode >> 6 {
            // Rotates and shifts
            0 => {
                let value = self.read_r8(bus, r);
                let carry = self.regs.f & CF != 0;
                let result = match bit {
                    0 => alu::rlc8(value),
                    1 => alu::rrc8(value),
                    2 => alu::rl8(value, carry),
                    3 => alu::rr8(value, carry),
                    4 => alu::sla8(value),
                    5 => alu::sra8(value),
                    6 => alu::swap8(value),
                    _ => alu::srl8(value),
                };
                self.write_r8(bus, r, result.value);
                self.regs.f = result.flags;
                if r == 6 { 16 } else { 8 }
            }

            // BIT b, r — Z from the tested bit, C preserved
            1 => {
                let value = self.read_r8(bus, r);
                let mut flags = (self.regs.f & CF) | HF;
                if value & (1 << bit) == 0 {
                    flags |= ZF;
                }
                self.regs.f = flags;
                if r == 6 { 12 } else { 8 }
            }

            // RES b, r
            2 => {
                let value = self.read_r8(bus, r) & !(1 << bit);
                self.write_r8(bus, r, value);
                if r == 6 { 16 } else { 8 }
            }

            // SET b, r
            _ => {
                let value = self.read_r8(bus, r) | (1 << bit);
                self.write_r8(bus, r, value);
                if r == 6 { 16 } else { 8 }
            }
        }
    }
}
