//! ALU operations for the SM83.
//!
//! Every helper returns the result value together with a complete flags
//! byte; callers merge in whichever flags the instruction preserves.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

use crate::flags::{CF, HF, NF, ZF};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// Add two bytes with optional carry-in.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let value = wide as u8;

    let mut flags = 0;
    if value == 0 {
        flags |= ZF;
    }
    // Half-carry: carry out of bit 3 of the nibble-wise sum
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        flags |= HF;
    }
    // Carry: bit 8 of the unmasked sum
    if wide > 0xFF {
        flags |= CF;
    }

    AluResult { value, flags }
}

/// Subtract two bytes with optional borrow-in.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = NF;
    if value == 0 {
        flags |= ZF;
    }
    // Half-carry: borrow from bit 4
    if (a & 0x0F) < (b & 0x0F) + c {
        flags |= HF;
    }
    // Carry: byte-level borrow
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CF;
    }

    AluResult { value, flags }
}

/// AND operation. Half-carry is always set.
#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    let flags = if value == 0 { ZF | HF } else { HF };
    AluResult { value, flags }
}

/// OR operation.
#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    let flags = if value == 0 { ZF } else { 0 };
    AluResult { value, flags }
}

/// XOR operation.
#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    let flags = if value == 0 { ZF } else { 0 };
    AluResult { value, flags }
}

/// Increment. Carry is unaffected; the caller preserves it.
#[must_use]
pub fn inc8(v: u8) -> AluResult {
    let value = v.wrapping_add(1);
    let mut flags = 0;
    if value == 0 {
        flags |= ZF;
    }
    if (v & 0x0F) + 1 > 0x0F {
        flags |= HF;
    }
    AluResult { value, flags }
}

/// Decrement. Carry is unaffected; the caller preserves it.
#[must_use]
pub fn dec8(v: u8) -> AluResult {
    let value = v.wrapping_sub(1);
    let mut flags = NF;
    if value == 0 {
        flags |= ZF;
    }
    if v & 0x0F == 0 {
        flags |= HF;
    }
    AluResult { value, flags }
}

/// 16-bit add for ADD HL,rr. Returns the result and the N/H/C flags;
/// Z is preserved by the caller.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let value = a.wrapping_add(b);

    let mut flags = 0;
    // Half-carry: carry from bit 11 to bit 12
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    // Carry: bit 16 of the unmasked sum
    if u32::from(a) + u32::from(b) > 0xFFFF {
        flags |= CF;
    }

    (value, flags)
}

/// Signed displacement add for ADD SP,e and LD HL,SP+e.
///
/// H and C come from the unsigned add of the displacement byte to the low
/// byte of SP; Z and N are always clear.
#[must_use]
pub fn add_sp(sp: u16, displacement: i8) -> (u16, u8) {
    let e = displacement as u8;
    let value = sp.wrapping_add(i16::from(displacement) as u16);

    let mut flags = 0;
    if (sp & 0x000F) + u16::from(e & 0x0F) > 0x000F {
        flags |= HF;
    }
    if (sp & 0x00FF) + u16::from(e) > 0x00FF {
        flags |= CF;
    }

    (value, flags)
}

/// Decimal adjust after addition/subtraction.
///
/// Recombines the accumulator per the standard BCD correction table keyed
/// on the prior N/H/C flags and nibble values. Must match hardware
/// bit-for-bit; every flag output here is load-bearing.
#[must_use]
pub fn daa(a: u8, f: u8) -> AluResult {
    let mut value = a;
    let mut carry = f & CF != 0;

    if f & NF == 0 {
        // After addition: correct each nibble that overflowed its digit
        if f & HF != 0 || value & 0x0F > 0x09 {
            value = value.wrapping_add(0x06);
        }
        if carry || a > 0x99 {
            value = value.wrapping_add(0x60);
            carry = true;
        }
    } else {
        // After subtraction: only undo the borrow corrections
        if f & HF != 0 {
            value = value.wrapping_sub(0x06);
        }
        if carry {
            value = value.wrapping_sub(0x60);
        }
    }

    let mut flags = f & NF;
    if value == 0 {
        flags |= ZF;
    }
    if carry {
        flags |= CF;
    }

    AluResult { value, flags }
}

/// Rotate left circular.
#[must_use]
pub fn rlc8(v: u8) -> AluResult {
    let carry = v >> 7;
    let value = (v << 1) | carry;
    AluResult {
        value,
        flags: rot_flags(value, carry != 0),
    }
}

/// Rotate left through carry.
#[must_use]
pub fn rl8(v: u8, carry_in: bool) -> AluResult {
    let carry = v >> 7;
    let value = (v << 1) | u8::from(carry_in);
    AluResult {
        value,
        flags: rot_flags(value, carry != 0),
    }
}

/// Rotate right circular.
#[must_use]
pub fn rrc8(v: u8) -> AluResult {
    let carry = v & 1;
    let value = (v >> 1) | (carry << 7);
    AluResult {
        value,
        flags: rot_flags(value, carry != 0),
    }
}

/// Rotate right through carry.
#[must_use]
pub fn rr8(v: u8, carry_in: bool) -> AluResult {
    let carry = v & 1;
    let value = (v >> 1) | (u8::from(carry_in) << 7);
    AluResult {
        value,
        flags: rot_flags(value, carry != 0),
    }
}

/// Shift left arithmetic.
#[must_use]
pub fn sla8(v: u8) -> AluResult {
    let carry = v >> 7;
    let value = v << 1;
    AluResult {
        value,
        flags: rot_flags(value, carry != 0),
    }
}

/// Shift right arithmetic (bit 7 preserved).
#[must_use]
pub fn sra8(v: u8) -> AluResult {
    let carry = v & 1;
    let value = (v >> 1) | (v & 0x80);
    AluResult {
        value,
        flags: rot_flags(value, carry != 0),
    }
}

/// Shift right logical.
#[must_use]
pub fn srl8(v: u8) -> AluResult {
    let carry = v & 1;
    let value = v >> 1;
    AluResult {
        value,
        flags: rot_flags(value, carry != 0),
    }
}

/// Swap nibbles.
#[must_use]
pub fn swap8(v: u8) -> AluResult {
    let value = v.rotate_left(4);
    let flags = if value == 0 { ZF } else { 0 };
    AluResult { value, flags }
}

/// Common flags for the CB-table rotates and shifts: Z from the result,
/// N/H clear, C from the shifted-out bit. The accumulator forms (RLCA,
/// RLA, RRCA, RRA) additionally clear Z; the caller masks it off.
const fn rot_flags(value: u8, carry: bool) -> u8 {
    let mut flags = 0;
    if value == 0 {
        flags |= ZF;
    }
    if carry {
        flags |= CF;
    }
    flags
}
