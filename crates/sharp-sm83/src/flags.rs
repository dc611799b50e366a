//! SM83 flag register bits.
//!
//! Only the high nibble of F exists in silicon; the low nibble always
//! reads back as zero.

/// Zero flag (bit 7) - set if the masked result is zero.
pub const ZF: u8 = 0b1000_0000;

/// Subtract flag (bit 6) - set if the last operation was a subtraction.
pub const NF: u8 = 0b0100_0000;

/// Half-carry flag (bit 4 of the byte, bit 5 of F) - carry from bit 3 to bit 4.
pub const HF: u8 = 0b0010_0000;

/// Carry flag (bit 4) - carry out of bit 7 (bit 15 for 16-bit adds).
pub const CF: u8 = 0b0001_0000;

/// Mask of the bits that physically exist in F.
pub const FLAG_MASK: u8 = ZF | NF | HF | CF;
