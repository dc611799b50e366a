//! SM83 register set.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

use crate::flags::FLAG_MASK;

/// Hardware model the core boots as.
///
/// The two models differ only in the documented post-boot register values
/// (CGB identifies itself through A) and in which memory-mapped registers
/// the bus honors; the instruction set is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    Dmg,
    Cgb,
}

/// SM83 registers snapshot for observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub sp: u16,
    pub pc: u16,

    /// Interrupt master enable.
    pub ime: bool,
}

impl Registers {
    /// Documented post-boot values, as left by the boot ROM.
    #[must_use]
    pub const fn power_on(model: Model) -> Self {
        Self {
            a: match model {
                Model::Dmg => 0x01,
                Model::Cgb => 0x11,
            },
            f: 0xB0,
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
            ime: false,
        }
    }

    /// Get AF register pair.
    #[must_use]
    pub const fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    /// Get BC register pair.
    #[must_use]
    pub const fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    /// Get DE register pair.
    #[must_use]
    pub const fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    /// Get HL register pair.
    #[must_use]
    pub const fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    /// Set AF register pair. The low nibble of F does not exist and is
    /// dropped.
    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.f = value as u8 & FLAG_MASK;
    }

    /// Set BC register pair.
    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    /// Set DE register pair.
    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    /// Set HL register pair.
    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }
}
