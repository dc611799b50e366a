//! Cartridge header parsing.
//!
//! The header lives at ROM offset 0x100: entry point, the 48-byte logo
//! bitmap the boot ROM checksums, title, CGB support flag, mapper type,
//! and the ROM/RAM size codes everything else is derived from.

use core::fmt;

/// The 48-byte logo bitmap every licensed cartridge carries at 0x104.
/// The boot ROM refuses to start a cartridge whose copy differs.
pub const NINTENDO_LOGO: [u8; 48] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99,
    0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
];

const OFFSET_LOGO: usize = 0x104;
const OFFSET_TITLE: usize = 0x134;
const OFFSET_CGB_FLAG: usize = 0x143;
const OFFSET_MAPPER: usize = 0x147;
const OFFSET_ROM_SIZE: usize = 0x148;
const OFFSET_RAM_SIZE: usize = 0x149;

/// Minimum length that makes a header readable at all.
pub(crate) const MIN_ROM_LEN: usize = 0x150;

/// One ROM bank is 16 KiB; the fixed and switchable windows are one each.
pub(crate) const ROM_BANK_SIZE: usize = 0x4000;
/// One external RAM bank fills the 8 KiB A000-BFFF window.
pub(crate) const RAM_BANK_SIZE: usize = 0x2000;

/// CGB support declared by the header byte at 0x143.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgbSupport {
    /// Plain DMG cartridge.
    None,
    /// Runs on both DMG and CGB (0x80).
    Both,
    /// CGB only (0xC0); refuses to load in non-color mode.
    CgbOnly,
}

/// Policy for a logo bitmap that fails the checksum.
///
/// Real hardware fails hard; loaders that want to run homebrew with a
/// scribbled-over logo may explicitly opt out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoPolicy {
    #[default]
    Strict,
    Allow,
}

/// Parsed cartridge header. Immutable after load.
#[derive(Debug, Clone)]
pub struct CartridgeHeader {
    pub title: String,
    pub cgb: CgbSupport,
    pub mapper_code: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    pub logo_valid: bool,
}

impl CartridgeHeader {
    /// Parse the header from a full ROM image.
    ///
    /// Returns `None` if the image is too short to contain a header.
    #[must_use]
    pub fn parse(rom: &[u8]) -> Option<Self> {
        if rom.len() < MIN_ROM_LEN {
            return None;
        }

        let title_bytes = &rom[OFFSET_TITLE..OFFSET_TITLE + 15];
        let title = title_bytes
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect();

        let cgb = match rom[OFFSET_CGB_FLAG] {
            0x80 => CgbSupport::Both,
            0xC0 => CgbSupport::CgbOnly,
            _ => CgbSupport::None,
        };

        Some(Self {
            title,
            cgb,
            mapper_code: rom[OFFSET_MAPPER],
            rom_size_code: rom[OFFSET_ROM_SIZE],
            ram_size_code: rom[OFFSET_RAM_SIZE],
            logo_valid: rom[OFFSET_LOGO..OFFSET_LOGO + 48] == NINTENDO_LOGO,
        })
    }

    /// Number of 16 KiB ROM banks declared by the size code (32 KiB << code).
    #[must_use]
    pub fn rom_banks(&self) -> usize {
        2usize << self.rom_size_code.min(8)
    }

    /// Declared external RAM size in bytes. MBC2 carts declare zero here
    /// and carry their fixed 512 half-bytes internally instead.
    #[must_use]
    pub const fn ram_len(&self) -> usize {
        match self.ram_size_code {
            0x01 => 0x800,
            0x02 => RAM_BANK_SIZE,
            0x03 => 4 * RAM_BANK_SIZE,
            0x04 => 16 * RAM_BANK_SIZE,
            0x05 => 8 * RAM_BANK_SIZE,
            _ => 0,
        }
    }

    /// Number of full 8 KiB RAM banks (a 2 KiB cart still counts as one).
    #[must_use]
    pub const fn ram_banks(&self) -> usize {
        let len = self.ram_len();
        if len == 0 {
            0
        } else {
            len.div_ceil(RAM_BANK_SIZE)
        }
    }
}

impl fmt::Display for CartridgeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} mapper {:#04X}, {} KiB ROM, {} KiB RAM",
            self.title,
            self.mapper_code,
            self.rom_banks() * ROM_BANK_SIZE / 1024,
            self.ram_len() / 1024,
        )
    }
}
