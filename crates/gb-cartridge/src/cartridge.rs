//! Cartridge bank-switching controllers.
//!
//! Five mutually incompatible protocols share one interface: four entry
//! points partition cartridge-space accesses by fixed-bank vs switchable
//! window and read vs write, plus the external RAM window pair. Banking
//! state lives in a tagged enum matched inside the entry points; every
//! state-changing write ends in `update_banking()`, which recomputes the
//! cached effective byte offsets for the switchable windows.

use core::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::header::{CartridgeHeader, CgbSupport, LogoPolicy, MIN_ROM_LEN, RAM_BANK_SIZE, ROM_BANK_SIZE};
use crate::rtc::RealTimeClock;

/// MBC2 carries a fixed 512 half-byte RAM internally, regardless of the
/// header's RAM size code.
const MBC2_RAM_LEN: usize = 512;

/// Load-time failure. Construction never yields a partial cartridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    /// Image too short to contain a header.
    RomTooShort(usize),
    /// Header mapper-type code this core does not implement.
    UnsupportedMapper(u8),
    /// CGB-only cartridge loaded on a machine without color mode.
    CgbOnly,
    /// Logo bitmap does not match the boot ROM constant.
    LogoMismatch,
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomTooShort(len) => {
                write!(f, "ROM image too short for a header: {len} bytes (need {MIN_ROM_LEN})")
            }
            Self::UnsupportedMapper(code) => write!(f, "unsupported mapper type {code:#04X}"),
            Self::CgbOnly => write!(f, "cartridge requires CGB hardware"),
            Self::LogoMismatch => write!(f, "header logo bitmap is invalid"),
        }
    }
}

impl std::error::Error for CartridgeError {}

/// What the A000-BFFF window resolves to on MBC3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mbc3Target {
    Ram(u8),
    Clock(u8),
}

/// Variant-specific banking state.
#[derive(Debug)]
enum Mbc {
    /// No controller: fixed 32 KiB, all writes ignored.
    None,
    /// 5-bit/2-bit split with a ROM/RAM banking mode flag.
    Mbc1 { bank_lo: u8, bank_hi: u8, ram_mode: bool },
    /// 4-bit bank select, address bit 8 disambiguates the low window.
    Mbc2,
    /// 7-bit bank, RAM bank or clock register behind the RAM window.
    Mbc3 { target: Mbc3Target, rtc: Option<RealTimeClock> },
    /// 9-bit bank via two sub-windows; bank 0 is selectable.
    Mbc5,
}

/// Load options supplied by the host.
#[derive(Debug, Default)]
pub struct CartridgeOptions {
    /// Whether the machine runs in color mode (gates CGB-only carts).
    pub color_mode: bool,
    /// Fail or tolerate a bad logo bitmap.
    pub logo_policy: LogoPolicy,
    /// Persisted external RAM contents from a previous run.
    pub external_ram: Option<Vec<u8>>,
    /// Unix timestamp of the persisted RAM file; seeds the RTC so it kept
    /// ticking while the emulator was off. Defaults to the current time.
    pub ram_timestamp: Option<u64>,
}

/// A loaded cartridge: ROM and RAM buffers plus per-mapper banking state.
#[derive(Debug)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    header: CartridgeHeader,
    mbc: Mbc,

    ram_enabled: bool,
    /// Up to 9 bits on MBC5.
    rom_bank: u16,
    ram_bank: u8,

    /// Cached effective byte offsets for the switchable windows,
    /// recomputed by `update_banking()` after every state-changing write.
    romn_offset: usize,
    ramn_offset: usize,
}

impl Cartridge {
    /// Construct a cartridge from a raw image.
    ///
    /// # Errors
    ///
    /// Fails on a short image, an unsupported mapper code, a CGB-only
    /// cartridge outside color mode, or (under [`LogoPolicy::Strict`])
    /// a logo mismatch. Failure never yields a partial cartridge.
    pub fn new(rom: Vec<u8>, options: CartridgeOptions) -> Result<Self, CartridgeError> {
        let header =
            CartridgeHeader::parse(&rom).ok_or(CartridgeError::RomTooShort(rom.len()))?;

        if header.cgb == CgbSupport::CgbOnly && !options.color_mode {
            return Err(CartridgeError::CgbOnly);
        }
        if !header.logo_valid && options.logo_policy == LogoPolicy::Strict {
            return Err(CartridgeError::LogoMismatch);
        }

        let now = || {
            options.ram_timestamp.unwrap_or_else(|| {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| d.as_secs())
            })
        };

        let mbc = match header.mapper_code {
            0x00 | 0x08 | 0x09 => Mbc::None,
            0x01..=0x03 => Mbc::Mbc1 { bank_lo: 1, bank_hi: 0, ram_mode: false },
            0x05 | 0x06 => Mbc::Mbc2,
            0x0F | 0x10 => Mbc::Mbc3 {
                target: Mbc3Target::Ram(0),
                rtc: Some(RealTimeClock::new(now())),
            },
            0x11..=0x13 => Mbc::Mbc3 { target: Mbc3Target::Ram(0), rtc: None },
            0x19..=0x1E => Mbc::Mbc5,
            code => return Err(CartridgeError::UnsupportedMapper(code)),
        };

        let ram_len = if matches!(mbc, Mbc::Mbc2) {
            MBC2_RAM_LEN
        } else {
            header.ram_len()
        };
        let mut ram = options.external_ram.unwrap_or_default();
        ram.resize(ram_len, 0);

        let mut cart = Self {
            rom,
            ram,
            header,
            mbc,
            ram_enabled: false,
            rom_bank: 1,
            ram_bank: 0,
            romn_offset: ROM_BANK_SIZE,
            ramn_offset: 0,
        };
        cart.update_banking();
        Ok(cart)
    }

    /// Parsed header, immutable after load.
    #[must_use]
    pub const fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    /// External RAM contents, for persistence.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    // === The addressed entry points ===

    /// Read from the fixed ROM window (0000-3FFF).
    #[must_use]
    pub fn read_rom0(&self, addr: u16) -> u8 {
        self.rom[addr as usize % self.rom.len()]
    }

    /// Read from the switchable ROM window (4000-7FFF).
    #[must_use]
    pub fn read_romn(&self, addr: u16) -> u8 {
        let offset = self.romn_offset + (addr as usize & (ROM_BANK_SIZE - 1));
        self.rom[offset % self.rom.len()]
    }

    /// Write into the fixed ROM window: mapper control registers.
    pub fn write_rom0(&mut self, addr: u16, value: u8) {
        match &mut self.mbc {
            Mbc::None => {}
            Mbc::Mbc1 { bank_lo, .. } => {
                if addr < 0x2000 {
                    self.ram_enabled = value & 0x0F == 0x0A;
                } else {
                    *bank_lo = value & 0x1F;
                }
            }
            Mbc::Mbc2 => {
                // One address bit picks the register: bit 8 clear toggles
                // RAM enable, set selects the ROM bank.
                if addr & 0x0100 == 0 {
                    self.ram_enabled = value & 0x0F == 0x0A;
                } else {
                    self.rom_bank = u16::from(value & 0x0F).max(1);
                }
            }
            Mbc::Mbc3 { .. } => {
                if addr < 0x2000 {
                    self.ram_enabled = value & 0x0F == 0x0A;
                } else {
                    self.rom_bank = u16::from(value & 0x7F).max(1);
                }
            }
            Mbc::Mbc5 => match addr {
                0x0000..=0x1FFF => self.ram_enabled = value & 0x0F == 0x0A,
                0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | u16::from(value),
                _ => self.rom_bank = (self.rom_bank & 0x00FF) | (u16::from(value & 1) << 8),
            },
        }
        self.update_banking();
    }

    /// Write into the switchable ROM window: mapper control registers.
    pub fn write_romn(&mut self, addr: u16, value: u8) {
        match &mut self.mbc {
            Mbc::None | Mbc::Mbc2 => {}
            Mbc::Mbc1 { bank_hi, ram_mode, .. } => {
                if addr < 0x6000 {
                    *bank_hi = value & 0x03;
                } else {
                    *ram_mode = value & 1 != 0;
                }
            }
            Mbc::Mbc3 { target, .. } => {
                if addr < 0x6000 {
                    // 0-3 selects a RAM bank; 8-C maps a clock register
                    // into the RAM window instead.
                    *target = if value >= 0x08 {
                        Mbc3Target::Clock(value)
                    } else {
                        Mbc3Target::Ram(value & 0x03)
                    };
                } else {
                    // Latch trigger: acknowledged, nothing to do in the
                    // live-readout clock model.
                }
            }
            Mbc::Mbc5 => {
                if addr < 0x6000 {
                    self.ram_bank = value & 0x0F;
                }
            }
        }
        self.update_banking();
    }

    /// Read from the external RAM window (A000-BFFF).
    ///
    /// Disabled or absent RAM reads as zero; guest software expects
    /// malformed accesses to degrade, not crash.
    #[must_use]
    pub fn read_ram(&mut self, addr: u16) -> u8 {
        if !self.ram_enabled {
            return 0;
        }
        match &mut self.mbc {
            Mbc::Mbc2 => {
                // 512 half-byte cells, address wraps
                self.ram[addr as usize % MBC2_RAM_LEN]
            }
            Mbc::Mbc3 { target: Mbc3Target::Clock(reg), rtc } => {
                let reg = *reg;
                rtc.as_mut().map_or(0, |rtc| rtc.read(reg, unix_now()))
            }
            _ => {
                let offset = self.ramn_offset + (addr as usize & (RAM_BANK_SIZE - 1));
                self.ram.get(offset).copied().unwrap_or(0)
            }
        }
    }

    /// Write into the external RAM window (A000-BFFF).
    pub fn write_ram(&mut self, addr: u16, value: u8) {
        if !self.ram_enabled {
            return;
        }
        match &mut self.mbc {
            Mbc::Mbc2 => {
                // Cells store only the low 4 bits of any written value
                self.ram[addr as usize % MBC2_RAM_LEN] = value & 0x0F;
            }
            Mbc::Mbc3 { target: Mbc3Target::Clock(reg), rtc } => {
                let reg = *reg;
                if let Some(rtc) = rtc.as_mut() {
                    rtc.write(reg, value, unix_now());
                }
            }
            _ => {
                let offset = self.ramn_offset + (addr as usize & (RAM_BANK_SIZE - 1));
                if let Some(cell) = self.ram.get_mut(offset) {
                    *cell = value;
                }
            }
        }
    }

    /// Recompute the cached effective offsets from the banking state.
    ///
    /// Bank 0 is remapped to 1 where the hardware forbids selecting it,
    /// and every index is taken modulo the header-declared bank count so
    /// oversized selects from malformed software wrap instead of pointing
    /// out of range. Idempotent: calling twice without an intervening
    /// write yields identical offsets.
    fn update_banking(&mut self) {
        let rom_banks = self.header.rom_banks();

        let (rom_bank, ram_bank) = match &self.mbc {
            Mbc::None => (1, 0),
            Mbc::Mbc1 { bank_lo, bank_hi, ram_mode } => {
                if *ram_mode {
                    // RAM banking: only the 5-bit bank reaches the ROM
                    // window, the 2-bit value selects the RAM bank.
                    let mut bank = usize::from(*bank_lo);
                    if bank == 0 {
                        bank = 1;
                    }
                    (bank, usize::from(*bank_hi))
                } else {
                    let mut bank = usize::from(*bank_hi) << 5 | usize::from(*bank_lo);
                    // 0x00/0x20/0x40/0x60 may never select: next bank up
                    if bank & 0x1F == 0 {
                        bank += 1;
                    }
                    (bank, 0)
                }
            }
            Mbc::Mbc2 | Mbc::Mbc3 { .. } => (usize::from(self.rom_bank), 0),
            Mbc::Mbc5 => (usize::from(self.rom_bank), usize::from(self.ram_bank)),
        };

        self.romn_offset = (rom_bank % rom_banks.max(1)) * ROM_BANK_SIZE;

        let ram_bank = match &self.mbc {
            Mbc::Mbc3 { target: Mbc3Target::Ram(bank), .. } => usize::from(*bank),
            _ => ram_bank,
        };
        let ram_banks = self.header.ram_banks();
        self.ramn_offset = if ram_banks == 0 {
            0
        } else {
            (ram_bank % ram_banks) * RAM_BANK_SIZE
        };
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::NINTENDO_LOGO;

    /// Build a ROM whose every bank is stamped with its own index so
    /// bank-switch tests can see exactly which bank a read hit.
    fn stamped_rom(mapper: u8, rom_size_code: u8, ram_size_code: u8) -> Vec<u8> {
        let banks = 2usize << rom_size_code;
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        for bank in 0..banks {
            for b in rom[bank * ROM_BANK_SIZE..(bank + 1) * ROM_BANK_SIZE].iter_mut() {
                *b = bank as u8;
            }
        }
        rom[0x104..0x134].copy_from_slice(&NINTENDO_LOGO);
        rom[0x147] = mapper;
        rom[0x148] = rom_size_code;
        rom[0x149] = ram_size_code;
        rom
    }

    fn load(mapper: u8, rom_size_code: u8, ram_size_code: u8) -> Cartridge {
        Cartridge::new(stamped_rom(mapper, rom_size_code, ram_size_code), CartridgeOptions::default())
            .unwrap()
    }

    #[test]
    fn rom_only_loads_and_ignores_writes() {
        let mut cart = load(0x00, 0x00, 0x00);
        assert_eq!(cart.read_rom0(0x0000), 0);
        assert_eq!(cart.read_romn(0x4000), 1);

        cart.write_rom0(0x2000, 0x55);
        cart.write_romn(0x6000, 0x55);
        assert_eq!(cart.read_rom0(0x2000), 0);
        assert_eq!(cart.read_romn(0x4000), 1);

        // No RAM: reads are zero, writes vanish
        cart.write_ram(0xA000, 0xAB);
        assert_eq!(cart.read_ram(0xA000), 0);
    }

    #[test]
    fn load_failures_are_fatal() {
        assert_eq!(
            Cartridge::new(vec![0; 0x40], CartridgeOptions::default()).unwrap_err(),
            CartridgeError::RomTooShort(0x40)
        );

        let mut rom = stamped_rom(0x00, 0x00, 0x00);
        rom[0x147] = 0xFC; // Pocket Camera
        assert_eq!(
            Cartridge::new(rom, CartridgeOptions::default()).unwrap_err(),
            CartridgeError::UnsupportedMapper(0xFC)
        );

        let mut rom = stamped_rom(0x00, 0x00, 0x00);
        rom[0x143] = 0xC0;
        assert_eq!(
            Cartridge::new(rom, CartridgeOptions::default()).unwrap_err(),
            CartridgeError::CgbOnly
        );
        let mut rom = stamped_rom(0x00, 0x00, 0x00);
        rom[0x143] = 0xC0;
        let options = CartridgeOptions { color_mode: true, ..CartridgeOptions::default() };
        assert!(Cartridge::new(rom, options).is_ok());

        let mut rom = stamped_rom(0x00, 0x00, 0x00);
        rom[0x104] = 0x00;
        assert_eq!(
            Cartridge::new(rom.clone(), CartridgeOptions::default()).unwrap_err(),
            CartridgeError::LogoMismatch
        );
        // The documented relaxation is an explicit opt-in
        let options = CartridgeOptions { logo_policy: LogoPolicy::Allow, ..CartridgeOptions::default() };
        assert!(Cartridge::new(rom, options).is_ok());
    }

    #[test]
    fn mbc1_bank_switching() {
        // 1 MiB = 64 banks
        let mut cart = load(0x01, 0x05, 0x03);

        cart.write_rom0(0x2000, 0x02);
        assert_eq!(cart.read_romn(0x4000), 2);

        // High 2 bits come from the second window in ROM mode
        cart.write_rom0(0x2000, 0x01);
        cart.write_romn(0x4000, 0x01);
        assert_eq!(cart.read_romn(0x4000), 0x21);

        // Forbidden bank values bump to the next bank up
        cart.write_rom0(0x2000, 0x00);
        assert_eq!(cart.read_romn(0x4000), 0x21); // 0x20 -> 0x21
        cart.write_romn(0x4000, 0x00);
        assert_eq!(cart.read_romn(0x4000), 0x01); // 0x00 -> 0x01
    }

    #[test]
    fn mbc1_ram_mode_switches_ram_banks() {
        let mut cart = load(0x03, 0x02, 0x03);

        cart.write_rom0(0x0000, 0x0A); // enable RAM
        cart.write_romn(0x6000, 0x01); // RAM banking mode

        cart.write_romn(0x4000, 0x00);
        cart.write_ram(0xA000, 0x11);
        cart.write_romn(0x4000, 0x02);
        cart.write_ram(0xA000, 0x22);

        cart.write_romn(0x4000, 0x00);
        assert_eq!(cart.read_ram(0xA000), 0x11);
        cart.write_romn(0x4000, 0x02);
        assert_eq!(cart.read_ram(0xA000), 0x22);
    }

    #[test]
    fn mbc1_ram_disabled_reads_zero() {
        let mut cart = load(0x03, 0x02, 0x03);
        cart.write_ram(0xA000, 0x77);
        assert_eq!(cart.read_ram(0xA000), 0);

        cart.write_rom0(0x0000, 0x0A);
        cart.write_ram(0xA000, 0x77);
        assert_eq!(cart.read_ram(0xA000), 0x77);

        // Anything but 0x0A disables again
        cart.write_rom0(0x0000, 0x00);
        assert_eq!(cart.read_ram(0xA000), 0);
    }

    #[test]
    fn mbc1_bank_index_wraps_to_declared_count() {
        // 128 KiB = 8 banks; selecting bank 0x13 must wrap to 0x13 % 8 = 3
        let mut cart = load(0x01, 0x02, 0x00);
        cart.write_rom0(0x2000, 0x13);
        assert_eq!(cart.read_romn(0x4000), 3);
    }

    #[test]
    fn mbc2_address_bit_disambiguates() {
        let mut cart = load(0x05, 0x02, 0x00);

        // Bit 8 set: bank select, not RAM enable
        cart.write_rom0(0x0100, 0x03);
        assert_eq!(cart.read_romn(0x4000), 3);
        assert_eq!(cart.read_ram(0xA000), 0); // still disabled

        // Bit 8 clear: RAM enable
        cart.write_rom0(0x0000, 0x0A);
        cart.write_ram(0xA000, 0xFF);
        // Cells hold only the low 4 bits
        assert_eq!(cart.read_ram(0xA000), 0x0F);
        // 512-cell window wraps
        assert_eq!(cart.read_ram(0xA200), 0x0F);

        // Bank 0 select bumps to 1
        cart.write_rom0(0x0100, 0x00);
        assert_eq!(cart.read_romn(0x4000), 1);
    }

    #[test]
    fn mbc3_ram_banks_and_clock_share_the_window() {
        // 4 MiB = 256 banks, enough for the full 7-bit select range
        let mut cart = load(0x10, 0x07, 0x03);
        cart.write_rom0(0x0000, 0x0A);

        cart.write_rom0(0x2000, 0x45);
        assert_eq!(cart.read_romn(0x4000), 0x45);

        cart.write_romn(0x4000, 0x02);
        cart.write_ram(0xA000, 0x5A);
        assert_eq!(cart.read_ram(0xA000), 0x5A);

        // Values >= 8 map the clock registers into the window
        cart.write_romn(0x4000, 0x0C);
        let flags = cart.read_ram(0xA000);
        assert_eq!(flags & 0x3E, 0); // fresh clock: no halt, no carry

        // Latch trigger is acknowledged without effect
        cart.write_romn(0x6000, 0x00);
        cart.write_romn(0x6000, 0x01);

        // Back to RAM
        cart.write_romn(0x4000, 0x02);
        assert_eq!(cart.read_ram(0xA000), 0x5A);
    }

    #[test]
    fn mbc5_nine_bit_bank_and_bank_zero() {
        // 4 MiB = 256 banks; 9th bit exercised modulo the count
        let mut cart = load(0x19, 0x07, 0x03);

        cart.write_rom0(0x2000, 0x42);
        assert_eq!(cart.read_romn(0x4000), 0x42);

        // Bank 0 is legal on MBC5
        cart.write_rom0(0x2000, 0x00);
        assert_eq!(cart.read_romn(0x4000), 0x00);

        // High bit write lands in bit 8
        cart.write_rom0(0x2000, 0x05);
        cart.write_rom0(0x3000, 0x01);
        // 0x105 % 256 banks = 5
        assert_eq!(cart.read_romn(0x4000), 0x05);

        cart.write_rom0(0x0000, 0x0A);
        cart.write_romn(0x4000, 0x01);
        cart.write_ram(0xA000, 0x31);
        cart.write_romn(0x4000, 0x00);
        cart.write_ram(0xA000, 0x13);
        cart.write_romn(0x4000, 0x01);
        assert_eq!(cart.read_ram(0xA000), 0x31);
    }

    #[test]
    fn update_banking_is_idempotent() {
        let mut cart = load(0x01, 0x05, 0x03);
        cart.write_rom0(0x2000, 0x07);
        let offsets = (cart.romn_offset, cart.ramn_offset);
        cart.update_banking();
        assert_eq!((cart.romn_offset, cart.ramn_offset), offsets);
        cart.update_banking();
        assert_eq!((cart.romn_offset, cart.ramn_offset), offsets);
    }

    #[test]
    fn external_ram_seed_is_loaded() {
        let mut rom = stamped_rom(0x03, 0x02, 0x02);
        rom[0x147] = 0x03;
        let seed = vec![0xA5; 0x2000];
        let options = CartridgeOptions {
            external_ram: Some(seed),
            ..CartridgeOptions::default()
        };
        let mut cart = Cartridge::new(rom, options).unwrap();
        cart.write_rom0(0x0000, 0x0A);
        assert_eq!(cart.read_ram(0xA123), 0xA5);
    }
}
