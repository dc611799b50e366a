//! Game Boy address bus.
//!
//! Routes the 16-bit address space to the cartridge, video RAM, work
//! RAM, OAM, the I/O block, and high RAM. Addresses decode through a
//! fixed range ladder; a handful of I/O registers carry side effects
//! (DMA, DIV reset) handled inline.

#![allow(clippy::cast_possible_truncation)] // DIV exposes the counter's high byte.

use std::sync::Arc;

use emu_core::{Bus, Ticks};
use gb_cartridge::Cartridge;
use sharp_sm83::Model;

use crate::interrupt::InterruptLine;

const VRAM_BANK_SIZE: usize = 0x2000;
const WRAM_BANK_SIZE: usize = 0x1000;
const OAM_LEN: usize = 0xA0;

const REG_DIV: u16 = 0xFF04;
const REG_IF: u16 = 0xFF0F;
const REG_LY: u16 = 0xFF44;
const REG_DMA: u16 = 0xFF46;
const REG_KEY1: u16 = 0xFF4D;
const REG_VBK: u16 = 0xFF4F;
const REG_SVBK: u16 = 0xFF70;

/// System bus: on-board memory, I/O registers, and the cartridge.
#[derive(Debug)]
pub struct GbBus {
    cartridge: Cartridge,
    model: Model,

    /// Two banks on CGB; DMG uses only the first.
    vram: Box<[u8; 2 * VRAM_BANK_SIZE]>,
    /// Eight banks on CGB; DMG uses the first two.
    wram: Box<[u8; 8 * WRAM_BANK_SIZE]>,
    oam: [u8; OAM_LEN],
    hram: [u8; 0x7F],
    /// Plain backing store for registers without modeled behavior.
    io: [u8; 0x80],

    /// VBK low bit (CGB).
    vram_bank: u8,
    /// SVBK bank 1-7 (CGB); fixed at 1 on DMG.
    wram_bank: u8,

    /// Free-running counter behind DIV; the register reads its high byte.
    div_counter: u16,

    interrupts: Arc<InterruptLine>,
}

impl GbBus {
    #[must_use]
    pub fn new(cartridge: Cartridge, model: Model) -> Self {
        Self {
            cartridge,
            model,
            vram: Box::new([0; 2 * VRAM_BANK_SIZE]),
            wram: Box::new([0; 8 * WRAM_BANK_SIZE]),
            oam: [0; OAM_LEN],
            hram: [0; 0x7F],
            io: [0; 0x80],
            vram_bank: 0,
            wram_bank: 1,
            div_counter: 0,
            interrupts: Arc::new(InterruptLine::new()),
        }
    }

    /// Shared interrupt line, for peripherals and frontends.
    #[must_use]
    pub fn interrupts(&self) -> Arc<InterruptLine> {
        Arc::clone(&self.interrupts)
    }

    #[must_use]
    pub const fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    #[must_use]
    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }

    /// Advance the free-running DIV counter by elapsed T-cycles.
    pub fn tick(&mut self, ticks: Ticks) {
        self.div_counter = self.div_counter.wrapping_add(ticks.get() as u16);
    }

    /// Advance LY. The display collaborator owns scanline position; the
    /// bus only makes it readable (guest writes are ignored).
    pub fn set_scanline(&mut self, line: u8) {
        self.io[(REG_LY & 0x7F) as usize] = line;
    }

    const fn is_cgb(&self) -> bool {
        matches!(self.model, Model::Cgb)
    }

    fn read_io(&mut self, address: u16) -> u8 {
        match address {
            REG_DIV => (self.div_counter >> 8) as u8,
            REG_IF => 0xE0 | self.interrupts.flags(),
            REG_VBK if self.is_cgb() => 0xFE | self.vram_bank,
            REG_SVBK if self.is_cgb() => self.wram_bank,
            // Color-only registers read open-bus on DMG
            REG_KEY1 | REG_VBK | REG_SVBK | 0xFF51..=0xFF55 | 0xFF68..=0xFF6B
                if !self.is_cgb() =>
            {
                0xFF
            }
            _ => self.io[(address & 0x7F) as usize],
        }
    }

    fn write_io(&mut self, address: u16, value: u8) {
        match address {
            // Any write resets the whole internal counter, not just the
            // visible high byte.
            REG_DIV => self.div_counter = 0,
            REG_IF => self.interrupts.set_flags(value),
            REG_LY => {} // read-only
            REG_DMA => {
                self.io[(REG_DMA & 0x7F) as usize] = value;
                self.oam_dma(value);
            }
            REG_VBK if self.is_cgb() => self.vram_bank = value & 1,
            REG_SVBK if self.is_cgb() => {
                // Bank 0 selects bank 1
                self.wram_bank = if value & 7 == 0 { 1 } else { value & 7 };
            }
            REG_KEY1 | REG_VBK | REG_SVBK | 0xFF51..=0xFF55 | 0xFF68..=0xFF6B
                if !self.is_cgb() => {}
            _ => self.io[(address & 0x7F) as usize] = value,
        }
    }

    /// OAM DMA: copy 160 bytes from `source << 8` into OAM.
    ///
    /// The copy goes through `read()` so it sees banking, echo RAM, and
    /// the rest of the decode ladder exactly as the CPU would.
    fn oam_dma(&mut self, source: u8) {
        let base = u16::from(source) << 8;
        for i in 0..OAM_LEN as u16 {
            let byte = self.read(base.wrapping_add(i));
            self.oam[i as usize] = byte;
        }
    }

    fn vram_index(&self, address: u16) -> usize {
        usize::from(self.vram_bank) * VRAM_BANK_SIZE + (address as usize & (VRAM_BANK_SIZE - 1))
    }

    fn wram_index(&self, address: u16) -> usize {
        match address & 0x1FFF {
            // C000-CFFF is always bank 0
            offset @ 0x0000..=0x0FFF => offset as usize,
            offset => usize::from(self.wram_bank) * WRAM_BANK_SIZE + (offset as usize & 0x0FFF),
        }
    }
}

impl Bus for GbBus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => self.cartridge.read_rom0(address),
            0x4000..=0x7FFF => self.cartridge.read_romn(address),
            0x8000..=0x9FFF => self.vram[self.vram_index(address)],
            0xA000..=0xBFFF => self.cartridge.read_ram(address),
            0xC000..=0xDFFF => self.wram[self.wram_index(address)],
            // Echo RAM mirrors C000-DDFF
            0xE000..=0xFDFF => self.read(address - 0x2000),
            0xFE00..=0xFE9F => self.oam[(address - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0,
            0xFF00..=0xFF7F => self.read_io(address),
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize],
            0xFFFF => self.interrupts.enable(),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x3FFF => self.cartridge.write_rom0(address, value),
            0x4000..=0x7FFF => self.cartridge.write_romn(address, value),
            0x8000..=0x9FFF => {
                let index = self.vram_index(address);
                self.vram[index] = value;
            }
            0xA000..=0xBFFF => self.cartridge.write_ram(address, value),
            0xC000..=0xDFFF => {
                let index = self.wram_index(address);
                self.wram[index] = value;
            }
            0xE000..=0xFDFF => self.write(address - 0x2000, value),
            0xFE00..=0xFE9F => self.oam[(address - 0xFE00) as usize] = value,
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(address, value),
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize] = value,
            0xFFFF => self.interrupts.set_enable(value),
        }
    }

    fn pending_interrupts(&mut self) -> u8 {
        self.interrupts.pending()
    }

    fn acknowledge_interrupt(&mut self, bit: u8) {
        self.interrupts.acknowledge(bit);
    }

    fn wait_for_interrupt(&mut self) {
        self.interrupts.wait_until_pending();
    }

    fn wait_for_joypad(&mut self) {
        self.interrupts.wait_for_joypad();
    }
}
