//! Top-level Game Boy system.

use std::sync::Arc;

use emu_core::Ticks;
use gb_cartridge::{Cartridge, CartridgeError, CartridgeOptions};
use sharp_sm83::{Model, Registers, Sm83, StepError};

use crate::bus::GbBus;
use crate::config::GbConfig;
use crate::interrupt::InterruptLine;

/// Game Boy system.
#[derive(Debug)]
pub struct GameBoy {
    cpu: Sm83,
    bus: GbBus,
}

impl GameBoy {
    /// Create a new Game Boy from the given configuration.
    ///
    /// The CPU comes up in the documented post-boot state, with PC at the
    /// cartridge entry point (0x0100).
    ///
    /// # Errors
    ///
    /// Returns an error if the cartridge image is rejected.
    pub fn new(config: GbConfig) -> Result<Self, CartridgeError> {
        let cartridge = Cartridge::new(
            config.rom_data,
            CartridgeOptions {
                color_mode: matches!(config.model, Model::Cgb),
                logo_policy: config.logo_policy,
                external_ram: config.external_ram,
                ram_timestamp: config.ram_timestamp,
            },
        )?;

        Ok(Self {
            cpu: Sm83::new(config.model),
            bus: GbBus::new(cartridge, config.model),
        })
    }

    /// Execute one instruction (or service one interrupt) and advance
    /// the bus clock by the elapsed T-cycles.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] when the CPU fetches an undefined opcode.
    pub fn step(&mut self) -> Result<Ticks, StepError> {
        let ticks = self.cpu.step(&mut self.bus)?;
        self.bus.tick(ticks);
        Ok(ticks)
    }

    /// Run until at least `budget` T-cycles have elapsed.
    ///
    /// Returns the cycles actually executed, which may overshoot by up
    /// to one instruction.
    ///
    /// # Errors
    ///
    /// Stops and returns [`StepError`] when the CPU fetches an undefined
    /// opcode; cycles executed before the fault are lost to the caller.
    pub fn run_for(&mut self, budget: Ticks) -> Result<Ticks, StepError> {
        let mut elapsed = Ticks::ZERO;
        while elapsed < budget {
            elapsed += self.step()?;
        }
        Ok(elapsed)
    }

    /// Shared interrupt line, for peripherals and frontends.
    #[must_use]
    pub fn interrupts(&self) -> Arc<InterruptLine> {
        self.bus.interrupts()
    }

    /// CPU register snapshot.
    #[must_use]
    pub const fn registers(&self) -> Registers {
        self.cpu.registers()
    }

    /// True while the CPU sits in HALT or STOP.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    #[must_use]
    pub const fn bus(&self) -> &GbBus {
        &self.bus
    }

    #[must_use]
    pub fn bus_mut(&mut self) -> &mut GbBus {
        &mut self.bus
    }

    /// External cartridge RAM, for persistence.
    #[must_use]
    pub fn cartridge_ram(&self) -> &[u8] {
        self.bus.cartridge().ram()
    }
}
