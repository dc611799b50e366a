//! Game Boy (DMG/CGB) system core.
//!
//! Wires the SM83 CPU, the cartridge controller, and the on-board memory
//! together behind a single address bus. The CPU runs at 4,194,304 Hz on
//! DMG; all instruction timings are counted in T-cycles of that clock.
//!
//! Peripherals (and host frontends) raise interrupts through a shared
//! [`InterruptLine`], which is safe to clone out to other threads.

mod bus;
mod config;
mod gameboy;
mod interrupt;

pub use bus::GbBus;
pub use config::GbConfig;
pub use gameboy::GameBoy;
pub use interrupt::{Interrupt, InterruptLine};

pub use gb_cartridge::{Cartridge, CartridgeError, LogoPolicy};
pub use sharp_sm83::{Model, StepError};
