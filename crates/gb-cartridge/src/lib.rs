//! Game Boy cartridge parser and mapper (MBC) implementations.
//!
//! Parses the 0x100-offset cartridge header and provides the bank-switching
//! controller behind the four cartridge-space windows: fixed ROM, switchable
//! ROM, and external RAM reads and writes. Supports ROM-only carts, MBC1,
//! MBC2, MBC3 (with battery-backed real-time clock), and MBC5.

mod cartridge;
mod header;
mod rtc;

pub use cartridge::{Cartridge, CartridgeError, CartridgeOptions};
pub use header::{CartridgeHeader, CgbSupport, LogoPolicy, NINTENDO_LOGO};
pub use rtc::RealTimeClock;
