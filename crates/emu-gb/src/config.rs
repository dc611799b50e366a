//! Machine configuration.

use gb_cartridge::LogoPolicy;
use sharp_sm83::Model;

/// Game Boy configuration.
pub struct GbConfig {
    /// Cartridge ROM image.
    pub rom_data: Vec<u8>,
    /// Hardware model. Defaults to the original DMG.
    pub model: Model,
    /// Header logo check policy.
    pub logo_policy: LogoPolicy,
    /// Persisted external RAM from a previous run.
    pub external_ram: Option<Vec<u8>>,
    /// Unix timestamp of the persisted RAM, used to roll the cartridge
    /// clock forward over the time the emulator was off.
    pub ram_timestamp: Option<u64>,
}

impl GbConfig {
    /// Configuration with defaults for everything but the ROM.
    #[must_use]
    pub fn new(rom_data: Vec<u8>) -> Self {
        Self {
            rom_data,
            model: Model::default(),
            logo_policy: LogoPolicy::default(),
            external_ram: None,
            ram_timestamp: None,
        }
    }
}
