//! Memory bus interface.

/// Memory bus interface.
///
/// The CPU accesses memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate backing store,
/// and owns the interrupt request/enable surface so that acknowledging a
/// request can be a single atomic read-modify-write when peripherals run
/// on their own threads.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Read a 16-bit word, low byte first.
    fn read16(&mut self, address: u16) -> u16 {
        let lo = self.read(address);
        let hi = self.read(address.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Write a 16-bit word, low byte first.
    fn write16(&mut self, address: u16, value: u16) {
        self.write(address, value as u8);
        self.write(address.wrapping_add(1), (value >> 8) as u8);
    }

    /// Interrupt bits that are both requested and enabled (IF & IE & 0x1F).
    ///
    /// The master-enable gate is the CPU's business, not the bus's.
    fn pending_interrupts(&mut self) -> u8;

    /// Clear a single request bit when the CPU services it.
    fn acknowledge_interrupt(&mut self, bit: u8);

    /// Cooperative wait used by HALT: return once any pending-and-enabled
    /// interrupt exists. The default returns immediately, which degrades to
    /// the caller re-stepping the halted CPU — correct for single-threaded
    /// drivers and for test buses.
    fn wait_for_interrupt(&mut self) {}

    /// Cooperative wait used by STOP: return once a joypad-class interrupt
    /// request exists. Default as above.
    fn wait_for_joypad(&mut self) {}
}

/// Flat 64 KiB RAM bus with plain interrupt bytes, for tests.
pub struct SimpleBus {
    pub ram: Box<[u8; 0x10000]>,
    pub interrupt_flags: u8,
    pub interrupt_enable: u8,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0; 0x10000]),
            interrupt_flags: 0,
            interrupt_enable: 0,
        }
    }

    /// Load bytes starting at the given address.
    pub fn load(&mut self, address: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.ram[address as usize + i] = b;
        }
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0xFF0F => self.interrupt_flags,
            0xFFFF => self.interrupt_enable,
            _ => self.ram[address as usize],
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0xFF0F => self.interrupt_flags = value & 0x1F,
            0xFFFF => self.interrupt_enable = value,
            _ => self.ram[address as usize] = value,
        }
    }

    fn pending_interrupts(&mut self) -> u8 {
        self.interrupt_flags & self.interrupt_enable & 0x1F
    }

    fn acknowledge_interrupt(&mut self, bit: u8) {
        self.interrupt_flags &= !bit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read16_is_little_endian() {
        let mut bus = SimpleBus::new();
        bus.write(0x8000, 0x34);
        bus.write(0x8001, 0x12);
        assert_eq!(bus.read16(0x8000), 0x1234);
    }

    #[test]
    fn write16_round_trips() {
        let mut bus = SimpleBus::new();
        bus.write16(0xC000, 0xBEEF);
        assert_eq!(bus.read(0xC000), 0xEF);
        assert_eq!(bus.read(0xC001), 0xBE);
        assert_eq!(bus.read16(0xC000), 0xBEEF);
    }

    #[test]
    fn pending_masks_request_against_enable() {
        let mut bus = SimpleBus::new();
        bus.write(0xFF0F, 0b0001_0011);
        bus.write(0xFFFF, 0b0000_0001);
        assert_eq!(bus.pending_interrupts(), 0b0000_0001);
        bus.acknowledge_interrupt(0b0000_0001);
        assert_eq!(bus.pending_interrupts(), 0);
    }
}
