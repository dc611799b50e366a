//! MBC3 battery-backed real-time clock.
//!
//! The clock keeps a day/hour/minute/second counter that advances with
//! wall time: state is a register snapshot plus the Unix timestamp it was
//! taken at, and reads catch the counters up to "now" first. Loaders seed
//! the timestamp from the save file's modification time so the clock keeps
//! running while the emulator is off.

const SECONDS_PER_DAY: u64 = 86_400;

/// Register indices as selected through the mapper's high window.
pub(crate) const RTC_SECONDS: u8 = 0x08;
pub(crate) const RTC_MINUTES: u8 = 0x09;
pub(crate) const RTC_HOURS: u8 = 0x0A;
pub(crate) const RTC_DAYS_LOW: u8 = 0x0B;
pub(crate) const RTC_FLAGS: u8 = 0x0C;

/// Day/hour/minute/second counter with halt and day-carry flags.
#[derive(Debug, Clone)]
pub struct RealTimeClock {
    seconds: u8,
    minutes: u8,
    hours: u8,
    /// 9-bit day counter.
    days: u16,
    /// Halt bit: freezes the counters while set.
    halted: bool,
    /// Latched when the day counter overflows past 511; cleared only by
    /// an explicit flags write.
    day_carry: bool,
    /// Unix timestamp the snapshot above was taken at.
    reference: u64,
}

impl RealTimeClock {
    /// Create a clock at zero whose counters start advancing from the
    /// given Unix timestamp (typically the save file's mtime, or "now"
    /// for a fresh cartridge).
    #[must_use]
    pub const fn new(reference: u64) -> Self {
        Self {
            seconds: 0,
            minutes: 0,
            hours: 0,
            days: 0,
            halted: false,
            day_carry: false,
            reference,
        }
    }

    /// Advance the snapshot to `now`, carrying overflow through the
    /// counters and clamping day overflow into the carry bit.
    fn catch_up(&mut self, now: u64) {
        if self.halted || now <= self.reference {
            self.reference = self.reference.max(now);
            return;
        }

        let elapsed = now - self.reference;
        self.reference = now;

        let mut total = u64::from(self.seconds)
            + 60 * u64::from(self.minutes)
            + 3600 * u64::from(self.hours)
            + SECONDS_PER_DAY * u64::from(self.days)
            + elapsed;

        self.seconds = (total % 60) as u8;
        total /= 60;
        self.minutes = (total % 60) as u8;
        total /= 60;
        self.hours = (total % 24) as u8;
        let days = total / 24;

        if days > 0x1FF {
            self.day_carry = true;
        }
        self.days = (days & 0x1FF) as u16;
    }

    /// Read a clock register as of `now` (Unix seconds).
    #[must_use]
    pub fn read(&mut self, register: u8, now: u64) -> u8 {
        self.catch_up(now);
        match register {
            RTC_SECONDS => self.seconds,
            RTC_MINUTES => self.minutes,
            RTC_HOURS => self.hours,
            RTC_DAYS_LOW => (self.days & 0xFF) as u8,
            RTC_FLAGS => {
                let mut flags = ((self.days >> 8) & 1) as u8;
                if self.halted {
                    flags |= 0x40;
                }
                if self.day_carry {
                    flags |= 0x80;
                }
                flags
            }
            _ => 0,
        }
    }

    /// Write a clock register as of `now` (Unix seconds).
    pub fn write(&mut self, register: u8, value: u8, now: u64) {
        self.catch_up(now);
        match register {
            RTC_SECONDS => self.seconds = value % 60,
            RTC_MINUTES => self.minutes = value % 60,
            RTC_HOURS => self.hours = value % 24,
            RTC_DAYS_LOW => self.days = (self.days & 0x100) | u16::from(value),
            RTC_FLAGS => {
                self.days = (self.days & 0xFF) | (u16::from(value & 1) << 8);
                self.halted = value & 0x40 != 0;
                self.day_carry = value & 0x80 != 0;
            }
            _ => {}
        }
    }
}
