//! CPU clock and frame timing.

use std::time::Duration;

/// CPU clock configuration for a system.
///
/// The frame scheduler runs the CPU for a fixed number of cycles per frame;
/// the wall-clock length of a frame derives from that count and the clock
/// frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// CPU frequency in Hz (e.g. `2_200_000` for the Lviv's i8080).
    pub frequency_hz: u32,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u32) -> Self {
        Self { frequency_hz }
    }

    /// Whole milliseconds taken by `cycles` CPU cycles, rounded to nearest.
    #[must_use]
    pub fn frame_millis(&self, cycles: u32) -> u64 {
        if self.frequency_hz == 0 {
            return 0;
        }
        let hz = u64::from(self.frequency_hz);
        (u64::from(cycles) * 1000 + hz / 2) / hz
    }

    /// Wall-clock duration of a frame of `cycles` CPU cycles.
    #[must_use]
    pub fn frame_duration(&self, cycles: u32) -> Duration {
        Duration::from_millis(self.frame_millis(cycles))
    }

    /// CPU cycles per audio sample at `sample_rate`, rounded to nearest.
    ///
    /// Never returns zero so callers can divide by it.
    #[must_use]
    pub fn cycles_per_sample(&self, sample_rate: u32) -> u32 {
        if sample_rate == 0 {
            return 1;
        }
        let cycles = (u64::from(self.frequency_hz) + u64::from(sample_rate) / 2) / u64::from(sample_rate);
        u32::try_from(cycles).unwrap_or(u32::MAX).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lviv_frame_is_twenty_milliseconds() {
        let clock = MasterClock::new(2_200_000);
        assert_eq!(clock.frame_millis(44_800), 20);
        assert_eq!(clock.frame_duration(44_800), Duration::from_millis(20));
    }

    #[test]
    fn cycles_per_sample_rounds() {
        let clock = MasterClock::new(2_200_000);
        // 2_200_000 / 44_100 = 49.88
        assert_eq!(clock.cycles_per_sample(44_100), 50);
    }

    #[test]
    fn zero_rates_do_not_divide_by_zero() {
        assert_eq!(MasterClock::new(0).frame_millis(100), 0);
        assert_eq!(MasterClock::new(10).cycles_per_sample(44_100), 1);
        assert_eq!(MasterClock::new(10).cycles_per_sample(0), 1);
    }
}
