//! Board services used by the driver.
//!
//! The driver does not configure pins or read clocks by itself. These are
//! provided by the board through the [`PinConfiguration`] and [`Timer`]
//! traits.

use anyhow::Result;
use nix::time::{clock_gettime, ClockId};

/// Pin configuration hook.
///
/// [`PinConfiguration::configure_pins`] is called once before the first
/// iteration of a run.
pub trait PinConfiguration {
    /// Configures the pins used by the IP core and the mailbox.
    fn configure_pins(&mut self) -> Result<()>;
}

/// Boards whose pins are configured outside this program.
impl PinConfiguration for () {
    fn configure_pins(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Monotonic timer used for latency measurements.
///
/// Latencies are computed as a wrapping difference of two readings, so a
/// timer may wrap around once during an iteration.
pub trait Timer {
    /// Returns the current timer value in ticks.
    fn ticks(&mut self) -> Result<u64>;
}

/// Timer based on `CLOCK_MONOTONIC`.
///
/// One tick corresponds to one nanosecond.
#[derive(Debug, Default, Copy, Clone)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// Creates a monotonic clock timer.
    pub fn new() -> MonotonicClock {
        MonotonicClock
    }
}

impl Timer for MonotonicClock {
    fn ticks(&mut self) -> Result<u64> {
        let now = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
        let seconds = u64::try_from(now.tv_sec())?;
        let nanoseconds = u64::try_from(now.tv_nsec())?;
        Ok(seconds.wrapping_mul(1_000_000_000).wrapping_add(nanoseconds))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn monotonic() {
        let mut clock = MonotonicClock::new();
        let a = clock.ticks().unwrap();
        let b = clock.ticks().unwrap();
        assert!(b >= a);
    }

    #[test]
    fn no_pins() {
        assert!(().configure_pins().is_ok());
    }
}
