/// Energy counters.
///
/// The monitor only ever reads counters; detection and unit discovery happen
/// once in `PowerCounter::init`. Reads of a counter the machine does not
/// provide return `COUNTER_UNAVAILABLE`, which is never a real reading.
mod rapl;

pub use rapl::{MsrAccess, Rapl};

use core::fmt;

/// Value returned by `PowerCounter::read` for an unsupported counter.
pub const COUNTER_UNAVAILABLE: u64 = u64::MAX;

/// Energy domains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterKind {
    /// Whole package.
    Package,
    /// Cores (power plane 0).
    Core,
    /// Uncore peripheral such as integrated graphics (power plane 1).
    Peripheral,
    /// DRAM.
    Memory,
}

impl CounterKind {
    pub const ALL: [CounterKind; 4] = [
        CounterKind::Package,
        CounterKind::Core,
        CounterKind::Peripheral,
        CounterKind::Memory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CounterKind::Package => "package",
            CounterKind::Core => "core",
            CounterKind::Peripheral => "peripheral",
            CounterKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    NotIntel,
    Unsupported { model: u32 },
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::NotIntel => write!(f, "not an Intel CPU, no energy counters"),
            PowerError::Unsupported { model } => {
                write!(f, "CPU model {:#x} has no RAPL support", model)
            }
        }
    }
}

/// Hardware energy counter source.
pub trait PowerCounter {
    /// Detect the hardware and latch unit divisors. Until this succeeds every
    /// counter is invalid.
    fn init(&mut self) -> Result<(), PowerError>;

    fn is_valid(&self, kind: CounterKind) -> bool;

    /// Raw register units, or `COUNTER_UNAVAILABLE`.
    fn read(&self, kind: CounterKind) -> u64;

    /// Energy units per joule, valid after `init`.
    fn energy_divisor(&self) -> u64;

    /// `read` with the sentinel mapped to `None`.
    fn reading(&self, kind: CounterKind) -> Option<u64> {
        match self.read(kind) {
            COUNTER_UNAVAILABLE => None,
            raw => Some(raw),
        }
    }

    /// Counter value converted to microjoules.
    fn energy_uj(&self, kind: CounterKind) -> Option<u64> {
        let raw = self.reading(kind)?;
        let divisor = self.energy_divisor();
        if divisor == 0 {
            return None;
        }
        Some(((raw as u128 * 1_000_000) / divisor as u128) as u64)
    }
}

#[cfg(test)]
mod tests;
