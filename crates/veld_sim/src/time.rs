//! Simulation time with femtosecond resolution and delta cycles.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;

/// A point in simulation time.
///
/// Events order first by the femtosecond counter, then by the delta cycle
/// index within that instant. Delta cycles subdivide an instant so signal
/// updates propagate without wall-clock time advancing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// Simulation time in femtoseconds.
    pub fs: u64,
    /// Delta cycle index within this instant.
    pub delta: u32,
}

impl SimTime {
    /// Time zero, delta zero.
    pub const ZERO: SimTime = SimTime { fs: 0, delta: 0 };

    /// Creates a time from femtoseconds at delta zero.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs, delta: 0 }
    }

    /// Creates a time from nanoseconds at delta zero.
    pub fn from_ns(ns: u64) -> Self {
        Self {
            fs: ns * FS_PER_NS,
            delta: 0,
        }
    }

    /// The next delta cycle at the same instant.
    pub fn next_delta(&self) -> Self {
        Self {
            fs: self.fs,
            delta: self.delta + 1,
        }
    }

    /// A later instant at delta zero.
    pub fn plus_fs(&self, fs: u64) -> Self {
        Self {
            fs: self.fs + fs,
            delta: 0,
        }
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fs.cmp(&other.fs).then(self.delta.cmp(&other.delta))
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.fs;
        if fs == 0 {
            write!(f, "0fs")?;
        } else if fs % FS_PER_MS == 0 {
            write!(f, "{}ms", fs / FS_PER_MS)?;
        } else if fs % FS_PER_US == 0 {
            write!(f, "{}us", fs / FS_PER_US)?;
        } else if fs % FS_PER_NS == 0 {
            write!(f, "{}ns", fs / FS_PER_NS)?;
        } else if fs % FS_PER_PS == 0 {
            write!(f, "{}ps", fs / FS_PER_PS)?;
        } else {
            write!(f, "{fs}fs")?;
        }
        if self.delta > 0 {
            write!(f, "+{}", self.delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero() {
        assert_eq!(SimTime::ZERO.fs, 0);
        assert_eq!(SimTime::ZERO.delta, 0);
        assert_eq!(SimTime::default(), SimTime::ZERO);
    }

    #[test]
    fn from_ns() {
        assert_eq!(SimTime::from_ns(10).fs, 10_000_000);
    }

    #[test]
    fn next_delta_keeps_instant() {
        let t = SimTime::from_ns(5).next_delta();
        assert_eq!(t.fs, 5_000_000);
        assert_eq!(t.delta, 1);
    }

    #[test]
    fn plus_fs_resets_delta() {
        let t = SimTime { fs: 100, delta: 7 }.plus_fs(50);
        assert_eq!(t.fs, 150);
        assert_eq!(t.delta, 0);
    }

    #[test]
    fn ordering_fs_then_delta() {
        assert!(SimTime::from_ns(1) < SimTime::from_ns(2));
        assert!(SimTime { fs: 100, delta: 0 } < SimTime { fs: 100, delta: 1 });
        assert!(SimTime { fs: 200, delta: 0 } > SimTime { fs: 100, delta: 99 });
    }

    #[test]
    fn display_picks_unit() {
        assert_eq!(SimTime::ZERO.to_string(), "0fs");
        assert_eq!(SimTime::from_ns(10).to_string(), "10ns");
        assert_eq!(SimTime::from_fs(1_500).to_string(), "1500fs");
        assert_eq!(SimTime::from_fs(5 * FS_PER_US).to_string(), "5us");
    }

    #[test]
    fn display_includes_delta() {
        let t = SimTime {
            fs: FS_PER_NS,
            delta: 3,
        };
        assert_eq!(t.to_string(), "1ns+3");
    }
}
