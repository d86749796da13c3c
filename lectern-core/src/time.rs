//! Recording clock types.
//!
//! All recorded frames carry timestamps in 100 ns ticks, the native unit of
//! the capture clock. Output scripts print millisecond strings but keep the
//! full tick value so that sub-millisecond tie-break offsets survive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Ticks per millisecond (100 ns resolution).
pub const TICKS_PER_MILLI: i64 = 10_000;
/// Ticks per second.
pub const TICKS_PER_SECOND: i64 = 1000 * TICKS_PER_MILLI;

/// Absolute point on the recording clock, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

/// Signed distance between two timestamps, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TickSpan(pub i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(ms: i64) -> Self {
        Timestamp(ms * TICKS_PER_MILLI)
    }

    pub fn ticks(self) -> i64 {
        self.0
    }

    pub fn as_millis(self) -> i64 {
        self.0.div_euclid(TICKS_PER_MILLI)
    }

    /// `self + n` ticks.
    pub fn offset_ticks(self, n: i64) -> Self {
        Timestamp(self.0 + n)
    }

    /// Distance from `earlier` to `self`.
    pub fn since(self, earlier: Timestamp) -> TickSpan {
        TickSpan(self.0 - earlier.0)
    }

    /// Formats as `HH:MM:SS.mmm`, the precision of the legacy script format.
    /// Negative values are prefixed with `-`.
    pub fn clock_string(self) -> String {
        let ms = self.as_millis();
        let sign = if ms < 0 { "-" } else { "" };
        let ms = ms.unsigned_abs();
        let hours = ms / 3_600_000;
        let minutes = (ms / 60_000) % 60;
        let seconds = (ms / 1000) % 60;
        let millis = ms % 1000;
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

impl TickSpan {
    pub const ZERO: TickSpan = TickSpan(0);

    pub fn from_millis(ms: i64) -> Self {
        TickSpan(ms * TICKS_PER_MILLI)
    }

    pub fn ticks(self) -> i64 {
        self.0
    }
}

impl Add<TickSpan> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: TickSpan) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl Sub<TickSpan> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: TickSpan) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

impl Add for TickSpan {
    type Output = TickSpan;

    fn add(self, rhs: TickSpan) -> TickSpan {
        TickSpan(self.0 + rhs.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.clock_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_string() {
        let t = Timestamp::from_millis(3_723_004);
        assert_eq!(t.clock_string(), "01:02:03.004");
        assert_eq!(Timestamp::ZERO.clock_string(), "00:00:00.000");
    }

    #[test]
    fn test_clock_string_truncates_sub_millisecond_ticks() {
        let t = Timestamp::from_millis(5).offset_ticks(3);
        assert_eq!(t.clock_string(), "00:00:00.005");
        assert_eq!(t.ticks(), 50_003);
    }

    #[test]
    fn test_negative_clock_string() {
        assert_eq!(Timestamp::from_millis(-1500).clock_string(), "-00:00:01.500");
    }

    #[test]
    fn test_span_arithmetic() {
        let a = Timestamp::from_millis(100);
        let b = Timestamp::from_millis(350);
        assert_eq!(b.since(a), TickSpan::from_millis(250));
        assert_eq!(a + TickSpan::from_millis(250), b);
        assert_eq!(b - TickSpan::from_millis(250), a);
    }
}
