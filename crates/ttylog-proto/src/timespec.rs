//! Signed second/nanosecond timestamps and their arithmetic.
//!
//! A [`TimeSpec`] is kept normalized: nanoseconds stay strictly within one
//! second of zero and never disagree with the sign of the seconds field.
//! Exact arithmetic goes through a 128-bit nanosecond total, so results are
//! normalized by construction; the saturating variants clamp at
//! [`TimeSpec::MIN`]/[`TimeSpec::MAX`] instead of overflowing.

use std::fmt;
use std::ops::{Add, Sub};

/// Nanoseconds per second.
pub const NSEC_PER_SEC: i64 = 1_000_000_000;

/// A point in (or span of) time with nanosecond precision.
///
/// Invariants: `nsec` is in `(-NSEC_PER_SEC, NSEC_PER_SEC)` and `sec` and
/// `nsec` are never of opposite sign. Values satisfying the invariants
/// order correctly under the derived lexicographic comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSpec {
    /// Whole seconds.
    pub sec: i64,
    /// Nanosecond remainder, same sign as `sec` (or either sign at zero).
    pub nsec: i64,
}

impl TimeSpec {
    /// The zero timestamp.
    pub const ZERO: TimeSpec = TimeSpec { sec: 0, nsec: 0 };

    /// The most negative representable value.
    pub const MIN: TimeSpec = TimeSpec {
        sec: i64::MIN,
        nsec: -(NSEC_PER_SEC - 1),
    };

    /// The most positive representable value.
    pub const MAX: TimeSpec = TimeSpec {
        sec: i64::MAX,
        nsec: NSEC_PER_SEC - 1,
    };

    /// Creates a timestamp from whole seconds and a nanosecond remainder.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the pair violates the type invariants.
    pub fn new(sec: i64, nsec: i64) -> Self {
        let ts = TimeSpec { sec, nsec };
        debug_assert!(ts.is_valid(), "non-normalized timespec {sec}s {nsec}ns");
        ts
    }

    /// Creates a timestamp from a millisecond count.
    pub fn from_ms(ms: i64) -> Self {
        TimeSpec {
            sec: ms / 1000,
            nsec: (ms % 1000) * 1_000_000,
        }
    }

    /// Checks the normalization invariants.
    pub fn is_valid(&self) -> bool {
        self.nsec > -NSEC_PER_SEC
            && self.nsec < NSEC_PER_SEC
            && !(self.sec > 0 && self.nsec < 0)
            && !(self.sec < 0 && self.nsec > 0)
    }

    /// True for the zero timestamp.
    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }

    /// True if the value is strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.sec < 0 || self.nsec < 0
    }

    /// True if the value is strictly above zero.
    pub fn is_positive(&self) -> bool {
        self.sec > 0 || self.nsec > 0
    }

    /// Total nanoseconds, exact.
    fn total_nsec(self) -> i128 {
        i128::from(self.sec) * i128::from(NSEC_PER_SEC) + i128::from(self.nsec)
    }

    /// Rebuilds a normalized value from a nanosecond total, clamping to the
    /// representable range.
    fn from_total_nsec(total: i128) -> Self {
        let total = total.clamp(Self::MIN.total_nsec(), Self::MAX.total_nsec());
        TimeSpec {
            sec: (total / i128::from(NSEC_PER_SEC)) as i64,
            nsec: (total % i128::from(NSEC_PER_SEC)) as i64,
        }
    }

    /// Saturating addition.
    pub fn cap_add(self, other: TimeSpec) -> TimeSpec {
        Self::from_total_nsec(self.total_nsec() + other.total_nsec())
    }

    /// Saturating subtraction.
    pub fn cap_sub(self, other: TimeSpec) -> TimeSpec {
        Self::from_total_nsec(self.total_nsec() - other.total_nsec())
    }

    /// The value as floating-point seconds.
    pub fn to_fp(self) -> f64 {
        self.sec as f64 + self.nsec as f64 / NSEC_PER_SEC as f64
    }

    /// Builds a value from floating-point seconds, clamping to the
    /// representable range. Non-finite inputs clamp to the nearest bound
    /// (NaN becomes zero).
    pub fn from_fp(secs: f64) -> Self {
        if secs.is_nan() {
            return Self::ZERO;
        }
        // f64-to-int casts saturate, which is exactly the capping we want.
        Self::from_total_nsec((secs * NSEC_PER_SEC as f64) as i128)
    }

    /// Double-precision multiplication, capped.
    pub fn fp_mul(self, other: TimeSpec) -> TimeSpec {
        Self::from_fp(self.to_fp() * other.to_fp())
    }

    /// Double-precision division, capped.
    pub fn fp_div(self, other: TimeSpec) -> TimeSpec {
        Self::from_fp(self.to_fp() / other.to_fp())
    }

    /// Whole milliseconds, truncated toward zero and saturated.
    pub fn to_ms(self) -> i64 {
        let ms = self.total_nsec() / 1_000_000;
        ms.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}

impl Add for TimeSpec {
    type Output = TimeSpec;

    /// Exact addition. The mathematical result must be representable.
    fn add(self, other: TimeSpec) -> TimeSpec {
        let total = self.total_nsec() + other.total_nsec();
        debug_assert!(
            (TimeSpec::MIN.total_nsec()..=TimeSpec::MAX.total_nsec()).contains(&total),
            "timespec addition overflow"
        );
        Self::from_total_nsec(total)
    }
}

impl Sub for TimeSpec {
    type Output = TimeSpec;

    /// Exact subtraction. The mathematical result must be representable.
    fn sub(self, other: TimeSpec) -> TimeSpec {
        let total = self.total_nsec() - other.total_nsec();
        debug_assert!(
            (TimeSpec::MIN.total_nsec()..=TimeSpec::MAX.total_nsec()).contains(&total),
            "timespec subtraction overflow"
        );
        Self::from_total_nsec(total)
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}.{:09}", self.sec.unsigned_abs(), self.nsec.unsigned_abs())
        } else {
            write!(f, "{}.{:09}", self.sec, self.nsec)
        }
    }
}
