//! Bounds on the time spans a `+N` timing token can carry.

use crate::timespec::TimeSpec;

/// Smallest encodable delay, milliseconds. Anything below collapses into
/// the previous event's position.
pub const DELAY_MIN_MS: i64 = 1;

/// Largest encodable delay, milliseconds: `i32::MAX` seconds plus 999 ms.
pub const DELAY_MAX_MS: i64 = i32::MAX as i64 * 1000 + 999;

/// Smallest encodable delay as a timestamp.
pub const DELAY_MIN: TimeSpec = TimeSpec {
    sec: 0,
    nsec: DELAY_MIN_MS * 1_000_000,
};

/// Largest encodable delay as a timestamp.
pub const DELAY_MAX: TimeSpec = TimeSpec {
    sec: i32::MAX as i64,
    nsec: 999 * 1_000_000,
};
