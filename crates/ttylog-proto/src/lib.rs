//! # ttylog-proto
//!
//! Value types shared between the ttylog recorder and player:
//!
//! - [`TimeSpec`]: signed second/nanosecond timestamps with exact,
//!   saturating and floating-point arithmetic
//! - delay range constants bounding the `+N` timing tokens
//! - [`Pkt`]: the packet sum type flowing into sinks and out of sources,
//!   with its [`PktPos`] cursor

mod delay;
mod pkt;
mod timespec;

pub use delay::{DELAY_MAX, DELAY_MAX_MS, DELAY_MIN, DELAY_MIN_MS};
pub use pkt::{Pkt, PktData, PktPos};
pub use timespec::{NSEC_PER_SEC, TimeSpec};
