//! Packets flowing between terminal taps, sinks and sources.
//!
//! A packet pairs a timestamp with one of three payloads: nothing (a void
//! placeholder), a window size change, or a run of I/O bytes in one
//! direction. I/O buffers are `Cow`: a recorder hands the sink borrowed
//! slices straight from its read buffer, while a player receives owned
//! buffers materialized by the source.

use std::borrow::Cow;

use crate::timespec::TimeSpec;

/// Packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktData<'a> {
    /// No payload; used as a sentinel and placeholder.
    Void,
    /// Terminal window resized.
    Window {
        /// New width, columns.
        width: u16,
        /// New height, rows.
        height: u16,
    },
    /// A run of terminal I/O bytes.
    Io {
        /// True for output (program to user), false for input.
        output: bool,
        /// The raw bytes, borrowed or owned.
        buf: Cow<'a, [u8]>,
    },
}

/// A timestamped packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkt<'a> {
    /// When the payload was observed.
    pub timestamp: TimeSpec,
    /// The payload.
    pub data: PktData<'a>,
}

impl<'a> Pkt<'a> {
    /// Creates a void packet.
    pub fn void() -> Self {
        Pkt {
            timestamp: TimeSpec::ZERO,
            data: PktData::Void,
        }
    }

    /// Creates a window-size packet.
    pub fn window(timestamp: TimeSpec, width: u16, height: u16) -> Self {
        Pkt {
            timestamp,
            data: PktData::Window { width, height },
        }
    }

    /// Creates an I/O packet.
    pub fn io(timestamp: TimeSpec, output: bool, buf: impl Into<Cow<'a, [u8]>>) -> Self {
        Pkt {
            timestamp,
            data: PktData::Io {
                output,
                buf: buf.into(),
            },
        }
    }

    /// True for the void payload.
    pub fn is_void(&self) -> bool {
        matches!(self.data, PktData::Void)
    }

    /// True for a window-size payload.
    pub fn is_window(&self) -> bool {
        matches!(self.data, PktData::Window { .. })
    }

    /// True for an I/O payload.
    pub fn is_io(&self) -> bool {
        matches!(self.data, PktData::Io { .. })
    }

    /// Number of positions a cursor can step through in this packet:
    /// the byte count for I/O, one for a window, zero for void.
    pub fn len(&self) -> usize {
        match &self.data {
            PktData::Void => 0,
            PktData::Window { .. } => 1,
            PktData::Io { buf, .. } => buf.len(),
        }
    }

    /// True if there is nothing to step through.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts any borrowed buffer into an owned one.
    pub fn into_owned(self) -> Pkt<'static> {
        let data = match self.data {
            PktData::Void => PktData::Void,
            PktData::Window { width, height } => PktData::Window { width, height },
            PktData::Io { output, buf } => PktData::Io {
                output,
                buf: Cow::Owned(buf.into_owned()),
            },
        };
        Pkt {
            timestamp: self.timestamp,
            data,
        }
    }
}

/// A cursor into a packet: a byte offset for I/O packets, an emitted flag
/// (0 or 1) for window packets. Positions are only meaningful relative to
/// the packet they were advanced over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PktPos {
    val: usize,
}

impl PktPos {
    /// The position before any content.
    pub const START: PktPos = PktPos { val: 0 };

    /// Current offset.
    pub fn offset(&self) -> usize {
        self.val
    }

    /// True once the cursor has stepped past everything in `pkt`.
    pub fn is_past(&self, pkt: &Pkt<'_>) -> bool {
        self.val >= pkt.len()
    }

    /// Steps the cursor forward.
    pub fn advance(&mut self, n: usize) {
        self.val += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_has_no_extent() {
        let pkt = Pkt::void();
        assert!(pkt.is_void());
        assert!(PktPos::START.is_past(&pkt));
    }

    #[test]
    fn window_is_a_single_step() {
        let pkt = Pkt::window(TimeSpec::ZERO, 80, 24);
        let mut pos = PktPos::START;
        assert!(!pos.is_past(&pkt));
        pos.advance(1);
        assert!(pos.is_past(&pkt));
    }

    #[test]
    fn io_steps_bytes() {
        let pkt = Pkt::io(TimeSpec::ZERO, true, b"abc".as_slice());
        let mut pos = PktPos::START;
        pos.advance(2);
        assert!(!pos.is_past(&pkt));
        pos.advance(1);
        assert!(pos.is_past(&pkt));
    }

    #[test]
    fn into_owned_detaches_borrow() {
        let bytes = b"hi".to_vec();
        let pkt = Pkt::io(TimeSpec::from_ms(5), false, bytes.as_slice());
        let owned = pkt.clone().into_owned();
        assert_eq!(owned, pkt.into_owned());
        match owned.data {
            PktData::Io { buf, .. } => assert!(matches!(buf, Cow::Owned(_))),
            _ => unreachable!(),
        }
    }
}
