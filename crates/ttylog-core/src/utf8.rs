//! Streaming UTF-8 filter.
//!
//! Separates a byte stream into valid character sequences and invalid byte
//! runs without ever splitting a character. Bytes are fed one at a time;
//! the filter buffers up to four of them and reports when the current
//! candidate sequence is complete, invalid, or still pending.
//!
//! The accepted sequences are the nine byte-range patterns of the Unicode
//! standard's well-formed byte sequence table (chapter 3, table 3-7), so
//! surrogates and over-long encodings are rejected at the exact byte that
//! breaks them.

/// An inclusive byte value range.
#[derive(Debug, Clone, Copy)]
struct Range {
    min: u8,
    max: u8,
}

impl Range {
    const fn contains(self, b: u8) -> bool {
        b >= self.min && b <= self.max
    }
}

const fn r(min: u8, max: u8) -> Range {
    Range { min, max }
}

/// Well-formed byte sequences, one slice of ranges per pattern.
const SEQ_LIST: [&[Range]; 9] = [
    &[r(0x00, 0x7f)],
    &[r(0xc2, 0xdf), r(0x80, 0xbf)],
    &[r(0xe0, 0xe0), r(0xa0, 0xbf), r(0x80, 0xbf)],
    &[r(0xe1, 0xec), r(0x80, 0xbf), r(0x80, 0xbf)],
    &[r(0xed, 0xed), r(0x80, 0x9f), r(0x80, 0xbf)],
    &[r(0xee, 0xef), r(0x80, 0xbf), r(0x80, 0xbf)],
    &[r(0xf0, 0xf0), r(0x90, 0xbf), r(0x80, 0xbf), r(0x80, 0xbf)],
    &[r(0xf1, 0xf3), r(0x80, 0xbf), r(0x80, 0xbf), r(0x80, 0xbf)],
    &[r(0xf4, 0xf4), r(0x80, 0x8f), r(0x80, 0xbf), r(0x80, 0xbf)],
];

/// One in-progress character sequence.
///
/// The filter is a small `Copy` value so callers can snapshot it before a
/// speculative step and restore it if the step does not fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Utf8Filter {
    buf: [u8; 4],
    len: u8,
    seq: u8,
    ended: bool,
}

impl Utf8Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the filter back to the empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The bytes buffered so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..usize::from(self.len)]
    }

    /// True once any byte has been buffered.
    pub fn is_started(&self) -> bool {
        self.len > 0
    }

    /// True once a complete/invalid decision has been reached.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// True if the ended sequence is a complete valid character.
    ///
    /// Only meaningful after [`is_ended`](Self::is_ended) returns true.
    pub fn is_complete(&self) -> bool {
        debug_assert!(self.ended);
        self.len > 0 && usize::from(self.len) == SEQ_LIST[usize::from(self.seq)].len()
    }

    /// True if the sequence ended without buffering anything, i.e. the
    /// very first byte was rejected.
    ///
    /// Only meaningful after [`is_ended`](Self::is_ended) returns true.
    pub fn is_empty(&self) -> bool {
        debug_assert!(self.ended);
        self.len == 0
    }

    /// Tries to add one byte to the sequence.
    ///
    /// Returns true if the byte continued or completed the sequence. On a
    /// mismatch the byte is *not* consumed, the sequence is marked ended,
    /// and false is returned; the caller decides what to do with the
    /// buffered bytes and must feed the rejected byte into a fresh attempt.
    pub fn add(&mut self, b: u8) -> bool {
        debug_assert!(!self.ended);

        if self.len == 0 {
            let Some(seq) = SEQ_LIST.iter().position(|seq| seq[0].contains(b)) else {
                self.ended = true;
                return false;
            };
            self.seq = seq as u8;
        } else {
            let ranges = SEQ_LIST[usize::from(self.seq)];
            if !ranges[usize::from(self.len)].contains(b) {
                self.ended = true;
                return false;
            }
        }

        self.buf[usize::from(self.len)] = b;
        self.len += 1;
        if usize::from(self.len) == SEQ_LIST[usize::from(self.seq)].len() {
            self.ended = true;
        }
        true
    }
}

/// Checks that a buffer holds only well-formed UTF-8, using the same
/// table as the streaming filter.
pub fn buf_is_valid(buf: &[u8]) -> bool {
    let mut filter = Utf8Filter::new();
    for &b in buf {
        if !filter.add(b) {
            return false;
        }
        if filter.is_ended() {
            filter.reset();
        }
    }
    !filter.is_started()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(bytes: &[u8]) -> (Utf8Filter, usize) {
        let mut f = Utf8Filter::new();
        let mut accepted = 0;
        for &b in bytes {
            if !f.add(b) {
                break;
            }
            accepted += 1;
            if f.is_ended() {
                break;
            }
        }
        (f, accepted)
    }

    #[test]
    fn ascii_completes_immediately() {
        let (f, n) = feed(b"A");
        assert_eq!(n, 1);
        assert!(f.is_ended() && f.is_complete());
        assert_eq!(f.bytes(), b"A");
    }

    #[test]
    fn four_byte_sequence_completes() {
        // U+1D11E
        let (f, n) = feed(&[0xf0, 0x9d, 0x84, 0x9e]);
        assert_eq!(n, 4);
        assert!(f.is_complete());
    }

    #[test]
    fn invalid_first_byte_ends_empty() {
        let mut f = Utf8Filter::new();
        assert!(!f.add(0xff));
        assert!(f.is_ended() && f.is_empty());
    }

    #[test]
    fn broken_continuation_keeps_prefix() {
        let mut f = Utf8Filter::new();
        assert!(f.add(0xf0));
        assert!(f.add(0x9d));
        assert!(!f.add(b'X'));
        assert!(f.is_ended() && !f.is_complete() && !f.is_empty());
        assert_eq!(f.bytes(), &[0xf0, 0x9d]);
    }

    #[test]
    fn surrogates_are_rejected() {
        // 0xed 0xa0 0x80 would encode U+D800
        let mut f = Utf8Filter::new();
        assert!(f.add(0xed));
        assert!(!f.add(0xa0));
    }

    #[test]
    fn overlong_encodings_are_rejected() {
        // 0xc0 0xaf is an over-long '/'
        let mut f = Utf8Filter::new();
        assert!(!f.add(0xc0));
        // 0xe0 0x80 would be an over-long two-byte tail
        let mut f = Utf8Filter::new();
        assert!(f.add(0xe0));
        assert!(!f.add(0x80));
    }

    #[test]
    fn agrees_with_std_on_samples() {
        let samples: [&[u8]; 8] = [
            b"plain ascii",
            "åβ👍".as_bytes(),
            &[0xff, 0xfe],
            &[0xf0, 0x9d, 0x84, 0x9e],
            &[0xed, 0xa0, 0x80],
            &[0xc2],
            &[0x80],
            &[0xf4, 0x90, 0x80, 0x80],
        ];
        for s in samples {
            assert_eq!(
                buf_is_valid(s),
                std::str::from_utf8(s).is_ok(),
                "disagreement on {s:?}"
            );
        }
    }
}
