//! JSON string escaping with the exact wire escape set.
//!
//! The message format escapes `"` and `\`, uses the short escapes `\b`
//! `\t` `\n` `\f` `\r` for 0x08-0x0d (excluding 0x0b), and `\u00XX` for
//! every other C0 control byte and for DEL (0x7f). All other bytes pass
//! through unchanged, including the continuation bytes of multi-byte
//! characters.

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Short escape for `b`, if one exists.
fn short_escape(b: u8) -> Option<u8> {
    match b {
        b'"' => Some(b'"'),
        b'\\' => Some(b'\\'),
        0x08 => Some(b'b'),
        0x09 => Some(b't'),
        0x0a => Some(b'n'),
        0x0c => Some(b'f'),
        0x0d => Some(b'r'),
        _ => None,
    }
}

/// True if `b` must be written as an escape sequence.
fn needs_escape(b: u8) -> bool {
    b < 0x20 || b == 0x7f || b == b'"' || b == b'\\'
}

/// The number of output bytes `b` occupies once escaped.
pub fn escaped_byte_len(b: u8) -> usize {
    if !needs_escape(b) {
        1
    } else if short_escape(b).is_some() {
        2
    } else {
        6
    }
}

/// The escaped length of one character's byte sequence.
///
/// Only a single-byte character can be escapable; the bytes of longer
/// sequences always pass through verbatim.
pub fn escaped_len(bytes: &[u8]) -> usize {
    if bytes.len() == 1 {
        escaped_byte_len(bytes[0])
    } else {
        bytes.len()
    }
}

/// Appends the escaped form of one byte.
pub fn escape_byte_into(out: &mut Vec<u8>, b: u8) {
    if !needs_escape(b) {
        out.push(b);
    } else if let Some(c) = short_escape(b) {
        out.push(b'\\');
        out.push(c);
    } else {
        out.extend_from_slice(b"\\u00");
        out.push(HEX_DIGITS[usize::from(b >> 4)]);
        out.push(HEX_DIGITS[usize::from(b & 0x0f)]);
    }
}

/// Appends the escaped form of one character's byte sequence.
pub fn escape_into(out: &mut Vec<u8>, bytes: &[u8]) {
    if bytes.len() == 1 {
        escape_byte_into(out, bytes[0]);
    } else {
        out.extend_from_slice(bytes);
    }
}

/// Escapes a whole string, for the per-message identity fields.
pub fn escape_str(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    for b in s.bytes() {
        escape_byte_into(&mut out, b);
    }
    // Escaping never produces invalid UTF-8
    String::from_utf8(out).unwrap_or_default()
}
