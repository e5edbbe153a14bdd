//! Message reader/writer contracts and the buffer-backed implementations.
//!
//! A sink hands complete message lines to a [`JsonWriter`]; a source pulls
//! parsed JSON objects from a [`JsonReader`]. Readers also expose an
//! opaque location (line number, entry index) and a formatter for it, used
//! only when attaching positions to error reports.
//!
//! The in-memory writer and the line-oriented reader live here because the
//! codec's own tests need them; transport-specific implementations (files,
//! raw fds, syslog, the journal, Elasticsearch) build on these contracts
//! in the adapters crate.

use std::io::BufRead;

use crate::error::{Error, Result};

/// A byte sink for complete JSON message lines.
///
/// Each call hands over one message; the implementation either writes
/// every byte or none, except that an interruption before the first byte
/// surfaces as an `Interrupted` I/O error.
pub trait JsonWriter {
    /// Writes one message line. `id` is the message's sequence number,
    /// available to transports that tag entries.
    fn write(&mut self, id: u64, line: &[u8]) -> Result<()>;
}

impl<W: JsonWriter + ?Sized> JsonWriter for &mut W {
    fn write(&mut self, id: u64, line: &[u8]) -> Result<()> {
        (**self).write(id, line)
    }
}

impl<W: JsonWriter + ?Sized> JsonWriter for Box<W> {
    fn write(&mut self, id: u64, line: &[u8]) -> Result<()> {
        (**self).write(id, line)
    }
}

/// A source of parsed JSON message objects.
pub trait JsonReader {
    /// Returns the next JSON object, or `None` at end of stream.
    fn read(&mut self) -> Result<Option<serde_json::Value>>;

    /// Opaque location of the most recently delivered object.
    fn loc(&self) -> u64;

    /// Renders a location for error messages, e.g. `"line 137"`.
    fn format_loc(&self, loc: u64) -> String;
}

impl<R: JsonReader + ?Sized> JsonReader for &mut R {
    fn read(&mut self) -> Result<Option<serde_json::Value>> {
        (**self).read()
    }

    fn loc(&self) -> u64 {
        (**self).loc()
    }

    fn format_loc(&self, loc: u64) -> String {
        (**self).format_loc(loc)
    }
}

impl<R: JsonReader + ?Sized> JsonReader for Box<R> {
    fn read(&mut self) -> Result<Option<serde_json::Value>> {
        (**self).read()
    }

    fn loc(&self) -> u64 {
        (**self).loc()
    }

    fn format_loc(&self, loc: u64) -> String {
        (**self).format_loc(loc)
    }
}

/// Collects written message lines into one growing buffer.
#[derive(Debug, Default)]
pub struct MemJsonWriter {
    buf: Vec<u8>,
}

impl MemJsonWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer, returning the accumulated bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl JsonWriter for MemJsonWriter {
    fn write(&mut self, _id: u64, line: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(line);
        Ok(())
    }
}

/// Reads one JSON object per line from any buffered byte source.
///
/// Blank lines are skipped. A line that fails to parse is a JSON error,
/// except for a final unterminated line, which is reported as an
/// incomplete message so a partially-written log is distinguishable from
/// a corrupt one.
#[derive(Debug)]
pub struct LineJsonReader<R> {
    inner: R,
    line_no: u64,
    line: String,
}

impl<R: BufRead> LineJsonReader<R> {
    /// Creates a reader over a buffered byte source.
    pub fn new(inner: R) -> Self {
        LineJsonReader {
            inner,
            line_no: 0,
            line: String::new(),
        }
    }
}

impl<R: BufRead> JsonReader for LineJsonReader<R> {
    fn read(&mut self) -> Result<Option<serde_json::Value>> {
        loop {
            self.line.clear();
            if self.inner.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let terminated = self.line.ends_with('\n');
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str(text) {
                Ok(obj) => return Ok(Some(obj)),
                Err(_) if !terminated => return Err(Error::IncompleteLine(self.line_no)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn loc(&self) -> u64 {
        self.line_no
    }

    fn format_loc(&self, loc: u64) -> String {
        format!("line {loc}")
    }
}

/// A line reader over an owned in-memory buffer.
pub type MemJsonReader = LineJsonReader<std::io::Cursor<Vec<u8>>>;

impl MemJsonReader {
    /// Creates a reader over owned message bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        LineJsonReader::new(std::io::Cursor::new(bytes.into()))
    }
}
