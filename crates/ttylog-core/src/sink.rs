//! Packets in, JSON message lines out.
//!
//! The sink drives a [`Chunk`] and, whenever the chunk fills up or is
//! explicitly flushed, serializes it into one self-describing message
//! line and hands the line to the configured [`JsonWriter`]. Message ids
//! are sequential starting at 1; the `pos` field carries the chunk's
//! first-event offset from the first packet the sink ever saw.

use std::io::Write as _;

use ttylog_proto::{Pkt, PktPos, TimeSpec};

use crate::chunk::{CHUNK_SIZE_MIN, Chunk};
use crate::error::{Error, Result};
use crate::esc;
use crate::io::JsonWriter;

/// Identity and sizing parameters for a sink.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Hostname recorded into every message.
    pub hostname: String,
    /// Recording id (UUID-like string) recorded into every message.
    pub recording: String,
    /// Username recorded into every message.
    pub username: String,
    /// Terminal type string recorded into every message.
    pub terminal: String,
    /// Audit session id; must be non-zero.
    pub session_id: u32,
    /// Byte budget of each message's payload chunk.
    pub chunk_size: usize,
}

/// Encodes a packet stream into JSON message lines.
pub struct JsonSink<W> {
    writer: W,
    host: String,
    rec: String,
    user: String,
    term: String,
    session_id: u32,
    message_id: u64,
    started: bool,
    start: TimeSpec,
    last: TimeSpec,
    chunk: Chunk,
    line: Vec<u8>,
}

impl<W: JsonWriter> JsonSink<W> {
    /// Creates a sink writing messages through `writer`.
    ///
    /// The identity strings are JSON-escaped once, up front.
    pub fn new(writer: W, config: &SinkConfig) -> Result<Self> {
        if config.session_id == 0 {
            return Err(Error::InvalidParam("session_id"));
        }
        if config.chunk_size < CHUNK_SIZE_MIN {
            return Err(Error::InvalidParam("chunk_size"));
        }
        Ok(JsonSink {
            writer,
            host: esc::escape_str(&config.hostname),
            rec: esc::escape_str(&config.recording),
            user: esc::escape_str(&config.username),
            term: esc::escape_str(&config.terminal),
            session_id: config.session_id,
            message_id: 1,
            started: false,
            start: TimeSpec::ZERO,
            last: TimeSpec::ZERO,
            chunk: Chunk::new(config.chunk_size),
            line: Vec::with_capacity(config.chunk_size + 256),
        })
    }

    /// Consumes the sink, returning the underlying writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Records one packet. Void packets are ignored; anything else is
    /// packed into the current chunk, flushing as often as needed to make
    /// it fit.
    pub fn write(&mut self, pkt: &Pkt<'_>) -> Result<()> {
        if pkt.is_void() {
            return Ok(());
        }
        if !self.started {
            self.started = true;
            self.start = pkt.timestamp;
        }
        self.last = pkt.timestamp;

        let mut pos = PktPos::START;
        while !self.chunk.write(pkt, &mut pos) {
            self.flush()?;
        }
        Ok(())
    }

    /// Closes any dangling incomplete UTF-8 sequences, demoting their
    /// bytes to the binary payloads. Used before a flush that must not
    /// leave anything buffered across the message boundary.
    pub fn cut(&mut self) -> Result<()> {
        while !self.chunk.cut(self.last) {
            self.flush()?;
        }
        Ok(())
    }

    /// Serializes the current chunk into one message line, if it holds
    /// anything. On a writer error the chunk is left intact so the caller
    /// may retry the flush.
    pub fn flush(&mut self) -> Result<()> {
        if self.chunk.is_empty() {
            return Ok(());
        }
        self.chunk.flush();

        let pos = (self.chunk.first() - self.start).to_ms();

        self.line.clear();
        // Infallible: Write on Vec<u8> cannot fail
        let _ = write!(
            self.line,
            "{{\"ver\":\"2.2\",\"host\":\"{}\",\"rec\":\"{}\",\"user\":\"{}\",\"term\":\"{}\",\
             \"session\":{},\"id\":{},\"pos\":{},\"timing\":\"",
            self.host, self.rec, self.user, self.term, self.session_id, self.message_id, pos,
        );
        self.line.extend_from_slice(self.chunk.timing_bytes());
        self.line.extend_from_slice(b"\",\"in_txt\":\"");
        self.line.extend_from_slice(self.chunk.input().txt_bytes());
        self.line.extend_from_slice(b"\",\"in_bin\":[");
        self.line.extend_from_slice(self.chunk.input().bin_bytes());
        self.line.extend_from_slice(b"],\"out_txt\":\"");
        self.line.extend_from_slice(self.chunk.output().txt_bytes());
        self.line.extend_from_slice(b"\",\"out_bin\":[");
        self.line.extend_from_slice(self.chunk.output().bin_bytes());
        self.line.extend_from_slice(b"]}\n");

        self.writer.write(self.message_id, &self.line)?;
        tracing::trace!(id = self.message_id, len = self.line.len(), "message flushed");

        self.message_id += 1;
        self.chunk.empty();
        Ok(())
    }
}
