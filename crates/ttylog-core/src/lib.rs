//! # ttylog-core
//!
//! The encoding and decoding core of the ttylog terminal-session
//! recorder. Recording-side, a [`JsonSink`] packs timestamped packets
//! into bounded chunks and emits one self-describing JSON message line
//! per chunk; playback-side, a [`JsonSource`] validates the message
//! stream and replays it into the same packets.
//!
//! The layers underneath are exposed for reuse and testing:
//!
//! - [`Utf8Filter`]: streaming separation of valid characters from
//!   invalid byte runs
//! - [`Stream`]: one direction's text/binary payload encoder
//! - [`Chunk`]: two streams over one shared timing track and budget
//! - [`trx`]: the nested-transaction layer making chunk writes atomic
//! - [`Msg`]: one parsed message with its timing replay cursor
//! - the [`JsonReader`]/[`JsonWriter`] transport contracts with
//!   in-memory implementations

mod chunk;
mod dispatcher;
mod error;
mod esc;
mod io;
mod msg;
mod sink;
mod source;
mod stream;
pub mod trx;
mod utf8;

pub use chunk::{CHUNK_SIZE_MIN, Chunk};
pub use dispatcher::{Dispatcher, TimingTrack};
pub use error::{Error, Result};
pub use esc::escape_str;
pub use io::{JsonReader, JsonWriter, LineJsonReader, MemJsonReader, MemJsonWriter};
pub use msg::{IO_SIZE_MIN, Msg};
pub use sink::{JsonSink, SinkConfig};
pub use source::{JsonSource, SourceConfig};
pub use stream::Stream;
pub use utf8::{Utf8Filter, buf_is_valid};
