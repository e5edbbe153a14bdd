//! # ttylog-adapters
//!
//! Transport implementations of the [`ttylog_core::JsonReader`] and
//! [`ttylog_core::JsonWriter`] contracts:
//!
//! - line-oriented file readers and raw-fd writers
//! - a syslog writer and a systemd-journal writer/reader pair
//! - a paginated Elasticsearch reader
//! - the rate-limiting writer decorator pacing message output

mod es_reader;
mod fd_reader;
#[cfg(unix)]
mod fd_writer;
#[cfg(unix)]
mod journal;
mod rate_limit;
#[cfg(unix)]
mod syslog_writer;

pub use es_reader::{ES_PAGE_SIZE_MIN, EsJsonReader};
pub use fd_reader::FileJsonReader;
#[cfg(unix)]
pub use fd_writer::FdJsonWriter;
#[cfg(unix)]
pub use journal::{JournalJsonReader, JournalJsonWriter, JournalReaderConfig};
#[cfg(unix)]
pub use rate_limit::MonotonicClock;
pub use rate_limit::{Clock, RateLimitConfig, RateLimitJsonWriter};
#[cfg(unix)]
pub use syslog_writer::SyslogJsonWriter;
