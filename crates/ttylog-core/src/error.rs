//! Error taxonomy shared by the codec core and the transport adapters.

use ttylog_proto::TimeSpec;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while encoding, decoding or transporting
/// session messages.
///
/// The variants form non-overlapping families: message validation,
/// stream continuity, reader-local conditions, and carried-through system
/// and JSON-parser errors. Display strings are the user-facing text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A constructor was handed an out-of-range parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// A required message field is absent.
    #[error("message field \"{0}\" is missing")]
    MissingField(&'static str),

    /// A message field has the wrong JSON type.
    #[error("message field \"{0}\" has invalid type")]
    WrongFieldType(&'static str),

    /// The message version is unsupported.
    #[error("unsupported message version \"{0}\"")]
    InvalidVer(String),

    /// The session id is out of range.
    #[error("invalid session id {0}")]
    InvalidSession(i64),

    /// The message id is out of range.
    #[error("invalid message id {0}")]
    InvalidId(i64),

    /// The position field cannot be interpreted.
    #[error("invalid message position \"{0}\"")]
    InvalidPos(String),

    /// The timing string is malformed.
    #[error("invalid timing string: {0}")]
    InvalidTiming(String),

    /// A text payload disagrees with the timing string.
    #[error("invalid text payload: {0}")]
    InvalidTxt(String),

    /// A binary payload disagrees with the timing string or holds
    /// out-of-range entries.
    #[error("invalid binary payload: {0}")]
    InvalidBin(String),

    /// Message ids do not advance as the continuity mode requires.
    #[error("message id {id} out of order after {last}")]
    MsgIdOutOfOrder {
        /// Offending message id.
        id: u64,
        /// Previously accepted id.
        last: u64,
    },

    /// A replayed packet would move backwards in time.
    #[error("packet timestamp {ts} out of order after {last}")]
    PktTsOutOfOrder {
        /// Offending timestamp.
        ts: TimeSpec,
        /// Previously emitted timestamp.
        last: TimeSpec,
    },

    /// A message carries a different terminal type than required.
    #[error("terminal type \"{actual}\" does not match \"{expected}\"")]
    TerminalMismatch {
        /// Terminal type the source was configured to require.
        expected: String,
        /// Terminal type found in the message.
        actual: String,
    },

    /// The input ended in the middle of a message line.
    #[error("incomplete message line at line {0}")]
    IncompleteLine(u64),

    /// The HTTP server answered with a failure status.
    #[error("HTTP request failed with status {0}")]
    HttpStatus(u16),

    /// The HTTP reply body is not shaped as expected.
    #[error("invalid HTTP reply: {0}")]
    InvalidHttpReply(String),

    /// The HTTP transport itself failed.
    #[error("HTTP transport error: {0}")]
    HttpTransport(String),

    /// An operating system error carried through unchanged.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON parser error carried through unchanged.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True if the error is an interruption of a blocking operation
    /// before any byte was transferred.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::Interrupted)
    }
}
