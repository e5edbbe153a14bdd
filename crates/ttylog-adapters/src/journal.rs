//! systemd journal transport.
//!
//! Writing goes through the journal's native socket protocol with the
//! recording identity attached as custom fields. Reading delegates
//! cursor handling to `journalctl --output=json` and extracts each
//! entry's `MESSAGE` field, which holds one message line.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};

use libsystemd::logging::Priority;
use ttylog_core::{Error, JsonReader, JsonWriter, Result};

/// Writes message lines as journal entries.
#[derive(Debug)]
pub struct JournalJsonWriter {
    priority: Priority,
    recording: String,
    username: String,
    session_id: u32,
}

impl JournalJsonWriter {
    /// Creates a writer stamping entries with the recording identity.
    pub fn new(priority: Priority, recording: &str, username: &str, session_id: u32) -> Result<Self> {
        if session_id == 0 {
            return Err(Error::InvalidParam("session_id"));
        }
        Ok(JournalJsonWriter {
            priority,
            recording: recording.to_owned(),
            username: username.to_owned(),
            session_id,
        })
    }
}

impl JsonWriter for JournalJsonWriter {
    fn write(&mut self, id: u64, line: &[u8]) -> Result<()> {
        let msg = std::str::from_utf8(line)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?
            .trim_end_matches('\n');
        let vars = [
            ("TTYLOG_REC", self.recording.clone()),
            ("TTYLOG_USER", self.username.clone()),
            ("TTYLOG_SESSION", self.session_id.to_string()),
            ("TTYLOG_ID", id.to_string()),
        ];
        libsystemd::logging::journal_send(self.priority, msg, vars.into_iter())
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
    }
}

/// Selection parameters for reading messages back out of the journal.
#[derive(Debug, Clone, Default)]
pub struct JournalReaderConfig {
    /// journal match expressions, e.g. `TTYLOG_REC=<id>`.
    pub matches: Vec<String>,
    /// Lower realtime bound, microseconds since the epoch.
    pub since_us: Option<u64>,
    /// Upper realtime bound, microseconds since the epoch.
    pub until_us: Option<u64>,
}

/// Reads message lines from the journal via `journalctl`.
#[derive(Debug)]
pub struct JournalJsonReader {
    child: Child,
    lines: BufReader<std::process::ChildStdout>,
    entry: u64,
    line: String,
}

impl JournalJsonReader {
    /// Spawns `journalctl` with the configured matches and time range.
    pub fn new(config: &JournalReaderConfig) -> Result<Self> {
        let mut cmd = Command::new("journalctl");
        cmd.args(["--output=json", "--quiet"]);
        if let Some(since) = config.since_us {
            cmd.arg(format!("--since=@{}.{:06}", since / 1_000_000, since % 1_000_000));
        }
        if let Some(until) = config.until_us {
            cmd.arg(format!("--until=@{}.{:06}", until / 1_000_000, until % 1_000_000));
        }
        cmd.args(&config.matches);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        tracing::debug!(matches = ?config.matches, "spawning journalctl");
        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Io(std::io::Error::other("journalctl stdout unavailable"))
        })?;
        Ok(JournalJsonReader {
            child,
            lines: BufReader::new(stdout),
            entry: 0,
            line: String::new(),
        })
    }
}

impl JsonReader for JournalJsonReader {
    fn read(&mut self) -> Result<Option<serde_json::Value>> {
        loop {
            self.line.clear();
            if self.lines.read_line(&mut self.line)? == 0 {
                let _ = self.child.wait();
                return Ok(None);
            }
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            self.entry += 1;
            let entry: serde_json::Value = serde_json::from_str(text)?;
            let message = entry.get("MESSAGE").and_then(|m| m.as_str()).ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "journal entry without a textual MESSAGE field",
                ))
            })?;
            return serde_json::from_str(message).map(Some).map_err(Into::into);
        }
    }

    fn loc(&self) -> u64 {
        self.entry
    }

    fn format_loc(&self, loc: u64) -> String {
        format!("entry {loc}")
    }
}

impl Drop for JournalJsonReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
