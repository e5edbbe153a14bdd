//! Message writing through the local syslog daemon.

use syslog::{Facility, Formatter3164, Severity};
use ttylog_core::{Error, JsonWriter, Result};

/// Sends each message line as one syslog entry.
pub struct SyslogJsonWriter {
    logger: syslog::Logger<syslog::LoggerBackend, Formatter3164>,
    severity: Severity,
}

impl SyslogJsonWriter {
    /// Connects to the local syslog socket with the given facility,
    /// severity and process tag.
    pub fn new(facility: Facility, severity: Severity, process: &str) -> Result<Self> {
        let formatter = Formatter3164 {
            facility,
            hostname: None,
            process: process.to_owned(),
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        Ok(SyslogJsonWriter { logger, severity })
    }
}

impl JsonWriter for SyslogJsonWriter {
    fn write(&mut self, _id: u64, line: &[u8]) -> Result<()> {
        // Message lines are produced as UTF-8; strip the line terminator
        let msg = std::str::from_utf8(line)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?
            .trim_end_matches('\n');
        let res = match self.severity {
            Severity::LOG_EMERG => self.logger.emerg(msg),
            Severity::LOG_ALERT => self.logger.alert(msg),
            Severity::LOG_CRIT => self.logger.crit(msg),
            Severity::LOG_ERR => self.logger.err(msg),
            Severity::LOG_WARNING => self.logger.warning(msg),
            Severity::LOG_NOTICE => self.logger.notice(msg),
            Severity::LOG_INFO => self.logger.info(msg),
            Severity::LOG_DEBUG => self.logger.debug(msg),
        };
        res.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
    }
}
