//! Message stream in, packet stream out.
//!
//! The source pulls JSON objects from its reader, validates and filters
//! them, and replays each matching message's timing string into packets.
//! Across the whole stream it enforces message-id continuity, packet
//! timestamp monotonicity, and window coalescing; a terminal-type
//! mismatch fails the read instead of skipping, since replaying onto the
//! wrong terminal type would garble the output.

use ttylog_proto::{Pkt, PktData, TimeSpec};

use crate::error::{Error, Result};
use crate::io::JsonReader;
use crate::msg::{IO_SIZE_MIN, Msg};

/// Filtering and continuity parameters for a source.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Only deliver messages recorded on this host.
    pub hostname: Option<String>,
    /// Only deliver messages recorded by this user.
    pub username: Option<String>,
    /// Require this terminal type; a different one fails the read.
    pub terminal: Option<String>,
    /// Only deliver messages of this audit session.
    pub session_id: Option<u32>,
    /// When true, messages must match `recording` in both presence and
    /// value of their recording id.
    pub filter_recording: bool,
    /// Recording id to match when `filter_recording` is set; `None`
    /// matches only messages without one.
    pub recording: Option<String>,
    /// Accept any strictly-increasing message ids instead of requiring
    /// consecutive ones.
    pub lax: bool,
    /// Largest I/O packet payload, bytes. At least 4.
    pub io_size: usize,
}

impl SourceConfig {
    /// A configuration with no filters and a `io_size`-byte I/O budget.
    pub fn with_io_size(io_size: usize) -> Self {
        SourceConfig {
            io_size,
            ..SourceConfig::default()
        }
    }
}

/// Decodes a stream of JSON messages back into packets.
#[derive(Debug)]
pub struct JsonSource<R> {
    reader: R,
    config: SourceConfig,
    msg: Option<Msg>,
    got_msg: bool,
    last_msg_id: u64,
    got_pkt: bool,
    last_pkt_ts: TimeSpec,
    got_window: bool,
    last_width: u16,
    last_height: u16,
}

impl<R: JsonReader> JsonSource<R> {
    /// Creates a source reading messages from `reader`.
    pub fn new(reader: R, config: SourceConfig) -> Result<Self> {
        if config.io_size < IO_SIZE_MIN {
            return Err(Error::InvalidParam("io_size"));
        }
        Ok(JsonSource {
            reader,
            config,
            msg: None,
            got_msg: false,
            last_msg_id: 0,
            got_pkt: false,
            last_pkt_ts: TimeSpec::ZERO,
            got_window: false,
            last_width: 0,
            last_height: 0,
        })
    }

    /// Opaque location of the reader, for error reports.
    pub fn loc(&self) -> u64 {
        self.reader.loc()
    }

    /// Renders a reader location for error reports.
    pub fn format_loc(&self, loc: u64) -> String {
        self.reader.format_loc(loc)
    }

    /// Returns the next packet of the recording, or `None` at the end.
    pub fn read(&mut self) -> Result<Option<Pkt<'static>>> {
        loop {
            if self.msg.is_none() {
                let Some(msg) = self.next_matching_msg()? else {
                    return Ok(None);
                };
                if self.got_msg {
                    let in_order = if self.config.lax {
                        msg.id > self.last_msg_id
                    } else {
                        msg.id == self.last_msg_id + 1
                    };
                    if !in_order {
                        return Err(Error::MsgIdOutOfOrder {
                            id: msg.id,
                            last: self.last_msg_id,
                        });
                    }
                } else {
                    self.got_msg = true;
                }
                self.last_msg_id = msg.id;
                self.msg = Some(msg);
            }

            let pkt = match self.msg.as_mut().map(|m| m.read(self.config.io_size)) {
                Some(Ok(pkt)) => pkt,
                Some(Err(e)) => {
                    self.msg = None;
                    return Err(e);
                }
                None => unreachable!(),
            };
            let Some(pkt) = pkt else {
                self.msg = None;
                continue;
            };

            if self.got_pkt && pkt.timestamp < self.last_pkt_ts {
                let err = Error::PktTsOutOfOrder {
                    ts: pkt.timestamp,
                    last: self.last_pkt_ts,
                };
                self.msg = None;
                return Err(err);
            }
            self.got_pkt = true;
            self.last_pkt_ts = pkt.timestamp;

            if let PktData::Window { width, height } = pkt.data {
                // A window identical to the last emitted one is dropped
                if self.got_window && width == self.last_width && height == self.last_height {
                    continue;
                }
                self.got_window = true;
                self.last_width = width;
                self.last_height = height;
            }

            return Ok(Some(pkt));
        }
    }

    /// Reads messages until one passes the configured filters.
    fn next_matching_msg(&mut self) -> Result<Option<Msg>> {
        loop {
            let Some(obj) = self.reader.read()? else {
                return Ok(None);
            };
            let msg = Msg::parse(&obj)?;

            if let Some(hostname) = &self.config.hostname
                && msg.host != *hostname
            {
                continue;
            }
            if self.config.filter_recording && msg.rec != self.config.recording {
                continue;
            }
            if let Some(username) = &self.config.username
                && msg.user != *username
            {
                continue;
            }
            if let Some(terminal) = &self.config.terminal
                && msg.term != *terminal
            {
                return Err(Error::TerminalMismatch {
                    expected: terminal.clone(),
                    actual: msg.term,
                });
            }
            if let Some(session_id) = self.config.session_id
                && msg.session != session_id
            {
                continue;
            }

            return Ok(Some(msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemJsonReader;

    fn line(id: u64, fields: &str) -> String {
        format!(
            "{{\"ver\":\"2.2\",\"host\":\"host\",\"rec\":\"rec-1\",\"user\":\"user\",\
             \"term\":\"xterm\",\"session\":7,\"id\":{id},{fields}}}\n"
        )
    }

    fn source_over(text: String, config: SourceConfig) -> JsonSource<MemJsonReader> {
        JsonSource::new(MemJsonReader::from_bytes(text), config).unwrap()
    }

    fn default_source(text: String) -> JsonSource<MemJsonReader> {
        source_over(text, SourceConfig::with_io_size(1024))
    }

    fn drain(src: &mut JsonSource<MemJsonReader>) -> Vec<Pkt<'static>> {
        let mut out = Vec::new();
        while let Some(pkt) = src.read().unwrap() {
            out.push(pkt);
        }
        out
    }

    fn ms(n: i64) -> TimeSpec {
        TimeSpec::from_ms(n)
    }

    #[test]
    fn replays_packets_across_messages() {
        let text = line(
            1,
            "\"pos\":0,\"timing\":\">1+250>1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"AB\",\"out_bin\":[]",
        ) + &line(
            2,
            "\"pos\":1000,\"timing\":\"<2\",\"in_txt\":\"hi\",\"in_bin\":[],\
             \"out_txt\":\"\",\"out_bin\":[]",
        );
        let mut src = default_source(text);
        let pkts = drain(&mut src);
        assert_eq!(
            pkts,
            [
                Pkt::io(ms(0), true, b"A".to_vec()),
                Pkt::io(ms(250), true, b"B".to_vec()),
                Pkt::io(ms(1000), false, b"hi".to_vec()),
            ]
        );
    }

    #[test]
    fn strict_mode_requires_consecutive_ids() {
        let text = line(
            1,
            "\"pos\":0,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"A\",\"out_bin\":[]",
        ) + &line(
            3,
            "\"pos\":10,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"B\",\"out_bin\":[]",
        );
        let mut src = default_source(text.clone());
        assert!(src.read().unwrap().is_some());
        assert!(matches!(
            src.read(),
            Err(Error::MsgIdOutOfOrder { id: 3, last: 1 })
        ));

        // Lax mode only requires increase
        let mut config = SourceConfig::with_io_size(1024);
        config.lax = true;
        let mut src = source_over(text, config);
        assert_eq!(drain(&mut src).len(), 2);
    }

    #[test]
    fn lax_mode_still_rejects_regression() {
        let text = line(
            5,
            "\"pos\":0,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"A\",\"out_bin\":[]",
        ) + &line(
            5,
            "\"pos\":10,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"B\",\"out_bin\":[]",
        );
        let mut config = SourceConfig::with_io_size(1024);
        config.lax = true;
        let mut src = source_over(text, config);
        assert!(src.read().unwrap().is_some());
        assert!(matches!(src.read(), Err(Error::MsgIdOutOfOrder { .. })));
    }

    #[test]
    fn timestamps_must_be_monotonic_across_messages() {
        let text = line(
            1,
            "\"pos\":1000,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"A\",\"out_bin\":[]",
        ) + &line(
            2,
            "\"pos\":500,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"B\",\"out_bin\":[]",
        );
        let mut src = default_source(text);
        assert!(src.read().unwrap().is_some());
        assert!(matches!(src.read(), Err(Error::PktTsOutOfOrder { .. })));
    }

    #[test]
    fn identical_windows_coalesce() {
        let text = line(
            1,
            "\"pos\":0,\"timing\":\"=80x24>1=80x24+10=132x43\",\"in_txt\":\"\",\
             \"in_bin\":[],\"out_txt\":\"A\",\"out_bin\":[]",
        );
        let mut src = default_source(text);
        let pkts = drain(&mut src);
        assert_eq!(
            pkts,
            [
                Pkt::window(ms(0), 80, 24),
                Pkt::io(ms(0), true, b"A".to_vec()),
                Pkt::window(ms(10), 132, 43),
            ]
        );
    }

    #[test]
    fn mismatched_filters_skip_messages_silently() {
        let other_host = "{\"ver\":\"2.2\",\"host\":\"elsewhere\",\"rec\":\"rec-1\",\
                          \"user\":\"user\",\"term\":\"xterm\",\"session\":7,\"id\":4,\
                          \"pos\":0,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
                          \"out_txt\":\"Z\",\"out_bin\":[]}\n"
            .to_owned();
        let text = other_host
            + &line(
                1,
                "\"pos\":0,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
                 \"out_txt\":\"A\",\"out_bin\":[]",
            );
        let mut config = SourceConfig::with_io_size(1024);
        config.hostname = Some("host".into());
        let mut src = source_over(text, config);
        let pkts = drain(&mut src);
        assert_eq!(pkts, [Pkt::io(ms(0), true, b"A".to_vec())]);
    }

    #[test]
    fn terminal_mismatch_fails_the_read() {
        let text = line(
            1,
            "\"pos\":0,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
             \"out_txt\":\"A\",\"out_bin\":[]",
        );
        let mut config = SourceConfig::with_io_size(1024);
        config.terminal = Some("vt100".into());
        let mut src = source_over(text, config);
        assert!(matches!(src.read(), Err(Error::TerminalMismatch { .. })));
    }

    #[test]
    fn recording_filter_matches_presence_and_value() {
        let legacy = "{\"ver\":\"1\",\"host\":\"host\",\"user\":\"user\",\
                      \"term\":\"xterm\",\"session\":7,\"id\":1,\"pos\":\"0.000\",\
                      \"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
                      \"out_txt\":\"L\",\"out_bin\":[]}\n"
            .to_owned();
        let text = legacy
            + &line(
                2,
                "\"pos\":10,\"timing\":\">1\",\"in_txt\":\"\",\"in_bin\":[],\
                 \"out_txt\":\"A\",\"out_bin\":[]",
            );

        // Filtering for rec-1 drops the legacy message without a rec field
        let mut config = SourceConfig::with_io_size(1024);
        config.filter_recording = true;
        config.recording = Some("rec-1".into());
        let mut src = source_over(text.clone(), config);
        let pkts = drain(&mut src);
        assert_eq!(pkts, [Pkt::io(ms(10), true, b"A".to_vec())]);

        // Filtering for "no recording id" keeps only the legacy message
        let mut config = SourceConfig::with_io_size(1024);
        config.filter_recording = true;
        config.recording = None;
        let mut src = source_over(text, config);
        let pkts = drain(&mut src);
        assert_eq!(pkts, [Pkt::io(ms(0), true, b"L".to_vec())]);
    }

    #[test]
    fn io_size_must_hold_a_character() {
        let err = JsonSource::new(
            MemJsonReader::from_bytes(""),
            SourceConfig::with_io_size(3),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParam("io_size")));
    }

    #[test]
    fn empty_input_is_a_clean_end() {
        let mut src = default_source(String::new());
        assert!(src.read().unwrap().is_none());
        assert_eq!(src.format_loc(src.loc()), "line 0");
    }
}
