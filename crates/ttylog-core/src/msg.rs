//! One parsed log message and its packet replay cursor.
//!
//! Parsing validates every field's presence, type and range up front;
//! replay then walks the timing string, pairing its run tokens with the
//! text and binary payloads and handing back timestamped packets. Payload
//! exhaustion, malformed tokens and out-of-range values all surface as
//! distinct validation errors.

use serde_json::Value;
use ttylog_proto::{DELAY_MAX_MS, Pkt, TimeSpec};

use crate::error::{Error, Result};

/// Minimum I/O buffer size a replay can work with: the longest UTF-8
/// character must fit into one packet.
pub const IO_SIZE_MIN: usize = 4;

/// The timing entry currently being replayed.
#[derive(Debug, Clone, Copy)]
struct Run {
    output: bool,
    binary: bool,
    /// Characters (text) or bytes (binary) left in the entry.
    rem: usize,
}

/// A single validated message, with replay progress.
#[derive(Debug)]
pub struct Msg {
    /// Hostname the message was recorded on.
    pub host: String,
    /// Recording id; absent only in legacy `1.x` messages.
    pub rec: Option<String>,
    /// Recording username.
    pub user: String,
    /// Terminal type string.
    pub term: String,
    /// Audit session id.
    pub session: u32,
    /// Message sequence number.
    pub id: u64,
    /// Offset of this chunk's first event from the recording start.
    pub pos: TimeSpec,

    timing: Vec<u8>,
    timing_pos: usize,
    in_txt: String,
    in_txt_pos: usize,
    in_bin: Vec<u8>,
    in_bin_pos: usize,
    out_txt: String,
    out_txt_pos: usize,
    out_bin: Vec<u8>,
    out_bin_pos: usize,
    ts: TimeSpec,
    run: Option<Run>,
}

/// Fetches a required field.
fn get<'a>(obj: &'a serde_json::Map<String, Value>, name: &'static str) -> Result<&'a Value> {
    obj.get(name).ok_or(Error::MissingField(name))
}

/// Fetches a required string field.
fn get_str(obj: &serde_json::Map<String, Value>, name: &'static str) -> Result<String> {
    get(obj, name)?
        .as_str()
        .map(str::to_owned)
        .ok_or(Error::WrongFieldType(name))
}

/// Parses `ver` into major/minor, enforcing compatibility.
fn parse_ver(ver: &str) -> Result<(u32, u32)> {
    let (major, minor) = match ver.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (ver, "0"),
    };
    let major: u32 = major.parse().map_err(|_| Error::InvalidVer(ver.into()))?;
    let minor: u32 = minor.parse().map_err(|_| Error::InvalidVer(ver.into()))?;
    match major {
        1 => Ok((major, minor)),
        2 if minor <= 2 => Ok((major, minor)),
        _ => Err(Error::InvalidVer(ver.into())),
    }
}

/// Parses the legacy `"SSS.NNN"` position form.
fn parse_legacy_pos(s: &str) -> Result<TimeSpec> {
    let parse = || -> Option<TimeSpec> {
        let (sec, frac) = s.split_once('.')?;
        if frac.len() != 3 {
            return None;
        }
        let sec: i64 = sec.parse().ok()?;
        let ms: i64 = frac.parse().ok()?;
        if sec < 0 {
            return None;
        }
        Some(TimeSpec::new(sec, ms * 1_000_000))
    };
    parse().ok_or_else(|| Error::InvalidPos(s.into()))
}

/// Parses a binary payload array into bytes.
fn parse_bin(value: &Value, name: &'static str) -> Result<Vec<u8>> {
    let arr = value.as_array().ok_or(Error::WrongFieldType(name))?;
    let mut out = Vec::with_capacity(arr.len());
    for entry in arr {
        let b = entry
            .as_u64()
            .filter(|&b| b <= 255)
            .ok_or_else(|| Error::InvalidBin(format!("entry {entry} out of range in {name}")))?;
        out.push(b as u8);
    }
    Ok(out)
}

impl Msg {
    /// Validates one JSON object into a replayable message.
    pub fn parse(value: &Value) -> Result<Msg> {
        let obj = value.as_object().ok_or(Error::WrongFieldType("message"))?;

        let (major, _minor) = parse_ver(&get_str(obj, "ver")?)?;

        let host = get_str(obj, "host")?;
        let rec = if major >= 2 {
            Some(get_str(obj, "rec")?)
        } else {
            match obj.get("rec") {
                Some(v) => Some(
                    v.as_str()
                        .map(str::to_owned)
                        .ok_or(Error::WrongFieldType("rec"))?,
                ),
                None => None,
            }
        };
        let user = get_str(obj, "user")?;
        let term = get_str(obj, "term")?;

        let session = get(obj, "session")?
            .as_i64()
            .ok_or(Error::WrongFieldType("session"))?;
        if session < 1 || session > i64::from(u32::MAX) {
            return Err(Error::InvalidSession(session));
        }

        let id = get(obj, "id")?
            .as_i64()
            .ok_or(Error::WrongFieldType("id"))?;
        if id < 1 {
            return Err(Error::InvalidId(id));
        }

        let pos = match get(obj, "pos")? {
            Value::Number(n) => {
                let ms = n.as_i64().ok_or_else(|| Error::InvalidPos(n.to_string()))?;
                if ms < 0 {
                    return Err(Error::InvalidPos(n.to_string()));
                }
                TimeSpec::from_ms(ms)
            }
            Value::String(s) => parse_legacy_pos(s)?,
            _ => return Err(Error::WrongFieldType("pos")),
        };

        let timing = get_str(obj, "timing")?.into_bytes();
        let in_txt = get_str(obj, "in_txt")?;
        let out_txt = get_str(obj, "out_txt")?;
        let in_bin = parse_bin(get(obj, "in_bin")?, "in_bin")?;
        let out_bin = parse_bin(get(obj, "out_bin")?, "out_bin")?;

        Ok(Msg {
            host,
            rec,
            user,
            term,
            session: session as u32,
            id: id as u64,
            pos,
            timing,
            timing_pos: 0,
            in_txt,
            in_txt_pos: 0,
            in_bin,
            in_bin_pos: 0,
            out_txt,
            out_txt_pos: 0,
            out_bin,
            out_bin_pos: 0,
            ts: pos,
            run: None,
        })
    }

    /// Replays the next packet, or `None` once the timing string is
    /// exhausted. I/O packets carry at most `io_size` bytes and never
    /// split a character; `io_size` must be at least [`IO_SIZE_MIN`].
    pub fn read(&mut self, io_size: usize) -> Result<Option<Pkt<'static>>> {
        debug_assert!(io_size >= IO_SIZE_MIN);
        loop {
            if let Some(run) = self.run {
                if run.rem == 0 {
                    self.run = None;
                    continue;
                }
                return self.emit_io(run, io_size).map(Some);
            }

            let Some(&c) = self.timing.get(self.timing_pos) else {
                return Ok(None);
            };
            self.timing_pos += 1;
            match c {
                b'+' => {
                    let ms = self.take_num()?;
                    if ms > DELAY_MAX_MS as u64 {
                        return Err(Error::InvalidTiming(format!("delay {ms}ms too large")));
                    }
                    self.ts = self.ts.cap_add(TimeSpec::from_ms(ms as i64));
                }
                b'<' | b'>' => {
                    let n = self.take_num()?;
                    self.run = Some(Run {
                        output: c == b'>',
                        binary: false,
                        rem: n as usize,
                    });
                }
                b'[' | b']' => {
                    let n = self.take_num()?;
                    // The cut-character count is informational on replay
                    if self.timing.get(self.timing_pos) == Some(&b'/') {
                        self.timing_pos += 1;
                        self.take_num()?;
                    }
                    self.run = Some(Run {
                        output: c == b']',
                        binary: true,
                        rem: n as usize,
                    });
                }
                b'=' => {
                    let width = self.take_num()?;
                    if self.timing.get(self.timing_pos) != Some(&b'x') {
                        return Err(Error::InvalidTiming("malformed window token".into()));
                    }
                    self.timing_pos += 1;
                    let height = self.take_num()?;
                    if width > u64::from(u16::MAX) || height > u64::from(u16::MAX) {
                        return Err(Error::InvalidTiming(format!(
                            "window {width}x{height} out of range"
                        )));
                    }
                    return Ok(Some(Pkt::window(self.ts, width as u16, height as u16)));
                }
                other => {
                    return Err(Error::InvalidTiming(format!(
                        "unexpected byte {:?} at offset {}",
                        char::from(other),
                        self.timing_pos - 1
                    )));
                }
            }
        }
    }

    /// Reads the decimal number following a token marker.
    fn take_num(&mut self) -> Result<u64> {
        let start = self.timing_pos;
        while self
            .timing
            .get(self.timing_pos)
            .is_some_and(u8::is_ascii_digit)
        {
            self.timing_pos += 1;
        }
        let digits = &self.timing[start..self.timing_pos];
        if digits.is_empty() {
            return Err(Error::InvalidTiming(format!(
                "number expected at offset {start}"
            )));
        }
        // Valid UTF-8: digits only
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::InvalidTiming(format!("number too large at offset {start}")))
    }

    /// Emits the next slice of the current I/O run.
    fn emit_io(&mut self, run: Run, io_size: usize) -> Result<Pkt<'static>> {
        let bytes = if run.binary {
            let (arr, pos) = if run.output {
                (&self.out_bin, &mut self.out_bin_pos)
            } else {
                (&self.in_bin, &mut self.in_bin_pos)
            };
            let avail = arr.len() - *pos;
            let take = run.rem.min(io_size).min(avail);
            if take == 0 {
                return Err(Error::InvalidBin(
                    "binary run overruns the payload array".into(),
                ));
            }
            let bytes = arr[*pos..*pos + take].to_vec();
            *pos += take;
            self.run = Some(Run {
                rem: run.rem - take,
                ..run
            });
            bytes
        } else {
            let (txt, pos) = if run.output {
                (&self.out_txt, &mut self.out_txt_pos)
            } else {
                (&self.in_txt, &mut self.in_txt_pos)
            };
            let tail = &txt[*pos..];
            let mut nbytes = 0;
            let mut nchars = 0;
            for ch in tail.chars() {
                if nchars == run.rem || nbytes + ch.len_utf8() > io_size {
                    break;
                }
                nbytes += ch.len_utf8();
                nchars += 1;
            }
            if nchars == 0 {
                return Err(Error::InvalidTxt("text run overruns the payload".into()));
            }
            let bytes = tail.as_bytes()[..nbytes].to_vec();
            *pos += nbytes;
            self.run = Some(Run {
                rem: run.rem - nchars,
                ..run
            });
            bytes
        };
        Ok(Pkt::io(self.ts, run.output, bytes))
    }
}
