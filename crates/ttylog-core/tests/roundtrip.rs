//! End-to-end recording/replay round trips over in-memory transports.

use ttylog_core::{JsonSink, JsonSource, MemJsonReader, MemJsonWriter, SinkConfig, SourceConfig};
use ttylog_proto::{DELAY_MAX_MS, Pkt, PktData, TimeSpec};

fn config(chunk_size: usize) -> SinkConfig {
    SinkConfig {
        hostname: "host".into(),
        recording: "3c4e-test".into(),
        username: "user".into(),
        terminal: "xterm".into(),
        session_id: 1,
        chunk_size,
    }
}

fn record(chunk_size: usize, pkts: &[Pkt<'_>]) -> Vec<u8> {
    let mut sink = JsonSink::new(MemJsonWriter::new(), &config(chunk_size)).unwrap();
    for pkt in pkts {
        sink.write(pkt).unwrap();
    }
    sink.cut().unwrap();
    sink.flush().unwrap();
    sink.into_writer().into_inner()
}

fn replay(bytes: Vec<u8>) -> Vec<Pkt<'static>> {
    let mut source = JsonSource::new(
        MemJsonReader::from_bytes(bytes),
        SourceConfig::with_io_size(1024),
    )
    .unwrap();
    let mut out = Vec::new();
    while let Some(pkt) = source.read().unwrap() {
        out.push(pkt);
    }
    out
}

/// Flattens packets into per-byte I/O events and a window list.
#[allow(clippy::type_complexity)]
fn normalize(pkts: &[Pkt<'_>]) -> (Vec<(i64, bool, u8)>, Vec<(i64, u16, u16)>) {
    let mut io = Vec::new();
    let mut windows = Vec::new();
    for pkt in pkts {
        match &pkt.data {
            PktData::Void => {}
            PktData::Window { width, height } => {
                windows.push((pkt.timestamp.to_ms(), *width, *height));
            }
            PktData::Io { output, buf } => {
                io.extend(buf.iter().map(|&b| (pkt.timestamp.to_ms(), *output, b)));
            }
        }
    }
    (io, windows)
}

fn ms(n: i64) -> TimeSpec {
    TimeSpec::from_ms(n)
}

fn session() -> Vec<Pkt<'static>> {
    vec![
        Pkt::window(ms(0), 80, 24),
        Pkt::io(ms(0), false, b"ls -l\n".to_vec()),
        Pkt::io(ms(5), true, b"total 0\r\n".to_vec()),
        Pkt::io(ms(5), true, vec![0x1b, b'[', b'3', b'1', b'm']),
        Pkt::io(ms(5), true, vec![0xff, 0xfe]),
        Pkt::io(ms(250), true, "\u{1d11e}".as_bytes().to_vec()),
        Pkt::window(ms(250), 80, 24),
        Pkt::window(ms(300), 132, 43),
        Pkt::io(ms(300), false, "exit\u{00e9}\n".as_bytes().to_vec()),
    ]
}

#[test]
fn single_message_roundtrip_is_exact() {
    let pkts = session();
    let bytes = record(1024, &pkts);
    assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);

    let replayed = replay(bytes);
    let (io_in, win_in) = normalize(&pkts);
    let (io_out, win_out) = normalize(&replayed);

    assert_eq!(io_out, io_in);
    // The second 80x24 window is coalesced away
    assert_eq!(win_out, [(0, 80, 24), (300, 132, 43)]);
    assert_eq!(win_in.len(), 3);
}

#[test]
fn tiny_chunks_roundtrip_to_the_same_stream() {
    let pkts = session();
    let large = replay(record(1024, &pkts));
    let small = replay(record(32, &pkts));
    assert_eq!(normalize(&large), normalize(&small));
}

#[test]
fn every_emitted_line_is_canonical_json() {
    let bytes = record(48, &session());
    let text = String::from_utf8(bytes).unwrap();
    let mut prev_id = 0;
    for line in text.lines() {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        for field in [
            "ver", "host", "rec", "user", "term", "session", "id", "pos", "timing", "in_txt",
            "in_bin", "out_txt", "out_bin",
        ] {
            assert!(v.get(field).is_some(), "field {field} missing in {line}");
        }
        assert_eq!(v["id"].as_u64().unwrap(), prev_id + 1);
        prev_id = v["id"].as_u64().unwrap();
    }
    assert!(prev_id > 1, "small chunks must split the session");
}

#[test]
fn cut_demotes_trailing_incomplete_character() {
    let pkts = vec![
        Pkt::io(ms(0), false, b"X".to_vec()),
        Pkt::io(ms(0), false, vec![0xf0, 0x9d]),
    ];
    let replayed = replay(record(1024, &pkts));
    let (io, _) = normalize(&replayed);
    assert_eq!(io, [(0, false, b'X'), (0, false, 0xf0), (0, false, 0x9d)]);
}

#[test]
fn character_split_across_packets_survives() {
    let g_clef = "\u{1d11e}".as_bytes();
    let pkts = vec![
        Pkt::io(ms(0), true, g_clef[..2].to_vec()),
        Pkt::io(ms(2), true, g_clef[2..].to_vec()),
    ];
    let replayed = replay(record(1024, &pkts));
    assert_eq!(replayed.len(), 1);
    // The character completes at the second write's timestamp
    assert_eq!(replayed[0], Pkt::io(ms(2), true, g_clef.to_vec()));
}

#[test]
fn sub_millisecond_delays_collapse() {
    let step = TimeSpec::new(0, 400_000);
    let pkts = vec![
        Pkt::io(TimeSpec::ZERO, true, b"a".to_vec()),
        Pkt::io(step, true, b"b".to_vec()),
        Pkt::io(step + step, true, b"c".to_vec()),
    ];
    let replayed = replay(record(1024, &pkts));
    for pkt in &replayed {
        assert_eq!(pkt.timestamp, TimeSpec::ZERO);
    }
    let (io, _) = normalize(&replayed);
    assert_eq!(io.len(), 3);
}

#[test]
fn delay_past_maximum_splits_into_two_messages() {
    let pkts = vec![
        Pkt::io(ms(0), true, b"a".to_vec()),
        Pkt::io(ms(DELAY_MAX_MS + 1000), true, b"b".to_vec()),
    ];
    let bytes = record(1024, &pkts);
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert_eq!(text.lines().count(), 2);
    let second: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
    assert_eq!(second["pos"].as_i64().unwrap(), DELAY_MAX_MS + 1000);

    let replayed = replay(bytes);
    assert_eq!(replayed[0].timestamp, ms(0));
    assert_eq!(replayed[1].timestamp, ms(DELAY_MAX_MS + 1000));
}

#[test]
fn maximum_delay_stays_in_one_message() {
    let pkts = vec![
        Pkt::io(ms(0), true, b"a".to_vec()),
        Pkt::io(ms(DELAY_MAX_MS), true, b"b".to_vec()),
    ];
    let bytes = record(1024, &pkts);
    assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
    let replayed = replay(bytes);
    assert_eq!(replayed[1].timestamp, ms(DELAY_MAX_MS));
}

#[test]
fn leading_invalid_byte_opens_a_binary_run() {
    let pkts = vec![Pkt::io(ms(0), false, vec![0x9d])];
    let bytes = record(1024, &pkts);
    let text = String::from_utf8(bytes.clone()).unwrap();
    let v: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(v["timing"], "[1/0");
    assert_eq!(v["in_bin"][0], 157);
    assert_eq!(v["in_txt"], "");

    let (io, _) = normalize(&replay(bytes));
    assert_eq!(io, [(0, false, 0x9d)]);
}

#[test]
fn control_and_quote_heavy_output_survives() {
    let payload = b"\"quoted\"\t\\backslash\\\r\n\x07\x7f".to_vec();
    let pkts = vec![Pkt::io(ms(0), true, payload.clone())];
    let replayed = replay(record(1024, &pkts));
    let (io, _) = normalize(&replayed);
    let expected: Vec<_> = payload.iter().map(|&b| (0, true, b)).collect();
    assert_eq!(io, expected);
}
