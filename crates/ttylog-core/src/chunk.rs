//! The fixed-size packing unit behind one JSON message.
//!
//! A chunk groups an input stream and an output stream over one shared
//! timing track and one byte budget. Writes are transactions across all
//! of them: either the timestamp advance and the payload fit together, or
//! the chunk is left exactly as it was and the caller flushes it into a
//! message and retries against a fresh one.

use ttylog_proto::{DELAY_MAX, DELAY_MIN_MS, Pkt, PktData, PktPos, TimeSpec};

use crate::dispatcher::{Dispatcher, TimingTrack};
use crate::stream::Stream;
use crate::trx::{self, Act, TrxParticipant, TrxSlots, TrxState};

/// Smallest workable chunk size: must fit the largest single unit (a
/// maximum window token, or a demoted sequence plus one escaped
/// character) in an otherwise empty chunk.
pub const CHUNK_SIZE_MIN: usize = 32;

/// Snapshot of the chunk-level transaction state; stream snapshots are
/// taken by the streams themselves.
#[derive(Debug, Clone, Copy)]
struct ChunkStore {
    timing_len: usize,
    rem: usize,
    first: TimeSpec,
    last: TimeSpec,
    started: bool,
}

/// A bounded two-direction packing buffer.
#[derive(Debug)]
pub struct Chunk {
    size: usize,
    input: Stream,
    output: Stream,
    track: TimingTrack,
    first: TimeSpec,
    last: TimeSpec,
    started: bool,
    trx: TrxSlots<ChunkStore>,
}

impl Chunk {
    /// Creates an empty chunk with a `size`-byte budget.
    ///
    /// # Panics
    ///
    /// Panics if `size` is below [`CHUNK_SIZE_MIN`].
    pub fn new(size: usize) -> Self {
        assert!(size >= CHUNK_SIZE_MIN, "chunk size below minimum");
        Chunk {
            size,
            input: Stream::new(size, b'<', b'['),
            output: Stream::new(size, b'>', b']'),
            track: TimingTrack::new(size),
            first: TimeSpec::ZERO,
            last: TimeSpec::ZERO,
            started: false,
            trx: TrxSlots::new(),
        }
    }

    /// The byte budget this chunk was created with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Unconsumed budget bytes.
    pub fn rem(&self) -> usize {
        self.track.rem()
    }

    /// Timestamp of the first event recorded into this chunk.
    pub fn first(&self) -> TimeSpec {
        self.first
    }

    /// The timing metadata written so far.
    pub fn timing_bytes(&self) -> &[u8] {
        self.track.bytes()
    }

    /// The input-direction stream.
    pub fn input(&self) -> &Stream {
        &self.input
    }

    /// The output-direction stream.
    pub fn output(&self) -> &Stream {
        &self.output
    }

    /// True if nothing has been committed into the chunk.
    pub fn is_empty(&self) -> bool {
        self.track.is_empty() && self.input.is_empty() && self.output.is_empty()
    }

    /// True if either stream buffers an unfinished UTF-8 sequence.
    pub fn is_pending(&self) -> bool {
        self.input.is_pending() || self.output.is_pending()
    }

    /// Writes the packet tail at `pos` into the chunk, atomically.
    ///
    /// Returns true once the cursor is past the packet. A false return
    /// with an advanced cursor means partial progress was committed; a
    /// false return with an unmoved cursor means nothing fit and the
    /// chunk is untouched. Either way the caller flushes and retries.
    pub fn write(&mut self, pkt: &Pkt<'_>, pos: &mut PktPos) -> bool {
        if pos.is_past(pkt) {
            return true;
        }
        match &pkt.data {
            PktData::Void => true,
            PktData::Window { width, height } => {
                let (width, height) = (*width, *height);
                let mut state = TrxState::new(0);
                trx::begin(&mut state, &mut [&mut *self]);
                if !self.advance(pkt.timestamp) || !self.push_window(width, height) {
                    trx::abort(&mut state, &mut [&mut *self]);
                    return false;
                }
                trx::commit(&mut state, &mut [&mut *self]);
                pos.advance(1);
                true
            }
            PktData::Io { output, buf } => {
                let output = *output;
                let mut state = TrxState::new(0);
                trx::begin(&mut state, &mut [&mut *self]);
                if !self.advance(pkt.timestamp) {
                    trx::abort(&mut state, &mut [&mut *self]);
                    return false;
                }
                let written = {
                    let mut disp = Dispatcher::new(&mut self.track);
                    let stream = if output { &mut self.output } else { &mut self.input };
                    stream.write(&buf[pos.offset()..], &mut disp)
                };
                if written == 0 {
                    trx::abort(&mut state, &mut [&mut *self]);
                    return false;
                }
                trx::commit(&mut state, &mut [&mut *self]);
                pos.advance(written);
                pos.is_past(pkt)
            }
        }
    }

    /// Closes both streams' open runs, materializing their reserved
    /// timing markers. Content stays in place.
    pub fn flush(&mut self) {
        let mut disp = Dispatcher::new(&mut self.track);
        self.input.flush(&mut disp);
        self.output.flush(&mut disp);
    }

    /// Demotes both streams' pending UTF-8 sequences to binary, as one
    /// transaction stamped at `ts` (normally the last packet's
    /// timestamp, so a cut landing in a fresh chunk anchors its
    /// position). Returns false (and changes nothing) if it does not
    /// fit.
    pub fn cut(&mut self, ts: TimeSpec) -> bool {
        let mut state = TrxState::new(0);
        trx::begin(&mut state, &mut [&mut *self]);
        let ok = self.advance(ts) && {
            let mut disp = Dispatcher::new(&mut self.track);
            self.input.cut(&mut disp) && self.output.cut(&mut disp)
        };
        if ok {
            trx::commit(&mut state, &mut [&mut *self]);
        } else {
            trx::abort(&mut state, &mut [&mut *self]);
        }
        ok
    }

    /// Resets the chunk to fresh, keeping only pending UTF-8 state.
    pub fn empty(&mut self) {
        self.track.empty();
        self.input.empty();
        self.output.empty();
        self.first = TimeSpec::ZERO;
        self.last = TimeSpec::ZERO;
        self.started = false;
    }

    /// Records the packet timestamp: remembers it as `first` on the
    /// first event of a (content-wise) empty chunk, otherwise closes open
    /// runs and appends a `+N` delay token when at least a millisecond
    /// passed. Fails when the token does not fit or the delay exceeds the
    /// encodable maximum.
    fn advance(&mut self, ts: TimeSpec) -> bool {
        if !self.started || self.is_empty() {
            self.first = ts;
            self.last = ts;
            self.started = true;
            return true;
        }

        let delay = ts - self.last;
        debug_assert!(!delay.is_negative(), "packets must be monotonic");
        let delay = delay.max(TimeSpec::ZERO);
        if delay > DELAY_MAX {
            return false;
        }

        let ms = delay.to_ms();
        if ms >= DELAY_MIN_MS {
            let tok = format!("+{ms}");
            let mut disp = Dispatcher::new(&mut self.track);
            if !disp.reserve(tok.len()) {
                return false;
            }
            self.input.flush(&mut disp);
            self.output.flush(&mut disp);
            disp.write(tok.as_bytes());
        }
        self.last = ts;
        true
    }

    /// Appends a `=WxH` window token after closing open runs.
    fn push_window(&mut self, width: u16, height: u16) -> bool {
        let tok = format!("={width}x{height}");
        let mut disp = Dispatcher::new(&mut self.track);
        if !disp.reserve(tok.len()) {
            return false;
        }
        self.input.flush(&mut disp);
        self.output.flush(&mut disp);
        disp.write(tok.as_bytes());
        true
    }
}

impl TrxParticipant for Chunk {
    fn act(&mut self, level: usize, act: Act) {
        match act {
            Act::Backup => {
                if self.trx.is_vacant(level) {
                    let store = ChunkStore {
                        timing_len: self.track.len(),
                        rem: self.track.rem(),
                        first: self.first,
                        last: self.last,
                        started: self.started,
                    };
                    self.trx.put(level, store);
                }
            }
            Act::Restore => {
                if let Some(store) = self.trx.take(level) {
                    self.track.restore(store.timing_len, store.rem);
                    self.first = store.first;
                    self.last = store.last;
                    self.started = store.started;
                }
            }
            Act::Discard => {
                self.trx.take(level);
            }
        }
        self.input.act(level, act);
        self.output.act(level, act);
    }
}
