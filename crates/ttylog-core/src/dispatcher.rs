//! The narrow interface streams use to talk to their enclosing chunk.
//!
//! A [`TimingTrack`] holds the chunk's shared metadata buffer and the
//! single remaining-space budget covering timing, text and binary bytes
//! alike. Streams never touch the track directly: the chunk lends each of
//! them a [`Dispatcher`] view for the duration of an operation, which
//! keeps the two sides independently testable.

/// The shared timing buffer plus the chunk-wide byte budget.
#[derive(Debug)]
pub struct TimingTrack {
    data: Vec<u8>,
    rem: usize,
    size: usize,
}

impl TimingTrack {
    /// Creates an empty track with a `size`-byte budget.
    pub fn new(size: usize) -> Self {
        TimingTrack {
            data: Vec::with_capacity(size),
            rem: size,
            size,
        }
    }

    /// The metadata bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of metadata bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if no metadata has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Unreserved budget bytes.
    pub fn rem(&self) -> usize {
        self.rem
    }

    /// The full budget.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Drops all content and returns the budget to `size`.
    pub fn empty(&mut self) {
        self.data.clear();
        self.rem = self.size;
    }

    /// Rolls written length and budget back to a snapshot.
    pub(crate) fn restore(&mut self, len: usize, rem: usize) {
        self.data.truncate(len);
        self.rem = rem;
    }
}

/// A borrowed budget-and-append view over a [`TimingTrack`].
#[derive(Debug)]
pub struct Dispatcher<'a> {
    track: &'a mut TimingTrack,
}

impl<'a> Dispatcher<'a> {
    /// Lends a dispatcher over the track.
    pub fn new(track: &'a mut TimingTrack) -> Self {
        Dispatcher { track }
    }

    /// Takes `len` bytes out of the budget. Succeeds completely or leaves
    /// the budget untouched.
    pub fn reserve(&mut self, len: usize) -> bool {
        if self.track.rem < len {
            return false;
        }
        self.track.rem -= len;
        true
    }

    /// Appends metadata bytes. The space must have been reserved first.
    pub fn write(&mut self, bytes: &[u8]) {
        debug_assert!(
            self.track.data.len() + bytes.len() <= self.track.size,
            "timing write past reserved space"
        );
        self.track.data.extend_from_slice(bytes);
    }
}
