//! Nested transaction support.
//!
//! Composite operations across the chunk, its streams and the shared
//! timing track must be atomic: they either take effect completely or
//! leave no trace. Every participating object reserves one inline snapshot
//! slot per nesting level; a scope lists its participants in a frame and
//! drives them with begin / abort / commit. Beginning a transaction at
//! depth zero backs participants up, nested begins only increase the
//! depth, and the matching abort/commit at depth one restores/discards.
//!
//! Participants declare every mutated field in their snapshot; fields not
//! captured are not rolled back. The layer is single-threaded cooperative:
//! two transactions at the same level must never overlap on one object,
//! which the slot occupancy check enforces.

/// Number of supported nesting levels.
pub const LEVEL_NUM: usize = 4;

/// The action a frame applies to each participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Act {
    /// Snapshot transaction-relevant state into the level's slot.
    Backup,
    /// Load the level's snapshot back, dropping it.
    Restore,
    /// Drop the level's snapshot without loading it.
    Discard,
}

/// A transaction's packed progress: the nesting level its snapshots live
/// at plus the current begin/commit stack depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrxState {
    level: u8,
    depth: u8,
}

impl TrxState {
    /// Deepest supported begin nesting.
    pub const MAX_DEPTH: u8 = 15;

    /// Creates a state for a transaction at the given level.
    ///
    /// # Panics
    ///
    /// Panics if `level` is not below [`LEVEL_NUM`].
    pub fn new(level: usize) -> Self {
        assert!(level < LEVEL_NUM, "transaction level out of range");
        TrxState {
            level: level as u8,
            depth: 0,
        }
    }

    /// The snapshot level this transaction uses.
    pub fn level(&self) -> usize {
        usize::from(self.level)
    }

    /// Current begin nesting depth.
    pub fn depth(&self) -> usize {
        usize::from(self.depth)
    }
}

/// An object whose mutable state can participate in transactions.
///
/// Composite objects forward the call to each embedded participant in
/// addition to acting on their own slots.
pub trait TrxParticipant {
    /// Applies one transaction action at one level.
    fn act(&mut self, level: usize, act: Act);
}

/// Inline per-level snapshot storage for one participant.
///
/// An occupied slot marks the level as backed up; the accessors ignore
/// redundant backups and spurious restores/discards, matching the
/// frame-nesting rules above.
#[derive(Debug, Clone, Copy)]
pub struct TrxSlots<S: Copy> {
    slots: [Option<S>; LEVEL_NUM],
}

impl<S: Copy> Default for TrxSlots<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Copy> TrxSlots<S> {
    /// Creates empty slots.
    pub const fn new() -> Self {
        TrxSlots {
            slots: [None; LEVEL_NUM],
        }
    }

    /// True if the level has no snapshot yet.
    pub fn is_vacant(&self, level: usize) -> bool {
        self.slots[level].is_none()
    }

    /// Stores a snapshot for the level unless one is already present.
    pub fn put(&mut self, level: usize, snapshot: S) {
        self.slots[level].get_or_insert(snapshot);
    }

    /// Removes and returns the level's snapshot, if any.
    pub fn take(&mut self, level: usize) -> Option<S> {
        self.slots[level].take()
    }
}

/// Begins (or nests into) a transaction over the frame's participants.
pub fn begin(state: &mut TrxState, frame: &mut [&mut dyn TrxParticipant]) {
    assert!(state.depth < TrxState::MAX_DEPTH, "transaction nested too deep");
    if state.depth == 0 {
        for p in frame.iter_mut() {
            p.act(state.level(), Act::Backup);
        }
    }
    state.depth += 1;
}

/// Aborts a transaction, restoring participants once the outermost scope
/// unwinds.
pub fn abort(state: &mut TrxState, frame: &mut [&mut dyn TrxParticipant]) {
    assert!(state.depth > 0, "abort without begin");
    state.depth -= 1;
    if state.depth == 0 {
        for p in frame.iter_mut() {
            p.act(state.level(), Act::Restore);
        }
    }
}

/// Commits a transaction, discarding snapshots once the outermost scope
/// completes.
pub fn commit(state: &mut TrxState, frame: &mut [&mut dyn TrxParticipant]) {
    assert!(state.depth > 0, "commit without begin");
    state.depth -= 1;
    if state.depth == 0 {
        for p in frame.iter_mut() {
            p.act(state.level(), Act::Discard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: i64,
        trx: TrxSlots<i64>,
    }

    impl Counter {
        fn new(value: i64) -> Self {
            Counter {
                value,
                trx: TrxSlots::new(),
            }
        }
    }

    impl TrxParticipant for Counter {
        fn act(&mut self, level: usize, act: Act) {
            match act {
                Act::Backup => {
                    if self.trx.is_vacant(level) {
                        self.trx.put(level, self.value);
                    }
                }
                Act::Restore => {
                    if let Some(v) = self.trx.take(level) {
                        self.value = v;
                    }
                }
                Act::Discard => {
                    self.trx.take(level);
                }
            }
        }
    }

    #[test]
    fn abort_restores_commit_keeps() {
        let mut c = Counter::new(1);

        let mut state = TrxState::new(0);
        begin(&mut state, &mut [&mut c]);
        c.value = 2;
        abort(&mut state, &mut [&mut c]);
        assert_eq!(c.value, 1);

        let mut state = TrxState::new(0);
        begin(&mut state, &mut [&mut c]);
        c.value = 3;
        commit(&mut state, &mut [&mut c]);
        assert_eq!(c.value, 3);
    }

    #[test]
    fn nested_begins_share_one_snapshot() {
        let mut c = Counter::new(10);
        let mut state = TrxState::new(0);

        begin(&mut state, &mut [&mut c]);
        c.value = 20;
        begin(&mut state, &mut [&mut c]);
        c.value = 30;
        // Inner commit does not discard; the outer abort still restores
        // to the state at the first begin.
        commit(&mut state, &mut [&mut c]);
        assert_eq!(state.depth(), 1);
        abort(&mut state, &mut [&mut c]);
        assert_eq!(c.value, 10);
    }

    #[test]
    fn levels_are_independent() {
        let mut c = Counter::new(1);

        let mut outer = TrxState::new(0);
        begin(&mut outer, &mut [&mut c]);
        c.value = 2;

        let mut inner = TrxState::new(1);
        begin(&mut inner, &mut [&mut c]);
        c.value = 3;
        abort(&mut inner, &mut [&mut c]);
        assert_eq!(c.value, 2);

        abort(&mut outer, &mut [&mut c]);
        assert_eq!(c.value, 1);
    }

    #[test]
    fn frames_cover_all_participants() {
        let mut a = Counter::new(1);
        let mut b = Counter::new(100);

        let mut state = TrxState::new(0);
        begin(&mut state, &mut [&mut a, &mut b]);
        a.value = 2;
        b.value = 200;
        abort(&mut state, &mut [&mut a, &mut b]);
        assert_eq!((a.value, b.value), (1, 100));
    }
}
