use std::sync::atomic::{AtomicU32, Ordering};

// Marks an empty mailbox. No geometry comes close to this many cylinders.
const EMPTY: u32 = u32::MAX;

/// Single-slot, last-write-wins mailbox for the host's latest step target.
///
/// The step event source posts from its own context; the polling loop reads
/// and clears it. Intermediate targets are silently superseded. A reader
/// must tolerate the value changing between `peek` and `clear`: `clear`
/// only discards the value it is told about, so a target posted in between
/// survives for the next poll.
#[derive(Debug)]
pub struct StepMailbox {
    slot: AtomicU32,
}

impl StepMailbox {
    pub const fn new() -> Self {
        StepMailbox { slot: AtomicU32::new(EMPTY) }
    }

    /// Overwrite the pending target.
    pub fn post(&self, cylinder: u32) {
        self.slot.store(cylinder.min(EMPTY - 1), Ordering::Release);
    }

    /// The latest unconsumed target, if any.
    pub fn peek(&self) -> Option<u32> {
        match self.slot.load(Ordering::Acquire) {
            EMPTY => None,
            cylinder => Some(cylinder),
        }
    }

    /// Remove `seen` from the mailbox unless it has already been replaced.
    pub fn clear(&self, seen: u32) {
        let _ = self.slot.compare_exchange(seen, EMPTY, Ordering::AcqRel, Ordering::Relaxed);
    }

    /// Empty the mailbox unconditionally.
    pub fn reset(&self) {
        self.slot.store(EMPTY, Ordering::Release);
    }
}

impl Default for StepMailbox {
    fn default() -> Self {
        Self::new()
    }
}
