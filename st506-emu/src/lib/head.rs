use log::trace;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::geometry::Geometry;
use crate::signals::ReadRetarget;

/// Tracks the host's head-select line and keeps the read stream pointed at
/// the selected head's track. Touches nothing but its own state and the
/// retarget primitive, so it is safe to drive from an interrupt context
/// while the polling loop owns the cylinder buffer.
#[derive(Debug)]
pub struct HeadTracker {
    geometry: Geometry,
    head: AtomicU32,
    buffer_base: AtomicUsize,  // Zero while no buffer is attached.
}

impl HeadTracker {
    pub fn new(geometry: Geometry) -> Self {
        HeadTracker {
            geometry,
            head: AtomicU32::new(0),
            buffer_base: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> u32 {
        self.head.load(Ordering::Acquire)
    }

    /// Address the read stream should use for the current head.
    pub fn read_source(&self) -> usize {
        self.buffer_base.load(Ordering::Acquire) + self.geometry.track_offset(self.current())
    }

    /// Bind to a freshly allocated cylinder buffer, starting on head 0.
    pub(crate) fn attach(&self, buffer_base: usize) {
        self.head.store(0, Ordering::Release);
        self.buffer_base.store(buffer_base, Ordering::Release);
    }

    pub(crate) fn detach(&self) {
        self.buffer_base.store(0, Ordering::Release);
        self.head.store(0, Ordering::Release);
    }

    /// React to a head-select edge. Returns true if the head changed and the
    /// read source was retargeted.
    pub fn select(&self, head: u32, retarget: &dyn ReadRetarget) -> bool {
        let base = self.buffer_base.load(Ordering::Acquire);
        if base == 0 {
            return false;
        }
        let head = self.geometry.clamp_head(head);
        if self.head.swap(head, Ordering::AcqRel) == head {
            return false;
        }
        let address = base + self.geometry.track_offset(head);
        retarget.retarget_read_source(address);
        trace!("Head {} selected, read source now {:#X}.", head, address);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingRetarget(Mutex<Vec<usize>>);

    impl ReadRetarget for RecordingRetarget {
        fn retarget_read_source(&self, address: usize) {
            self.0.lock().unwrap().push(address);
        }
    }

    const GEOMETRY: Geometry = Geometry::new(4, 2, 4096);
    const BASE: usize = 0x2000_0000;

    #[test]
    fn test_select_retargets_once_per_change() {
        let tracker = HeadTracker::new(GEOMETRY);
        let retarget = RecordingRetarget(Mutex::new(Vec::new()));
        tracker.attach(BASE);
        assert_eq!(tracker.read_source(), BASE);

        assert!(tracker.select(1, &retarget));
        assert!(!tracker.select(1, &retarget));
        assert!(tracker.select(0, &retarget));
        assert_eq!(*retarget.0.lock().unwrap(), vec![BASE + 4096, BASE]);
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn test_select_clamps() {
        let tracker = HeadTracker::new(GEOMETRY);
        let retarget = RecordingRetarget(Mutex::new(Vec::new()));
        tracker.attach(BASE);

        assert!(tracker.select(9, &retarget));
        assert_eq!(tracker.current(), 1);
        // Clamps to the head already selected, so nothing happens.
        assert!(!tracker.select(5, &retarget));
        assert_eq!(*retarget.0.lock().unwrap(), vec![BASE + 4096]);
        assert_eq!(tracker.read_source(), BASE + 4096);
    }

    #[test]
    fn test_ignored_while_detached() {
        let tracker = HeadTracker::new(GEOMETRY);
        let retarget = RecordingRetarget(Mutex::new(Vec::new()));
        assert!(!tracker.select(1, &retarget));
        assert_eq!(tracker.current(), 0);
        assert!(retarget.0.lock().unwrap().is_empty());
    }
}
