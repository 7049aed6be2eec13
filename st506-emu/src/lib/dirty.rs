//! Tracking of host writes into the cylinder buffer, and writing them back.

use log::{debug, error, warn};
use std::iter;
use std::ops::Range;

use crate::error::{StartError, StartResult, StorageError};
use crate::geometry::{BLOCK_SIZE, Geometry};
use crate::signals::WriteNotification;
use crate::storage::Storage;

/// Result of a flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub writes: usize,
    pub bytes: usize,
    /// The write error that ended the flush early, if any. Runs after the
    /// failing one were not attempted.
    pub error: Option<StorageError>,
}

/// Per-block record of what the host has written since the last flush.
///
/// `write_all` overrides the bitmap and means "assume everything changed";
/// it always implies `write_any`. Otherwise `write_any` is set exactly when
/// some block is marked.
pub struct DirtyTracker {
    geometry: Geometry,
    blocks: Vec<bool>,
    write_any: bool,
    write_all: bool,
}

impl DirtyTracker {
    pub fn allocate(geometry: Geometry) -> StartResult<Self> {
        let count = geometry.cylinder_blocks();
        let mut blocks = Vec::new();
        blocks.try_reserve_exact(count)
            .map_err(|_| StartError::Allocation { bytes: count })?;
        blocks.resize(count, false);
        Ok(DirtyTracker {
            geometry,
            blocks,
            write_any: false,
            write_all: false,
        })
    }

    pub fn write_any(&self) -> bool {
        self.write_any
    }

    pub fn write_all(&self) -> bool {
        self.write_all
    }

    pub fn is_dirty(&self, block: usize) -> bool {
        self.blocks[block]
    }

    pub fn dirty_blocks(&self) -> usize {
        self.blocks.iter().filter(|&&dirty| dirty).count()
    }

    /// Forget everything without writing it.
    pub fn clear(&mut self) {
        self.blocks.fill(false);
        self.write_any = false;
        self.write_all = false;
    }

    /// Assume the whole cylinder changed. Used when write reports were lost.
    pub fn mark_all(&mut self) {
        self.write_all = true;
        self.write_any = true;
    }

    /// Mark every block touched by a byte range of the cylinder buffer.
    pub fn mark_bytes(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let last_block = self.blocks.len() - 1;
        let first = (range.start / BLOCK_SIZE).min(last_block);
        let last = ((range.end - 1) / BLOCK_SIZE).min(last_block);
        self.blocks[first..=last].fill(true);
        self.write_any = true;
    }

    /// Mark the blocks covered by a completed write capture.
    ///
    /// The capture pointer runs round the track being written, so a write
    /// that crossed the index wraps to the start of the same track. It is
    /// never allowed to spill into the next head's track.
    pub fn record_write(&mut self, notification: WriteNotification, buffer_base: usize) {
        let track_bytes = self.geometry.track_bytes();
        let end_byte = match notification.end_address.checked_sub(buffer_base) {
            Some(end) if end <= self.geometry.cylinder_bytes() => end,
            _ => {
                warn!("Write ending at {:#X} lies outside the cylinder buffer at {:#X}, \
                       assuming the whole cylinder changed.",
                      notification.end_address, buffer_base);
                self.mark_all();
                return;
            }
        };
        let len = (notification.transfer_count as usize).saturating_mul(4);
        if len == 0 {
            return;
        }

        // An end exactly on a track boundary belongs to the track before it.
        let track_start = end_byte.saturating_sub(1) / track_bytes * track_bytes;
        let track_end = track_start + track_bytes;
        let end = end_byte;
        if len >= track_bytes {
            self.mark_bytes(track_start..track_end);
        } else if end - track_start >= len {
            self.mark_bytes(end - len..end);
        } else {
            // Wrapped through the index.
            let wrapped = len - (end - track_start);
            self.mark_bytes(track_start..end);
            self.mark_bytes(track_end - wrapped..track_end);
        }
    }

    /// If half or more of a head's blocks are dirty, mark the whole head so
    /// it goes out in one write instead of many small ones.
    pub fn coalesce(&mut self) {
        if self.write_all {
            return;
        }
        let per_head = self.geometry.track_blocks();
        if per_head == 0 {
            return;
        }
        for head in 0..self.geometry.heads() as usize {
            let blocks = &mut self.blocks[head * per_head..(head + 1) * per_head];
            let dirty = blocks.iter().filter(|&&dirty| dirty).count();
            if dirty * 2 >= per_head && dirty < per_head {
                debug!("Head {} has {}/{} blocks modified, writing all of it.",
                       head, dirty, per_head);
                blocks.fill(true);
            }
        }
    }

    /// Byte ranges of the cylinder buffer that need writing: maximal runs of
    /// adjacent dirty blocks, clipped to the buffer.
    pub fn dirty_runs(&self) -> Vec<Range<usize>> {
        let cylinder_bytes = self.geometry.cylinder_bytes();
        if self.write_all {
            return vec![0..cylinder_bytes];
        }
        let mut runs = Vec::new();
        let mut first = None;
        for (block, &dirty) in self.blocks.iter().chain(iter::once(&false)).enumerate() {
            match (dirty, first) {
                (true, None) => first = Some(block),
                (false, Some(start)) => {
                    runs.push(start * BLOCK_SIZE..(block * BLOCK_SIZE).min(cylinder_bytes));
                    first = None;
                }
                _ => {}
            }
        }
        runs
    }

    /// Write every dirty run of `buffer` to the cylinder at `cylinder_offset`
    /// in storage, then forget all dirty state.
    ///
    /// The first failing write ends the flush and the remaining runs are
    /// lost: the host has no way to hear about it, so there is nobody to
    /// retry for.
    pub fn flush(&mut self, buffer: &[u8], storage: &mut dyn Storage,
                 cylinder_offset: u64) -> FlushReport {
        let mut report = FlushReport::default();
        if !self.write_any {
            return report;
        }
        for run in self.dirty_runs() {
            let offset = cylinder_offset + run.start as u64;
            match storage.write_range(offset, &buffer[run.clone()]) {
                Ok(()) => {
                    report.writes += 1;
                    report.bytes += run.len();
                }
                Err(e) => {
                    error!("Write of {:#X}+{:#X} failed: {}", offset, run.len(), e);
                    report.error = Some(e);
                    break;
                }
            }
        }
        self.clear();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::init_test_logging;
    use crate::storage::MockStorage;

    const SMALL: Geometry = Geometry::new(4, 2, 4096);
    const BASE: usize = 0x1000_0000;

    fn write(transfer_count: u32, end_byte: usize) -> WriteNotification {
        WriteNotification { transfer_count, end_address: BASE + end_byte }
    }

    fn marked(tracker: &DirtyTracker) -> Vec<usize> {
        (0..tracker.blocks.len()).filter(|&b| tracker.is_dirty(b)).collect()
    }

    #[test]
    fn test_record_single_block() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.record_write(write(128, 3 * 512), BASE);
        assert_eq!(marked(&tracker), vec![2]);
        assert!(tracker.write_any());
        assert!(!tracker.write_all());
    }

    #[test]
    fn test_record_unaligned_span() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        // 600 bytes ending at 1300: bytes 700..1300 touch blocks 1 and 2.
        tracker.record_write(write(150, 1300), BASE);
        assert_eq!(marked(&tracker), vec![1, 2]);
    }

    #[test]
    fn test_record_end_on_track_boundary() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        // Ends exactly at the end of head 0's track.
        tracker.record_write(write(128, 4096), BASE);
        assert_eq!(marked(&tracker), vec![7]);
    }

    #[test]
    fn test_record_wrap_stays_in_track() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        // 1024 bytes on head 1 ending 256 bytes past the index: the rest
        // came from the end of head 1's track, not from head 0's.
        tracker.record_write(write(256, 4096 + 256), BASE);
        assert_eq!(marked(&tracker), vec![8, 14, 15]);

        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        // Same on head 0: wraps to the end of head 0, never into head 1.
        tracker.record_write(write(256, 256), BASE);
        assert_eq!(marked(&tracker), vec![0, 6, 7]);
    }

    #[test]
    fn test_record_wrap_production_geometry() {
        let geometry = Geometry::ST506;
        let mut tracker = DirtyTracker::allocate(geometry).unwrap();
        tracker.record_write(write(512, 100), BASE);
        let blocks = marked(&tracker);
        assert!(blocks.iter().all(|&b| b < geometry.track_blocks()));
        assert_eq!(blocks.first(), Some(&0));
        assert_eq!(blocks.last(), Some(&84));
    }

    #[test]
    fn test_record_whole_track() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.record_write(write(4096, 4096 + 100), BASE);
        assert_eq!(marked(&tracker), (8..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_record_max_transfer_count() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.record_write(write(u32::MAX, 512), BASE);
        assert_eq!(marked(&tracker), (0..8).collect::<Vec<_>>());
        assert!(!tracker.write_all());
    }

    #[test]
    fn test_record_outside_buffer() {
        init_test_logging();
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.record_write(write(1, 10), BASE + 0x10_0000);
        assert!(tracker.write_all());
        assert!(tracker.write_any());
    }

    #[test]
    fn test_record_empty() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.record_write(write(0, 512), BASE);
        assert!(!tracker.write_any());
        assert_eq!(tracker.dirty_blocks(), 0);
    }

    #[test]
    fn test_mark_all_overrides() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.mark_all();
        assert!(tracker.write_all() && tracker.write_any());
        assert_eq!(tracker.dirty_runs(), vec![0..8192]);

        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.mark_bytes(0..10);
        tracker.mark_all();
        assert!(tracker.write_all() && tracker.write_any());
    }

    #[test]
    fn test_coalesce_threshold() {
        init_test_logging();
        // Eight blocks per head: four is half.
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        for block in [8, 10, 12, 14] {
            tracker.mark_bytes(block * 512..block * 512 + 1);
        }
        for block in [0, 2, 4] {
            tracker.mark_bytes(block * 512..block * 512 + 1);
        }
        tracker.coalesce();
        assert_eq!(marked(&tracker), vec![0, 2, 4, 8, 9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_coalesce_production_threshold() {
        let geometry = Geometry::ST506;
        // 85 blocks per head: 43 is at least half, 42 is not.
        let mut tracker = DirtyTracker::allocate(geometry).unwrap();
        for block in 0..42 {
            tracker.mark_bytes(block * 1024..block * 1024 + 1);
        }
        tracker.coalesce();
        assert_eq!(tracker.dirty_blocks(), 42);

        tracker.mark_bytes(84 * 512..84 * 512 + 1);
        tracker.coalesce();
        assert_eq!(tracker.dirty_blocks(), 85);
        assert!((0..85).all(|b| tracker.is_dirty(b)));
        assert!((85..170).all(|b| !tracker.is_dirty(b)));
    }

    #[test]
    fn test_runs_merge_adjacent() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        tracker.mark_bytes(512..3 * 512 + 1);   // blocks 1-3
        tracker.mark_bytes(7 * 512..9 * 512);   // blocks 7-8
        tracker.mark_bytes(15 * 512..15 * 512 + 1);
        assert_eq!(tracker.dirty_runs(), vec![512..2048, 3584..4608, 7680..8192]);
    }

    #[test]
    fn test_runs_clip_partial_block() {
        let geometry = Geometry::new(2, 1, 1000);
        let mut tracker = DirtyTracker::allocate(geometry).unwrap();
        tracker.mark_bytes(900..1000);
        assert_eq!(tracker.dirty_runs(), vec![512..1000]);
    }

    #[test]
    fn test_flush_clean_is_noop() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        let mut storage = MockStorage::new(SMALL.image_bytes() as usize);
        let buffer = vec![0xEE; SMALL.cylinder_bytes()];
        let report = tracker.flush(&buffer, &mut storage, 0);
        assert_eq!(report.writes, 0);
        assert!(storage.writes.is_empty());
        assert_eq!(tracker.dirty_blocks(), 0);
    }

    #[test]
    fn test_flush_writes_runs() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        let mut storage = MockStorage::new(SMALL.image_bytes() as usize);
        let buffer: Vec<u8> = (0..SMALL.cylinder_bytes()).map(|i| (i / 512) as u8 + 1).collect();
        tracker.mark_bytes(1024..2048);
        tracker.mark_bytes(5000..5001);

        let offset = SMALL.cylinder_offset(2);
        let report = tracker.flush(&buffer, &mut storage, offset);
        assert_eq!(report.writes, 2);
        assert_eq!(report.bytes, 1536);
        assert!(report.error.is_none());
        assert_eq!(storage.writes, vec![(offset + 1024, 1024), (offset + 4608, 512)]);
        assert_eq!(&storage.data[offset as usize + 1024..offset as usize + 2048],
                   &buffer[1024..2048]);
        assert!(!tracker.write_any());
        assert_eq!(tracker.dirty_blocks(), 0);
    }

    #[test]
    fn test_flush_write_all() {
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        let mut storage = MockStorage::new(SMALL.image_bytes() as usize);
        let buffer = vec![0x11; SMALL.cylinder_bytes()];
        tracker.mark_all();
        let report = tracker.flush(&buffer, &mut storage, SMALL.cylinder_offset(1));
        assert_eq!(storage.writes, vec![(8192, 8192)]);
        assert_eq!(report.bytes, 8192);
        assert!(!tracker.write_all() && !tracker.write_any());
    }

    #[test]
    fn test_flush_stops_at_first_error() {
        init_test_logging();
        let mut tracker = DirtyTracker::allocate(SMALL).unwrap();
        let mut storage = MockStorage::new(SMALL.image_bytes() as usize);
        storage.write_budget = Some(1);
        let buffer = vec![0x22; SMALL.cylinder_bytes()];
        tracker.mark_bytes(0..512);
        tracker.mark_bytes(2048..2560);
        tracker.mark_bytes(6000..6001);

        let report = tracker.flush(&buffer, &mut storage, 0);
        assert_eq!(report.writes, 1);
        assert!(matches!(report.error, Some(StorageError::Io(_))));
        assert_eq!(storage.writes, vec![(0, 512)]);
        // Dropped regardless.
        assert!(!tracker.write_any());
        assert_eq!(tracker.dirty_blocks(), 0);
    }
}
