//! Emulation controller for an ST-506 hard disk drive backed by a flat image.
//!
//! A `DriveController` keeps the cylinder under the emulated heads in memory,
//! follows the host's steps and head selects, and writes modified blocks back
//! to a `Storage` while a `SignalGenerator` streams the bits to the host.

mod activity;
mod context;
mod controller;
mod cylinder;
mod dirty;
mod error;
mod feedback;
mod geometry;
mod head;
mod mailbox;
mod signals;
mod storage;

pub use crate::activity::ActivityClock;
pub use crate::context::DriveContext;
pub use crate::controller::{check_image, ControllerConfig, DriveController, SeekOutcome};
pub use crate::cylinder::CylinderStore;
pub use crate::dirty::{DirtyTracker, FlushReport};
pub use crate::error::{StartError, StartResult, StorageError, StorageResult};
pub use crate::feedback::{Buzzer, FeedbackDispatcher, FeedbackSender, Hint, SilentBuzzer};
pub use crate::geometry::{BLOCK_SIZE, Geometry, SECTORS_PER_TRACK, TRACK_BYTES};
pub use crate::head::HeadTracker;
pub use crate::mailbox::StepMailbox;
pub use crate::signals::{ReadRetarget, SignalGenerator, StatusLine, WriteEvent, WriteNotification};
pub use crate::storage::{CHUNK_SIZE, FileStorage, Storage};

#[cfg(test)]
fn init_test_logging() {
    // Several tests may initialise logging; only the first succeeds.
    let _ = simplelog::TestLogger::init(log::LevelFilter::Trace, simplelog::Config::default());
}
