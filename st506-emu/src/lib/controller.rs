use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use st506_utils::rate::describe_transfer;

use crate::context::DriveContext;
use crate::cylinder::CylinderStore;
use crate::dirty::{DirtyTracker, FlushReport};
use crate::error::{StartError, StartResult, StorageError};
use crate::feedback::{Buzzer, FeedbackDispatcher, Hint, DEFAULT_DEPTH};
use crate::geometry::{DATA_RATE, Geometry};
use crate::signals::{SignalGenerator, StatusLine, WriteEvent};
use crate::storage::Storage;

const STATUS_LINES: [StatusLine; 3] = [StatusLine::SeekComplete, StatusLine::Track0, StatusLine::Ready];

/// Tunable timings of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Quiet period after which pending writes are flushed.
    pub idle_timeout: Duration,
    /// Dwell before seek-complete when the host seeks to the loaded cylinder.
    pub settle_time: Duration,
    /// Capacity of the feedback queue.
    pub feedback_depth: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            idle_timeout: Duration::from_millis(5000),
            settle_time: Duration::from_micros(680),
            feedback_depth: DEFAULT_DEPTH,
        }
    }
}

/// How a seek ended. Every outcome leaves seek-complete asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// Target was already loaded; nothing was read.
    Settled,
    /// Target cylinder read into the buffer.
    Loaded,
    /// A newer step arrived mid-read. The buffer is invalid and the newer
    /// target is still in the mailbox.
    Cancelled,
    /// The read failed. The buffer is invalid.
    Failed,
}

/// Buffers that only exist while the controller runs.
struct Active {
    cylinder: CylinderStore,
    dirty: DirtyTracker,
}

/// The drive emulation controller: owns the cylinder buffer and dirty state,
/// and turns host steps and writes into storage reads and writes while the
/// signal generator streams the loaded cylinder.
///
/// All buffer state is mutated by `poll` alone. Event sources only reach the
/// shared `DriveContext`.
pub struct DriveController<S: Storage, G: SignalGenerator> {
    geometry: Geometry,
    config: ControllerConfig,
    storage: S,
    generator: G,
    context: Arc<DriveContext>,
    feedback: FeedbackDispatcher,
    active: Option<Active>,
}

impl<S: Storage, G: SignalGenerator> DriveController<S, G> {
    pub fn new(geometry: Geometry, config: ControllerConfig, storage: S,
               generator: G, buzzer: Box<dyn Buzzer>) -> Self {
        let feedback = FeedbackDispatcher::new(config.feedback_depth, buzzer);
        let context = Arc::new(DriveContext::new(geometry, feedback.sender()));
        DriveController {
            geometry,
            config,
            storage,
            generator,
            context,
            feedback,
            active: None,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The handle event sources report through.
    pub fn context(&self) -> &Arc<DriveContext> {
        &self.context
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// The cylinder held in the buffer, if the buffer can be trusted.
    pub fn current_cylinder(&self) -> Option<u32> {
        self.active.as_ref().and_then(|active| active.cylinder.current())
    }

    /// Bring the drive up: validate the image, allocate the buffers, load
    /// cylinder 0 and start streaming it.
    pub fn start(&mut self) -> StartResult<()> {
        if self.active.is_some() {
            return Err(StartError::AlreadyRunning);
        }
        check_image(&self.storage, self.geometry)?;
        let cylinder = CylinderStore::allocate(self.geometry)?;
        let dirty = DirtyTracker::allocate(self.geometry)?;
        info!("Drive controller starting: {} cylinders, {} heads, {} bytes per track at {} bit/s.",
              self.geometry.cylinders(), self.geometry.heads(), self.geometry.track_bytes(),
              DATA_RATE);

        self.context.steps().reset();
        self.active = Some(Active { cylinder, dirty });
        self.feedback.start();
        for line in STATUS_LINES {
            self.generator.set_line(line, true);
        }
        self.process_seek(0);

        if let Some(active) = self.active.as_ref() {
            self.context.heads().attach(active.cylinder.base_address());
            self.generator.start(Arc::clone(&self.context), active.cylinder.track_address(0));
        }
        self.context.activity().touch();
        Ok(())
    }

    /// Shut the drive down, writing back anything the host left pending.
    /// Panics if not running.
    pub fn stop(&mut self) {
        let mut active = self.active.take()
            .expect("DriveController was already stopped.");
        // No more captures after this, so the last report is final.
        self.generator.stop();
        if let Some(event) = self.generator.take_write() {
            record_write(&mut active, event);
        }
        if let Some(cylinder) = active.cylinder.current() {
            if active.dirty.write_any() {
                flush(&mut active, &mut self.storage, self.geometry.cylinder_offset(cylinder));
            }
        }
        self.context.heads().detach();
        for line in STATUS_LINES {
            self.generator.set_line(line, false);
        }
        self.feedback.stop();
        if let Err(e) = self.storage.sync() {
            error!("Failed to sync storage: {}", e);
        }
        self.context.steps().reset();
        info!("Drive controller stopping.");
    }

    /// One pass of the polling loop: pending seek, then write report, then
    /// idle check. Does nothing while stopped.
    pub fn poll(&mut self) {
        if self.active.is_none() {
            return;
        }
        if let Some(target) = self.context.steps().peek() {
            self.process_seek(target);
        }
        self.process_write();
        self.check_idle();
    }

    /// Poll until `halt` is set.
    pub fn run(&mut self, halt: &AtomicBool) {
        while !halt.load(Ordering::Acquire) {
            self.poll();
            thread::yield_now();
        }
    }

    /// Move to `requested`, writing back the current cylinder first if the
    /// host changed it.
    pub fn process_seek(&mut self, requested: u32) -> SeekOutcome {
        let target = self.geometry.clamp_cylinder(requested);
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return SeekOutcome::Failed,
        };

        self.generator.set_line(StatusLine::SeekComplete, false);
        if target != 0 {
            self.generator.set_line(StatusLine::Track0, false);
        }
        self.context.steps().clear(requested);

        let current = active.cylinder.current();
        match current {
            // Nothing in an untrusted buffer is worth writing.
            None => active.dirty.clear(),
            Some(from) => {
                self.context.feedback().hint(Hint::Seek(from.abs_diff(target)));
            }
        }
        if let Some(from) = current {
            if active.dirty.write_any() {
                flush(active, &mut self.storage, self.geometry.cylinder_offset(from));
            }
        }

        if current == Some(target) {
            debug!("Seek to loaded cylinder {}, settling.", target);
            thread::sleep(self.config.settle_time);
            self.generator.set_line(StatusLine::SeekComplete, true);
            self.context.activity().touch();
            return SeekOutcome::Settled;
        }

        active.cylinder.invalidate();
        let steps = self.context.steps();
        let geometry = self.geometry;
        let cancel = || steps.peek().map_or(false, |next| geometry.clamp_cylinder(next) != target);
        let offset = geometry.cylinder_offset(target);
        let started = Instant::now();
        let result = self.storage.read_range(offset, active.cylinder.data_mut(), &cancel);
        let outcome = match result {
            Ok(()) => {
                debug!("Loaded cylinder {}: {}.", target,
                       describe_transfer(geometry.cylinder_bytes(), started.elapsed()));
                active.cylinder.set_current(target);
                if target == 0 {
                    self.generator.set_line(StatusLine::Track0, true);
                }
                self.context.activity().touch();
                SeekOutcome::Loaded
            }
            Err(StorageError::Cancelled) => {
                debug!("Load of cylinder {} cancelled by a newer step.", target);
                SeekOutcome::Cancelled
            }
            Err(e) => {
                error!("Failed to load cylinder {}: {}", target, e);
                SeekOutcome::Failed
            }
        };
        self.generator.set_line(StatusLine::SeekComplete, true);
        outcome
    }

    fn process_write(&mut self) {
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return,
        };
        match self.generator.take_write() {
            None => return,
            Some(event) => record_write(active, event),
        }
        self.context.activity().touch();
        self.context.feedback().hint(Hint::Click);
    }

    fn check_idle(&mut self) {
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return,
        };
        if !active.dirty.write_any()
                || !self.context.activity().idle_longer_than(self.config.idle_timeout) {
            return;
        }
        match active.cylinder.current() {
            Some(cylinder) => {
                debug!("Host idle with pending writes, flushing cylinder {}.", cylinder);
                self.process_seek(cylinder);
            }
            None => {
                warn!("Discarding writes to an invalid cylinder.");
                active.dirty.clear();
            }
        }
    }
}

impl<S: Storage, G: SignalGenerator> Drop for DriveController<S, G> {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// Refuse an image that is not exactly the size `geometry` calls for.
pub fn check_image<S: Storage + ?Sized>(storage: &S, geometry: Geometry) -> StartResult<()> {
    let expected = geometry.image_bytes();
    let found = storage.image_len()?;
    if found != expected {
        return Err(StartError::SizeMismatch { found, expected });
    }
    Ok(())
}

fn record_write(active: &mut Active, event: WriteEvent) {
    match event {
        WriteEvent::Transfer(notification) => {
            trace!("Write of {} words ending at {:#X}.",
                   notification.transfer_count, notification.end_address);
            active.dirty.record_write(notification, active.cylinder.base_address());
        }
        WriteEvent::Overflow => {
            error!("Write notifications overflowed, assuming the whole cylinder changed.");
            active.dirty.mark_all();
        }
    }
}

/// Coalesce and write back the dirty blocks of `active`.
fn flush(active: &mut Active, storage: &mut dyn Storage, cylinder_offset: u64) -> FlushReport {
    active.dirty.coalesce();
    let started = Instant::now();
    let report = active.dirty.flush(active.cylinder.data(), storage, cylinder_offset);
    debug!("Flushed {} writes at {:#X}: {}.", report.writes, cylinder_offset,
           describe_transfer(report.bytes, started.elapsed()));
    report
}
