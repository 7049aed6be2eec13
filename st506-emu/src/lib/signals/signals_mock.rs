use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::signals_interface::*;
use crate::context::DriveContext;

#[derive(Default)]
struct LineLog {
    levels: HashMap<StatusLine, bool>,
    history: Vec<(StatusLine, bool)>,
}

/// A signal generator driven by the test instead of hardware. Records what
/// the controller does to the status lines and read source.
#[derive(Default)]
pub struct MockSignalGenerator {
    context: Option<Arc<DriveContext>>,
    lines: Mutex<LineLog>,
    retargets: Mutex<Vec<usize>>,
    read_source: Mutex<Option<usize>>,
    pending_write: Option<WriteEvent>,
    pub starts: usize,
    pub stops: usize,
}

impl MockSignalGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&self) -> &DriveContext {
        self.context.as_ref().expect("MockSignalGenerator is not running.")
    }

    /// Host steps to `cylinder`.
    pub fn step(&self, cylinder: u32) {
        self.context().step(cylinder);
    }

    /// Host changes the head-select line.
    pub fn head(&self, head: u32) {
        self.context().head_select(head, self);
    }

    /// Report a completed write capture. A second report before the
    /// controller collects the first overflows, as the hardware FIFO would.
    pub fn write(&mut self, notification: WriteNotification) {
        self.pending_write = Some(match self.pending_write {
            None => WriteEvent::Transfer(notification),
            Some(_) => WriteEvent::Overflow,
        });
    }

    pub fn is_running(&self) -> bool {
        self.context.is_some()
    }

    pub fn line(&self, line: StatusLine) -> bool {
        self.lines.lock().unwrap().levels.get(&line).copied().unwrap_or(false)
    }

    /// How many times `line` has been asserted since the history was cleared.
    pub fn assertions(&self, line: StatusLine) -> usize {
        self.lines.lock().unwrap().history.iter()
            .filter(|&&entry| entry == (line, true))
            .count()
    }

    pub fn history(&self) -> Vec<(StatusLine, bool)> {
        self.lines.lock().unwrap().history.clone()
    }

    pub fn clear_history(&self) {
        self.lines.lock().unwrap().history.clear();
    }

    pub fn retargets(&self) -> Vec<usize> {
        self.retargets.lock().unwrap().clone()
    }

    pub fn read_source(&self) -> Option<usize> {
        *self.read_source.lock().unwrap()
    }
}

impl ReadRetarget for MockSignalGenerator {
    fn retarget_read_source(&self, address: usize) {
        self.retargets.lock().unwrap().push(address);
        *self.read_source.lock().unwrap() = Some(address);
    }
}

impl SignalGenerator for MockSignalGenerator {
    fn start(&mut self, context: Arc<DriveContext>, read_source: usize) {
        self.context = Some(context);
        *self.read_source.lock().unwrap() = Some(read_source);
        self.pending_write = None;
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.context = None;
        *self.read_source.lock().unwrap() = None;
        self.stops += 1;
    }

    fn set_line(&self, line: StatusLine, asserted: bool) {
        let mut log = self.lines.lock().unwrap();
        log.levels.insert(line, asserted);
        log.history.push((line, asserted));
    }

    fn take_write(&mut self) -> Option<WriteEvent> {
        self.pending_write.take()
    }
}
