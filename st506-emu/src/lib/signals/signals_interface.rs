use std::sync::Arc;

use crate::context::DriveContext;

/// Host-visible status outputs of the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLine {
    SeekComplete,
    Track0,
    Ready,
}

/// A completed capture of host write data into the cylinder buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteNotification {
    /// Number of 32-bit words captured.
    pub transfer_count: u32,
    /// Address one past the last captured byte. The capture pointer wraps
    /// within the track being written, so the start of the transfer is
    /// `transfer_count` words before this, modulo the track length.
    pub end_address: usize,
}

/// What the write capture path reports at most once per poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEvent {
    Transfer(WriteNotification),
    /// Notifications were dropped; which bytes changed is unknown.
    Overflow,
}

/// Glitch-free redirection of the streaming read source.
pub trait ReadRetarget {
    /// Point the read stream at `address`. Callable from any context; the
    /// generator must never read from a mix of the old and new addresses.
    fn retarget_read_source(&self, address: usize);
}

/// The autonomous subsystem producing the bit-level waveforms for the host.
///
/// Once started it streams read data from the current read source on its
/// own, captures host writes straight into the cylinder buffer, and reports
/// step and head-select events through the `DriveContext` it was given.
pub trait SignalGenerator: ReadRetarget + Send {
    /// Begin streaming from `read_source` and register `context` as the
    /// receiver of step and head events.
    fn start(&mut self, context: Arc<DriveContext>, read_source: usize);

    /// Stop streaming and drop the registered context.
    fn stop(&mut self);

    fn set_line(&self, line: StatusLine, asserted: bool);

    /// The latest write capture report since the last call, if any. A
    /// report captured before `stop` is still returned after it.
    fn take_write(&mut self) -> Option<WriteEvent>;
}
