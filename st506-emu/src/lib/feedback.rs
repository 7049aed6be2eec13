//! Audible seek feedback, produced on a worker thread of its own.
//!
//! The controller only ever enqueues hints; if the worker is busy and the
//! queue is full the hint is dropped. Nothing here affects what the host
//! sees on the interface.

use log::{info, trace};
use rand::Rng;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

/// Default queue depth, the size of the RP2040 inter-core FIFO.
pub const DEFAULT_DEPTH: usize = 8;

/// What the controller tells the feedback worker about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// A seek across the given number of cylinders.
    Seek(u32),
    /// A write or head change.
    Click,
}

/// Messages on the feedback queue. Only this module can ask the worker to
/// exit; everyone else goes through `FeedbackSender::hint`.
enum FeedbackMessage {
    Hint(Hint),
    JoinThread,
}

/// Non-blocking handle for enqueueing hints.
#[derive(Clone)]
pub struct FeedbackSender {
    tx: SyncSender<FeedbackMessage>,
}

impl FeedbackSender {
    /// Offer a hint to the worker. Returns false if it was dropped.
    pub fn hint(&self, hint: Hint) -> bool {
        match self.tx.try_send(FeedbackMessage::Hint(hint)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Feedback queue full, dropped {:?}.", hint);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Sound output used by the worker.
pub trait Buzzer: Send {
    /// Sound a tone of `freq_hz` for `duration`, blocking until done.
    fn pulse(&mut self, freq_hz: u32, duration: Duration);
}

/// A buzzer for hosts with no sound hardware.
pub struct SilentBuzzer;

impl Buzzer for SilentBuzzer {
    fn pulse(&mut self, freq_hz: u32, duration: Duration) {
        trace!("Click: {} Hz for {} us.", freq_hz, duration.as_micros());
    }
}

/// One click of a feedback pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Click {
    pub freq_hz: u32,
    pub duration: Duration,
    /// Silence after the tone.
    pub gap: Duration,
}

/// Generate the clicks for a hint. Longer seeks rattle for longer.
pub fn click_pattern<R: Rng>(hint: Hint, rng: &mut R) -> Vec<Click> {
    let count = match hint {
        Hint::Click => 1,
        Hint::Seek(distance) => rng.gen_range(2..4 + distance / 50),
    };
    (0..count)
        .map(|_| Click {
            freq_hz: rng.gen_range(1500..1800),
            duration: Duration::from_micros(rng.gen_range(500..3000)),
            gap: Duration::from_millis(rng.gen_range(5..25)),
        })
        .collect()
}

type WorkerState = (Receiver<FeedbackMessage>, Box<dyn Buzzer>);

/// Owns the feedback queue and the worker thread draining it.
pub struct FeedbackDispatcher {
    tx: SyncSender<FeedbackMessage>,
    idle: Option<WorkerState>,
    thread_handle: Option<thread::JoinHandle<WorkerState>>,
}

impl FeedbackDispatcher {
    /// Create a dispatcher whose queue holds at most `depth` hints.
    pub fn new(depth: usize, buzzer: Box<dyn Buzzer>) -> Self {
        let (tx, rx) = mpsc::sync_channel(depth);
        FeedbackDispatcher {
            tx,
            idle: Some((rx, buzzer)),
            thread_handle: None,
        }
    }

    pub fn sender(&self) -> FeedbackSender {
        FeedbackSender { tx: self.tx.clone() }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Start the worker thread. Panics if already running.
    pub fn start(&mut self) {
        let (rx, mut buzzer) = self.idle.take()
            .expect("FeedbackDispatcher was already running.");
        info!("Feedback worker starting.");

        let thread_handle = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            loop {
                match rx.recv() {
                    Ok(FeedbackMessage::Hint(hint)) => {
                        for click in click_pattern(hint, &mut rng) {
                            buzzer.pulse(click.freq_hz, click.duration);
                            thread::sleep(click.gap);
                        }
                    }
                    // Every sender lives in the dispatcher or its handles, so
                    // disconnection can only mean shutdown.
                    Ok(FeedbackMessage::JoinThread) | Err(_) => return (rx, buzzer),
                }
            }
        });
        self.thread_handle = Some(thread_handle);
    }

    /// Stop the worker thread, letting it finish queued hints first. Panics
    /// if not running.
    pub fn stop(&mut self) {
        let thread_handle = self.thread_handle.take()
            .expect("FeedbackDispatcher was already stopped.");
        self.tx.send(FeedbackMessage::JoinThread)
            .expect("Failed to send JoinThread to feedback worker.");
        let state = thread_handle.join()
            .expect("Feedback worker terminated with error.");
        self.idle = Some(state);
        info!("Feedback worker stopping.");
    }
}
