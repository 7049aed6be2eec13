use log::trace;

use crate::activity::ActivityClock;
use crate::feedback::{FeedbackSender, Hint};
use crate::geometry::Geometry;
use crate::head::HeadTracker;
use crate::mailbox::StepMailbox;
use crate::signals::ReadRetarget;

/// State shared between the controller and the signal generator's event
/// sources. The controller creates one per drive and hands an `Arc` of it to
/// the generator when it starts; the generator reports every step and
/// head-select event through it.
///
/// Nothing in here touches the cylinder buffer or dirty bitmap, which belong
/// to the polling loop alone.
pub struct DriveContext {
    steps: StepMailbox,
    heads: HeadTracker,
    activity: ActivityClock,
    feedback: FeedbackSender,
}

impl DriveContext {
    pub(crate) fn new(geometry: Geometry, feedback: FeedbackSender) -> Self {
        DriveContext {
            steps: StepMailbox::new(),
            heads: HeadTracker::new(geometry),
            activity: ActivityClock::new(),
            feedback,
        }
    }

    /// Step event: the host has stepped the heads to `cylinder`.
    pub fn step(&self, cylinder: u32) {
        trace!("Step to cylinder {}.", cylinder);
        self.steps.post(cylinder);
    }

    /// Head-select event: the host now selects `head`. `retarget` is the
    /// generator's own retarget primitive.
    pub fn head_select(&self, head: u32, retarget: &dyn ReadRetarget) {
        if self.heads.select(head, retarget) {
            self.activity.touch();
            self.feedback.hint(Hint::Click);
        }
    }

    pub fn steps(&self) -> &StepMailbox {
        &self.steps
    }

    pub fn heads(&self) -> &HeadTracker {
        &self.heads
    }

    pub fn activity(&self) -> &ActivityClock {
        &self.activity
    }

    pub fn feedback(&self) -> &FeedbackSender {
        &self.feedback
    }
}
