//! Timer phase and the state of one countdown session

use serde::{Deserialize, Serialize};

use super::TimeValue;
use crate::scheduler::TimerHandle;

/// Whether a countdown is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    /// Input is editable, no countdown
    #[default]
    Idle,
    /// A countdown session is ticking
    Running,
}

impl TimerPhase {
    pub fn is_running(self) -> bool {
        self == TimerPhase::Running
    }
}

/// One run of the countdown from start to stop or finish
pub(crate) struct TimerSession {
    pub id: u64,
    pub handle: Box<dyn TimerHandle>,
}

/// Everything the view model guards behind its session lock
#[derive(Default)]
pub(crate) struct SessionSlot {
    /// Value on the display: the input while idle, the time left while running
    pub time: TimeValue,
    /// Input captured at start, restored on stop and finish
    pub last_known: TimeValue,
    pub active: Option<TimerSession>,
    pub next_id: u64,
    pub disposed: bool,
    /// Bumped on every change the observables must mirror
    pub version: u64,
    /// Last version pushed to the observables
    pub published: u64,
    /// Some thread is currently pushing changes to the observables
    pub publishing: bool,
}

impl SessionSlot {
    pub fn phase(&self) -> TimerPhase {
        if self.active.is_some() {
            TimerPhase::Running
        } else {
            TimerPhase::Idle
        }
    }

    /// True if `id` names the session currently running
    pub fn is_current(&self, id: u64) -> bool {
        self.active.as_ref().map_or(false, |session| session.id == id)
    }

    /// Record that the observables are out of date
    pub fn touch(&mut self) {
        self.version += 1;
    }

    /// Reserve an id for a new session
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
