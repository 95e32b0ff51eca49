//! Repeating countdown timers
//!
//! The view model drives its countdown through the [`RepeatingTimer`]
//! trait so the runtime-backed timer can be swapped for a manually advanced
//! clock in tests.

pub mod manual;
pub mod tokio_timer;

use std::time::Duration;

pub use manual::ManualTimer;
pub use tokio_timer::TokioTimer;

/// Called with the milliseconds left until the countdown finishes
pub type TickCallback = Box<dyn FnMut(u64) + Send>;

/// Called once when the countdown reaches zero
pub type FinishCallback = Box<dyn FnOnce() + Send>;

/// Period between two ticks of the countdown
pub const TICK_PERIOD: Duration = Duration::from_millis(1000);

/// A facility that runs one countdown per call to [`RepeatingTimer::start`].
///
/// Implementations must:
/// - never invoke a callback from inside `start`,
/// - call `on_tick` once per whole `period` elapsed strictly before `total`,
///   passing the nominal time left in milliseconds,
/// - call `on_finish` exactly once when `total` has elapsed,
/// - deliver callbacks serially and stop delivering once the handle is
///   cancelled or dropped.
pub trait RepeatingTimer: Send + Sync {
    fn start(
        &self,
        total: Duration,
        period: Duration,
        on_tick: TickCallback,
        on_finish: FinishCallback,
    ) -> Box<dyn TimerHandle>;
}

/// Ownership of one running countdown
pub trait TimerHandle: Send {
    /// Stop the countdown; no callback fires afterwards
    fn cancel(&mut self);
}
