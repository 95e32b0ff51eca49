//! Countdown view model: input validation and the timer state machine

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::{
    observable::Observable,
    time_value::{parse_field, Field, TimeValue},
    timer_state::{SessionSlot, TimerPhase, TimerSession},
};
use crate::scheduler::{RepeatingTimer, TICK_PERIOD};

fn lock(slot: &Mutex<SessionSlot>) -> MutexGuard<'_, SessionSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The observable fields shown by the presentation layer
#[derive(Debug, Clone)]
struct Display {
    hours: Observable<u64>,
    minutes: Observable<u64>,
    seconds: Observable<u64>,
    running: Observable<bool>,
}

impl Display {
    fn new() -> Self {
        Self {
            hours: Observable::new(0),
            minutes: Observable::new(0),
            seconds: Observable::new(0),
            running: Observable::new(false),
        }
    }

    fn show(&self, running: bool, value: TimeValue) {
        self.running.set(running);
        self.hours.set(value.hours);
        self.minutes.set(value.minutes);
        self.seconds.set(value.seconds);
    }
}

/// Clears the publishing flag if a listener panics mid-round
struct PublishGuard<'a> {
    slot: &'a Mutex<SessionSlot>,
    armed: bool,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.slot).publishing = false;
        }
    }
}

/// Mirror the slot into the observables, without holding the slot lock
/// while listeners run.
///
/// One thread publishes at a time and always pushes the newest state, so
/// the observables never go back to an older value. A change made while
/// another thread (or a listener) is publishing is picked up by that
/// round before it ends.
fn publish(slot: &Mutex<SessionSlot>, display: &Display) {
    {
        let mut slot = lock(slot);
        if slot.publishing || slot.published == slot.version {
            return;
        }
        slot.publishing = true;
    }
    let mut guard = PublishGuard { slot, armed: true };

    loop {
        let (running, time) = {
            let mut slot = lock(slot);
            if slot.published == slot.version {
                slot.publishing = false;
                guard.armed = false;
                return;
            }
            slot.published = slot.version;
            (slot.phase().is_running(), slot.time)
        };
        display.show(running, time);
    }
}

/// Holds the timer input, the remaining time while counting down, and the
/// single countdown session.
///
/// The session lock guards the state; the observables mirror it and are
/// notified after the lock is released, on the thread that made the
/// change. Listeners may call any method of the view model. Changes they
/// make are delivered once the current round of notifications ends.
pub struct CountdownViewModel {
    display: Display,
    slot: Arc<Mutex<SessionSlot>>,
    timer: Arc<dyn RepeatingTimer>,
}

impl CountdownViewModel {
    pub fn new(timer: Arc<dyn RepeatingTimer>) -> Self {
        Self {
            display: Display::new(),
            slot: Arc::new(Mutex::new(SessionSlot::default())),
            timer,
        }
    }

    pub fn hours(&self) -> &Observable<u64> {
        &self.display.hours
    }

    pub fn minutes(&self) -> &Observable<u64> {
        &self.display.minutes
    }

    pub fn seconds(&self) -> &Observable<u64> {
        &self.display.seconds
    }

    pub fn is_running(&self) -> &Observable<bool> {
        &self.display.running
    }

    /// Value currently on the display
    pub fn time_value(&self) -> TimeValue {
        lock(&self.slot).time
    }

    pub fn phase(&self) -> TimerPhase {
        lock(&self.slot).phase()
    }

    /// Phase and displayed value read together
    pub fn state(&self) -> (TimerPhase, TimeValue) {
        let slot = lock(&self.slot);
        (slot.phase(), slot.time)
    }

    /// Input captured when the last countdown started
    pub fn last_known(&self) -> TimeValue {
        lock(&self.slot).last_known
    }

    pub fn on_hours_changed(&self, text: &str) {
        self.set_field(Field::Hours, parse_field(text));
    }

    pub fn on_minutes_changed(&self, text: &str) {
        self.set_field(Field::Minutes, parse_field(text));
    }

    pub fn on_seconds_changed(&self, text: &str) {
        self.set_field(Field::Seconds, parse_field(text));
    }

    /// Overwrite one field, saturating the value to the field's range
    pub fn set_field(&self, field: Field, value: u64) {
        {
            let mut slot = lock(&self.slot);
            if slot.disposed {
                return;
            }
            let clamped = field.clamp(value);
            debug!("Setting {} to {} (requested {})", field.name(), clamped, value);
            match field {
                Field::Hours => slot.time.hours = clamped,
                Field::Minutes => slot.time.minutes = clamped,
                Field::Seconds => slot.time.seconds = clamped,
            }
            slot.touch();
        }
        publish(&self.slot, &self.display);
    }

    /// Start when `start` is true, stop otherwise. Returns whether the
    /// requested transition happened.
    pub fn toggle<F>(&self, start: bool, on_finished: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if start {
            self.start(on_finished)
        } else {
            self.stop()
        }
    }

    /// Begin counting down from the current input.
    ///
    /// `on_finished` runs once if the countdown reaches zero and never if it
    /// is stopped. A zero input finishes at once: nothing is scheduled, the
    /// input is left as is and `on_finished` runs before this returns.
    /// Returns whether a countdown is now running.
    pub fn start<F>(&self, on_finished: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if slot.disposed {
            warn!("Ignoring start on a disposed timer");
            return false;
        }
        if slot.active.is_some() {
            warn!("Timer already running, ignoring start");
            return false;
        }

        let snapshot = slot.time;
        slot.last_known = snapshot;
        let total_seconds = snapshot.total_seconds();

        if total_seconds == 0 {
            drop(slot);
            info!("Zero-length countdown requested, finishing immediately");
            on_finished();
            return false;
        }

        let id = slot.allocate_id();
        let total = TICK_PERIOD * total_seconds as u32;

        let on_tick = {
            let slot = Arc::clone(&self.slot);
            let display = self.display.clone();
            Box::new(move |remaining_ms: u64| {
                {
                    let mut slot = lock(&slot);
                    if !slot.is_current(id) {
                        return;
                    }
                    slot.time = TimeValue::from_remaining_millis(remaining_ms);
                    slot.touch();
                    debug!("Tick: {} left", slot.time);
                }
                publish(&slot, &display);
            })
        };

        let on_finish = {
            let slot = Arc::clone(&self.slot);
            let display = self.display.clone();
            Box::new(move || {
                let session = {
                    let mut slot = lock(&slot);
                    if !slot.is_current(id) {
                        return;
                    }
                    slot.time = slot.last_known;
                    slot.touch();
                    slot.active.take()
                };
                drop(session);
                publish(&slot, &display);

                info!("Countdown finished");
                on_finished();
            })
        };

        let handle = self.timer.start(total, TICK_PERIOD, on_tick, on_finish);
        slot.active = Some(TimerSession { id, handle });
        slot.touch();
        drop(slot);
        publish(&self.slot, &self.display);

        info!("Countdown started from {} ({}s)", snapshot, total_seconds);
        true
    }

    /// Cancel the running countdown and restore the input it started from.
    /// Does nothing when no countdown is running. Returns whether a
    /// countdown was stopped.
    pub fn stop(&self) -> bool {
        let (mut session, restored) = {
            let mut slot = lock(&self.slot);
            let Some(session) = slot.active.take() else {
                debug!("Stop requested while idle");
                return false;
            };
            slot.time = slot.last_known;
            slot.touch();
            (session, slot.last_known)
        };
        session.handle.cancel();
        publish(&self.slot, &self.display);
        info!("Countdown stopped, restored {}", restored);
        true
    }

    /// Cancel any outstanding countdown and refuse further operations.
    /// The displayed time is left untouched and no callback runs.
    pub fn dispose(&self) {
        let session = {
            let mut slot = lock(&self.slot);
            if slot.disposed {
                return;
            }
            slot.disposed = true;
            slot.touch();
            slot.active.take()
        };
        if let Some(mut session) = session {
            session.handle.cancel();
            info!("Disposed timer with a countdown in progress");
        }
        publish(&self.slot, &self.display);
    }
}

impl Drop for CountdownViewModel {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CountdownViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (phase, time) = self.state();
        f.debug_struct("CountdownViewModel")
            .field("time", &time)
            .field("phase", &phase)
            .finish()
    }
}
