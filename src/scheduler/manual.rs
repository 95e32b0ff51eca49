//! Manually advanced countdown timer for deterministic tests

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use super::{FinishCallback, RepeatingTimer, TickCallback, TimerHandle};

struct Countdown {
    id: u64,
    started: Duration,
    total: Duration,
    period: Duration,
    ticks_fired: u32,
    on_tick: Option<TickCallback>,
    on_finish: Option<FinishCallback>,
}

enum Due {
    Tick,
    Finish,
}

impl Countdown {
    fn next_event(&self) -> (Duration, Due) {
        let next_tick = self.period * (self.ticks_fired + 1);
        if !self.period.is_zero() && next_tick < self.total {
            (self.started + next_tick, Due::Tick)
        } else {
            (self.started + self.total, Due::Finish)
        }
    }
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_id: u64,
    countdowns: Vec<Countdown>,
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fake clock that only moves when [`ManualTimer::advance`] is called.
///
/// Clones share the same clock.
#[derive(Clone, Default)]
pub struct ManualTimer {
    clock: Arc<Mutex<Clock>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the fake clock
    pub fn now(&self) -> Duration {
        lock(&self.clock).now
    }

    /// Countdowns that have neither finished nor been cancelled
    pub fn active_countdowns(&self) -> usize {
        lock(&self.clock).countdowns.len()
    }

    /// Move the clock forward, firing every callback that falls due in
    /// chronological order. Callbacks run without the clock locked, so they
    /// may start or cancel countdowns.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.clock).now + by;

        loop {
            let mut clock = lock(&self.clock);
            let due = clock
                .countdowns
                .iter()
                .enumerate()
                .map(|(index, countdown)| (countdown.next_event(), index))
                .filter(|((at, _), _)| *at <= target)
                .min_by_key(|((at, _), index)| (*at, *index));

            let Some(((at, kind), index)) = due else {
                clock.now = target;
                return;
            };
            clock.now = at;

            match kind {
                Due::Tick => {
                    let countdown = &mut clock.countdowns[index];
                    countdown.ticks_fired += 1;
                    let remaining = countdown.total - countdown.period * countdown.ticks_fired;
                    let id = countdown.id;
                    let Some(mut on_tick) = countdown.on_tick.take() else {
                        continue;
                    };
                    drop(clock);

                    on_tick(remaining.as_millis() as u64);

                    let mut clock = lock(&self.clock);
                    if let Some(countdown) = clock.countdowns.iter_mut().find(|c| c.id == id) {
                        countdown.on_tick = Some(on_tick);
                    }
                }
                Due::Finish => {
                    let countdown = clock.countdowns.remove(index);
                    drop(clock);
                    if let Some(on_finish) = countdown.on_finish {
                        on_finish();
                    }
                }
            }
        }
    }
}

impl RepeatingTimer for ManualTimer {
    fn start(
        &self,
        total: Duration,
        period: Duration,
        on_tick: TickCallback,
        on_finish: FinishCallback,
    ) -> Box<dyn TimerHandle> {
        let mut clock = lock(&self.clock);
        let id = clock.next_id;
        clock.next_id += 1;
        let started = clock.now;
        clock.countdowns.push(Countdown {
            id,
            started,
            total,
            period,
            ticks_fired: 0,
            on_tick: Some(on_tick),
            on_finish: Some(on_finish),
        });

        Box::new(ManualHandle {
            clock: Arc::downgrade(&self.clock),
            id,
        })
    }
}

struct ManualHandle {
    clock: Weak<Mutex<Clock>>,
    id: u64,
}

impl TimerHandle for ManualHandle {
    fn cancel(&mut self) {
        if let Some(clock) = self.clock.upgrade() {
            let removed: Vec<Countdown> = {
                let mut clock = lock(&clock);
                let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut clock.countdowns)
                    .into_iter()
                    .partition(|c| c.id == self.id);
                clock.countdowns = kept;
                gone
            };
            // Callbacks are dropped outside the lock.
            drop(removed);
        }
    }
}

impl Drop for ManualHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
