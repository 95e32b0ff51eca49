//! Countdown timer backed by the tokio runtime

use std::time::Duration;

use tokio::{
    runtime::Handle,
    sync::oneshot,
    time::{sleep_until, Instant},
};
use tracing::debug;

use super::{FinishCallback, RepeatingTimer, TickCallback, TimerHandle};

/// Runs every countdown as a task on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioTimer {
    runtime: Handle,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime the caller is running on
    pub fn try_current() -> Result<Self, String> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| format!("No tokio runtime available for the countdown timer: {}", e))
    }
}

impl RepeatingTimer for TokioTimer {
    fn start(
        &self,
        total: Duration,
        period: Duration,
        on_tick: TickCallback,
        on_finish: FinishCallback,
    ) -> Box<dyn TimerHandle> {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let started = Instant::now();
        self.runtime
            .spawn(countdown_task(started, total, period, cancel_rx, on_tick, on_finish));

        Box::new(TokioTimerHandle {
            cancel_tx: Some(cancel_tx),
        })
    }
}

async fn countdown_task(
    started: Instant,
    total: Duration,
    period: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
    mut on_tick: TickCallback,
    on_finish: FinishCallback,
) {
    let deadline = started + total;
    let mut elapsed = period;

    // A zero period would never advance; treat it as "finish only".
    while !period.is_zero() && elapsed < total {
        tokio::select! {
            _ = &mut cancel_rx => {
                debug!("Countdown cancelled");
                return;
            }
            _ = sleep_until(started + elapsed) => {
                let remaining = total - elapsed;
                on_tick(remaining.as_millis() as u64);
                elapsed += period;
            }
        }
    }

    tokio::select! {
        _ = &mut cancel_rx => {
            debug!("Countdown cancelled");
        }
        _ = sleep_until(deadline) => {
            debug!("Countdown of {:?} finished", total);
            on_finish();
        }
    }
}

/// Cancels its countdown task when cancelled or dropped
struct TokioTimerHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl TimerHandle for TokioTimerHandle {
    fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            // The task may already have finished; nothing left to cancel then.
            let _ = tx.send(());
        }
    }
}

impl Drop for TokioTimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    enum Seen {
        Tick(u64),
        Finish,
    }

    fn callbacks(log: &Arc<Mutex<Vec<Seen>>>) -> (TickCallback, FinishCallback) {
        let ticks = Arc::clone(log);
        let finish = Arc::clone(log);
        (
            Box::new(move |ms| ticks.lock().unwrap().push(Seen::Tick(ms))),
            Box::new(move || finish.lock().unwrap().push(Seen::Finish)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_then_finishes() {
        let timer = TokioTimer::try_current().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (on_tick, on_finish) = callbacks(&log);

        let _handle = timer.start(
            Duration::from_secs(3),
            Duration::from_secs(1),
            on_tick,
            on_finish,
        );
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![Seen::Tick(2000), Seen::Tick(1000), Seen::Finish]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_callbacks() {
        let timer = TokioTimer::try_current().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (on_tick, on_finish) = callbacks(&log);

        let mut handle = timer.start(
            Duration::from_secs(5),
            Duration::from_secs(1),
            on_tick,
            on_finish,
        );
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*log.lock().unwrap(), vec![Seen::Tick(4000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels() {
        let timer = TokioTimer::try_current().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (on_tick, on_finish) = callbacks(&log);

        drop(timer.start(
            Duration::from_secs(2),
            Duration::from_secs(1),
            on_tick,
            on_finish,
        ));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_total_finishes_without_ticks() {
        let timer = TokioTimer::try_current().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (on_tick, on_finish) = callbacks(&log);

        let _handle = timer.start(Duration::ZERO, Duration::from_secs(1), on_tick, on_finish);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*log.lock().unwrap(), vec![Seen::Finish]);
    }

    #[test]
    fn test_try_current_outside_runtime() {
        assert!(TokioTimer::try_current().is_err());
    }
}
