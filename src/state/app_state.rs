//! Application state shared with the HTTP presentation layer

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{CountdownViewModel, Field, TimeValue, TimerPhase};
use crate::scheduler::RepeatingTimer;

/// Message shown when a countdown reaches zero
pub const COMPLETION_MESSAGE: &str = "Timer completed!!";

/// Point-in-time view of the timer for API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    /// `HH:MM:SS`
    pub display: String,
    /// Last nine seconds of a running countdown
    pub final_countdown: bool,
}

impl TimerSnapshot {
    pub fn new(phase: TimerPhase, time: TimeValue) -> Self {
        Self {
            phase,
            hours: time.hours,
            minutes: time.minutes,
            seconds: time.seconds,
            display: time.to_string(),
            final_countdown: phase.is_running() && time.is_final_countdown(),
        }
    }

    pub fn get(&self, field: Field) -> u64 {
        match field {
            Field::Hours => self.hours,
            Field::Minutes => self.minutes,
            Field::Seconds => self.seconds,
        }
    }
}

/// One-shot notification sent when a countdown finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub message: String,
    /// The input the finished countdown started from
    pub duration: TimeValue,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CompletionLog {
    count: u64,
    last: Option<DateTime<Utc>>,
}

/// Main application state: the timer view model plus server metadata
#[derive(Debug)]
pub struct AppState {
    /// The single countdown timer
    pub view_model: CountdownViewModel,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Completion notifications for event stream subscribers
    pub completion_tx: broadcast::Sender<CompletionEvent>,
    completions: Arc<Mutex<CompletionLog>>,
}

impl AppState {
    /// Create a new AppState driving its countdown with `timer`
    pub fn new(port: u16, host: String, timer: Arc<dyn RepeatingTimer>) -> Self {
        let (completion_tx, _) = broadcast::channel(16);

        Self {
            view_model: CountdownViewModel::new(timer),
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            completion_tx,
            completions: Arc::new(Mutex::new(CompletionLog::default())),
        }
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Current timer state
    pub fn snapshot(&self) -> TimerSnapshot {
        let (phase, time) = self.view_model.state();
        TimerSnapshot::new(phase, time)
    }

    /// Apply a raw text change to one input field
    pub fn change_input(&self, field: Field, text: &str) -> TimerSnapshot {
        match field {
            Field::Hours => self.view_model.on_hours_changed(text),
            Field::Minutes => self.view_model.on_minutes_changed(text),
            Field::Seconds => self.view_model.on_seconds_changed(text),
        }
        self.record_action(field.name());
        self.snapshot()
    }

    /// Flip between running and idle.
    ///
    /// Starting needs a non-zero input; the start control is not offered
    /// otherwise, so a zero input is reported back instead of started. An
    /// action is only recorded when the view model carried it out.
    pub fn toggle(&self) -> Result<TimerSnapshot, String> {
        let (phase, time) = self.view_model.state();

        if phase.is_running() {
            if !self.view_model.toggle(false, || {}) {
                return Err("Timer already stopped".to_string());
            }
            self.record_action("stop");
            return Ok(self.snapshot());
        }

        if time.is_zero() {
            return Err("Enter a duration before starting the timer".to_string());
        }

        if !self.view_model.toggle(true, self.completion_notifier(time)) {
            return Err("Timer could not be started".to_string());
        }
        self.record_action("start");
        Ok(self.snapshot())
    }

    /// Callback handed to the view model for the countdown being started
    fn completion_notifier(&self, duration: TimeValue) -> impl FnOnce() + Send + 'static {
        let completions = Arc::clone(&self.completions);
        let completion_tx = self.completion_tx.clone();

        move || {
            let completed_at = Utc::now();
            if let Ok(mut log) = completions.lock() {
                log.count += 1;
                log.last = Some(completed_at);
            }
            info!("{}", COMPLETION_MESSAGE);

            let event = CompletionEvent {
                message: COMPLETION_MESSAGE.to_string(),
                duration,
                completed_at,
            };
            // No receivers just means nobody is listening for events.
            if completion_tx.send(event).is_err() {
                debug!("No event subscribers for completion notification");
            }
        }
    }

    /// Number of countdowns that ran to zero and when the last one did
    pub fn get_completions(&self) -> (u64, Option<DateTime<Utc>>) {
        self.completions
            .lock()
            .map(|log| (log.count, log.last))
            .unwrap_or((0, None))
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    /// Tear down the timer before the process exits
    pub fn shutdown(&self) {
        info!("Disposing countdown timer");
        self.view_model.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualTimer;
    use std::time::Duration;

    fn app() -> (AppState, ManualTimer) {
        let timer = ManualTimer::new();
        let state = AppState::new(0, "127.0.0.1".to_string(), Arc::new(timer.clone()));
        (state, timer)
    }

    #[test]
    fn test_toggle_rejects_zero_input() {
        let (state, timer) = app();
        assert!(state.toggle().is_err());
        assert_eq!(timer.active_countdowns(), 0);
        assert_eq!(state.get_completions().0, 0);
    }

    #[test]
    fn test_completion_is_recorded_and_broadcast() {
        let (state, timer) = app();
        let mut events = state.completion_tx.subscribe();
        state.change_input(Field::Seconds, "2");

        let running = state.toggle().unwrap();
        assert_eq!(running.phase, TimerPhase::Running);

        timer.advance(Duration::from_secs(2));
        let (count, last) = state.get_completions();
        assert_eq!(count, 1);
        assert!(last.is_some());

        let event = events.try_recv().unwrap();
        assert_eq!(event.message, COMPLETION_MESSAGE);
        assert_eq!(event.duration, TimeValue::new(0, 0, 2));
        assert_eq!(state.snapshot().display, "00:00:02");
    }

    #[test]
    fn test_toggle_stops_running_timer() {
        let (state, timer) = app();
        state.change_input(Field::Minutes, "1");
        state.toggle().unwrap();
        timer.advance(Duration::from_secs(52));

        let snapshot = state.snapshot();
        assert!(snapshot.final_countdown);
        assert_eq!(snapshot.display, "00:00:08");

        let stopped = state.toggle().unwrap();
        assert_eq!(stopped.phase, TimerPhase::Idle);
        assert_eq!(stopped.display, "00:01:00");
        assert!(!stopped.final_countdown);
        assert_eq!(state.get_last_action().0.as_deref(), Some("stop"));
    }

    #[test]
    fn test_toggle_after_shutdown_records_nothing() {
        let (state, timer) = app();
        state.change_input(Field::Seconds, "5");
        state.shutdown();

        assert!(state.toggle().is_err());
        assert_eq!(timer.active_countdowns(), 0);
        assert_eq!(state.snapshot().phase, TimerPhase::Idle);
        assert_eq!(state.get_last_action().0.as_deref(), Some("seconds"));
    }

    #[test]
    fn test_change_input_clamps() {
        let (state, _) = app();
        let snapshot = state.change_input(Field::Hours, "30");
        assert_eq!(snapshot.hours, 24);
        assert_eq!(state.get_last_action().0.as_deref(), Some("hours"));
    }

    #[test]
    fn test_uptime_format() {
        let (state, _) = app();
        assert!(state.get_uptime().ends_with('s'));
    }
}
