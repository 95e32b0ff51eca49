//! Server-sent event stream of timer changes

use std::{convert::Infallible, sync::Arc};

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::state::{AppState, CompletionEvent, CountdownViewModel, Subscription};

/// A change observed on the timer
#[derive(Debug, Clone, PartialEq)]
pub enum TimerUpdate {
    Hours(u64),
    Minutes(u64),
    Seconds(u64),
    Running(bool),
    Completed(CompletionEvent),
}

impl TimerUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            TimerUpdate::Hours(_) => "hours",
            TimerUpdate::Minutes(_) => "minutes",
            TimerUpdate::Seconds(_) => "seconds",
            TimerUpdate::Running(_) => "running",
            TimerUpdate::Completed(_) => "completed",
        }
    }

    pub fn into_event(self) -> Event {
        let event = Event::default().event(self.name());
        match self {
            TimerUpdate::Hours(v) | TimerUpdate::Minutes(v) | TimerUpdate::Seconds(v) => {
                event.data(v.to_string())
            }
            TimerUpdate::Running(running) => event.data(running.to_string()),
            TimerUpdate::Completed(completion) => match serde_json::to_string(&completion) {
                Ok(json) => event.data(json),
                Err(e) => {
                    warn!("Failed to serialize completion event: {}", e);
                    event.data(completion.message)
                }
            },
        }
    }
}

/// Updates buffered per client before new ones are dropped
pub const EVENT_BUFFER: usize = 32;

fn forward(tx: &mpsc::Sender<TimerUpdate>, update: TimerUpdate) {
    match tx.try_send(update) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(update)) => {
            warn!("Event stream client is behind, dropping {} update", update.name());
        }
        // The client went away; the subscriptions are dropped with the stream.
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

/// Forward every observable of the view model into `tx`.
///
/// The current values are sent first. Listeners never wait on the channel,
/// so a full buffer drops updates instead of holding up the timer. Dropping
/// the returned subscriptions stops the forwarding.
pub fn forward_updates(view_model: &CountdownViewModel, tx: mpsc::Sender<TimerUpdate>) -> Vec<Subscription> {
    let hours_tx = tx.clone();
    let minutes_tx = tx.clone();
    let seconds_tx = tx.clone();
    let running_tx = tx;

    vec![
        view_model.hours().subscribe(move |v| forward(&hours_tx, TimerUpdate::Hours(*v))),
        view_model.minutes().subscribe(move |v| forward(&minutes_tx, TimerUpdate::Minutes(*v))),
        view_model.seconds().subscribe(move |v| forward(&seconds_tx, TimerUpdate::Seconds(*v))),
        view_model.is_running().subscribe(move |v| forward(&running_tx, TimerUpdate::Running(*v))),
    ]
}

struct StreamState {
    updates: mpsc::Receiver<TimerUpdate>,
    completions: broadcast::Receiver<CompletionEvent>,
    _subscriptions: Vec<Subscription>,
}

/// Stream of timer updates for one client, unsubscribed when dropped
pub fn timer_updates(state: &Arc<AppState>) -> impl Stream<Item = TimerUpdate> + Send + 'static {
    let (tx, updates) = mpsc::channel(EVENT_BUFFER);
    let subscriptions = forward_updates(&state.view_model, tx);
    let completions = state.completion_tx.subscribe();
    debug!("Event stream subscribed");

    let initial = StreamState {
        updates,
        completions,
        _subscriptions: subscriptions,
    };

    stream::unfold(initial, |mut st| async move {
        loop {
            tokio::select! {
                biased;

                update = st.updates.recv() => {
                    return update.map(|update| (update, st));
                }
                completion = st.completions.recv() => match completion {
                    Ok(completion) => return Some((TimerUpdate::Completed(completion), st)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event stream lagged, skipped {} completion notifications", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    })
}

/// SSE events for [`timer_updates`]
pub fn sse_stream(state: &Arc<AppState>) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    timer_updates(state).map(|update| Ok(update.into_event()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualTimer;
    use crate::state::Field;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stream_sends_current_values_then_changes() {
        let timer = ManualTimer::new();
        let state = Arc::new(AppState::new(0, "localhost".to_string(), Arc::new(timer.clone())));
        state.change_input(Field::Seconds, "2");

        let updates = timer_updates(&state);
        futures::pin_mut!(updates);

        let mut first = Vec::new();
        for _ in 0..4 {
            first.push(updates.next().await.unwrap());
        }
        assert_eq!(
            first,
            vec![
                TimerUpdate::Hours(0),
                TimerUpdate::Minutes(0),
                TimerUpdate::Seconds(2),
                TimerUpdate::Running(false),
            ]
        );

        state.toggle().unwrap();
        assert_eq!(updates.next().await.unwrap(), TimerUpdate::Running(true));

        timer.advance(Duration::from_secs(1));
        assert_eq!(updates.next().await.unwrap(), TimerUpdate::Seconds(1));

        timer.advance(Duration::from_secs(1));
        assert_eq!(updates.next().await.unwrap(), TimerUpdate::Running(false));
        assert_eq!(updates.next().await.unwrap(), TimerUpdate::Seconds(2));
        match updates.next().await.unwrap() {
            TimerUpdate::Completed(event) => assert_eq!(event.duration.seconds, 2),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let timer = ManualTimer::new();
        let state = Arc::new(AppState::new(0, "localhost".to_string(), Arc::new(timer)));

        let updates = timer_updates(&state);
        assert_eq!(state.view_model.hours().subscriber_count(), 1);
        drop(updates);
        assert_eq!(state.view_model.hours().subscriber_count(), 0);
        assert_eq!(state.view_model.is_running().subscriber_count(), 0);
    }

    #[test]
    fn test_slow_client_drops_updates_without_blocking() {
        let timer = ManualTimer::new();
        let state = AppState::new(0, "localhost".to_string(), Arc::new(timer));
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let _subscriptions = forward_updates(&state.view_model, tx);

        for minutes in 1..=EVENT_BUFFER as u64 {
            state.view_model.set_field(Field::Minutes, minutes % 60);
        }
        assert_eq!(state.view_model.minutes().get(), EVENT_BUFFER as u64 % 60);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, EVENT_BUFFER);

        state.view_model.set_field(Field::Seconds, 7);
        assert_eq!(rx.try_recv().unwrap(), TimerUpdate::Seconds(7));
    }

    #[test]
    fn test_closed_client_is_ignored() {
        let timer = ManualTimer::new();
        let state = AppState::new(0, "localhost".to_string(), Arc::new(timer));
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let _subscriptions = forward_updates(&state.view_model, tx);
        drop(rx);

        state.view_model.set_field(Field::Hours, 3);
        assert_eq!(state.view_model.hours().get(), 3);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(TimerUpdate::Running(true).name(), "running");
        assert_eq!(TimerUpdate::Seconds(4).name(), "seconds");
    }
}
