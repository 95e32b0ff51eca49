//! State management module
//!
//! This module contains the timer input, the countdown state machine and
//! the application state the HTTP layer works with.

pub mod app_state;
pub mod observable;
pub mod time_value;
pub mod timer_state;
pub mod view_model;

// Re-export main types
pub use app_state::{AppState, CompletionEvent, TimerSnapshot, COMPLETION_MESSAGE};
pub use observable::{Observable, Subscription};
pub use time_value::{parse_field, Field, TimeValue};
pub use timer_state::TimerPhase;
pub use view_model::CountdownViewModel;
