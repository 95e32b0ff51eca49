//! Countdown Timer - A single-screen countdown timer
//!
//! The core is [`CountdownViewModel`]: it validates hour/minute/second
//! input, counts down once per second through a [`RepeatingTimer`] and
//! restores the input when the countdown is stopped or finishes. The HTTP
//! API in [`api`] is a thin presentation layer over it.

pub mod api;
pub mod config;
pub mod scheduler;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use scheduler::{ManualTimer, RepeatingTimer, TimerHandle, TokioTimer};
pub use state::{AppState, CountdownViewModel, Field, Observable, TimeValue, TimerPhase};
pub use utils::signals::shutdown_signal;
