//! Time value structure and input validation

use std::fmt;

use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: u64 = 3_600_000;
const MILLIS_PER_MINUTE: u64 = 60_000;
const MILLIS_PER_SECOND: u64 = 1_000;

/// One of the three editable fields of a [`TimeValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Hours,
    Minutes,
    Seconds,
}

impl Field {
    /// Largest value the field accepts
    pub fn max(self) -> u64 {
        match self {
            Field::Hours => 24,
            Field::Minutes | Field::Seconds => 59,
        }
    }

    /// Saturate a value to the field's range
    pub fn clamp(self, value: u64) -> u64 {
        value.min(self.max())
    }

    /// Parse raw text and saturate it to the field's range
    pub fn parse(self, text: &str) -> u64 {
        self.clamp(parse_field(text))
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Hours => "hours",
            Field::Minutes => "minutes",
            Field::Seconds => "seconds",
        }
    }
}

/// Parse raw field text into a non-negative integer.
///
/// Anything that is not a plain non-negative integer (empty text, letters,
/// a minus sign, a value overflowing `u64`) reads as 0.
pub fn parse_field(text: &str) -> u64 {
    text.trim().parse::<u64>().unwrap_or(0)
}

/// Hours, minutes and seconds shown on the timer, either pending input or
/// the remaining countdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeValue {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeValue {
    /// Create a time value, clamping every field to its range
    pub fn new(hours: u64, minutes: u64, seconds: u64) -> Self {
        Self {
            hours: Field::Hours.clamp(hours),
            minutes: Field::Minutes.clamp(minutes),
            seconds: Field::Seconds.clamp(seconds),
        }
    }

    /// Decompose the milliseconds left in a countdown into display fields.
    ///
    /// Each field wraps at its unit boundary (hours at 24), which is exact
    /// for every duration the input fields can produce below 24 hours.
    pub fn from_remaining_millis(ms: u64) -> Self {
        Self {
            hours: (ms / MILLIS_PER_HOUR) % 24,
            minutes: (ms / MILLIS_PER_MINUTE) % 60,
            seconds: (ms / MILLIS_PER_SECOND) % 60,
        }
    }

    pub fn get(&self, field: Field) -> u64 {
        match field {
            Field::Hours => self.hours,
            Field::Minutes => self.minutes,
            Field::Seconds => self.seconds,
        }
    }

    /// Total length of the value in seconds
    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }

    /// True during the last nine seconds of a countdown
    pub fn is_final_countdown(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && (1..10).contains(&self.seconds)
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}
