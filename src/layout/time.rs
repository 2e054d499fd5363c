use chrono::{NaiveDateTime, Timelike};

use crate::limits::MINUTES_PER_DAY;
use crate::model::{Minutes, Span};

use super::LayoutError;

/// Half-open intersection: back-to-back intervals do not overlap.
pub fn overlaps(start_a: Minutes, end_a: Minutes, start_b: Minutes, end_b: Minutes) -> bool {
    start_a < end_b && start_b < end_a
}

/// Parse `"HH:MM"` into minutes since midnight.
pub fn time_to_minutes(text: &str) -> Result<Minutes, LayoutError> {
    let malformed = || LayoutError::MalformedTime(text.to_string());
    let (hours, minutes) = text.split_once(':').ok_or_else(malformed)?;
    let hours = component(hours, 23).ok_or_else(malformed)?;
    let minutes = component(minutes, 59).ok_or_else(malformed)?;
    Ok(hours * 60 + minutes)
}

/// Parse a stored wall-clock time `"HH:MM[:SS]"`. Anything after the minutes
/// component is ignored.
pub fn wall_clock_minutes(text: &str) -> Result<Minutes, LayoutError> {
    match text.match_indices(':').nth(1) {
        Some((idx, _)) => time_to_minutes(&text[..idx])
            .map_err(|_| LayoutError::MalformedTime(text.to_string())),
        None => time_to_minutes(text),
    }
}

fn component(s: &str, max: u32) -> Option<u32> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().filter(|v| *v <= max)
}

pub fn minutes_of_day(t: NaiveDateTime) -> Minutes {
    t.hour() * 60 + t.minute()
}

/// Minute span of a booking on its start date. A booking running past
/// midnight is clipped to the end of that day.
pub fn booking_span(start: NaiveDateTime, end: NaiveDateTime) -> Result<Span, LayoutError> {
    let start_minutes = minutes_of_day(start);
    let end_minutes = if end.date() > start.date() {
        MINUTES_PER_DAY
    } else {
        minutes_of_day(end)
    };
    Span::checked(start_minutes, end_minutes)
}
