use chrono::{NaiveDate, NaiveTime};

use crate::layout::booking_span;
use crate::model::*;

use super::StoreError;

pub fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// A booking must cover at least one whole minute of its start day, or the
/// day it lands on could not be laid out.
pub(super) fn validate_booking_range(
    start: &chrono::NaiveDateTime,
    end: &chrono::NaiveDateTime,
) -> Result<(), StoreError> {
    if start >= end || booking_span(*start, *end).is_err() {
        return Err(StoreError::InvalidBookingRange);
    }
    Ok(())
}

/// Other bookings in `cal` that intersect `booking`.
pub(super) fn overlapping_bookings(cal: &UserCalendar, booking: &Booking) -> Vec<Booking> {
    cal.overlapping(booking.start, booking.end)
        .filter(|b| b.id != booking.id)
        .cloned()
        .collect()
}

/// Minute spans of `date` occupied by any booking in `cal`.
pub(super) fn busy_spans(cal: &UserCalendar, date: NaiveDate) -> Result<Vec<Span>, StoreError> {
    let day_start = date.and_time(NaiveTime::MIN);
    let Some(day_end) = date.succ_opt().map(|d| d.and_time(NaiveTime::MIN)) else {
        return Ok(Vec::new());
    };
    let mut spans = Vec::new();
    for booking in cal.overlapping(day_start, day_end) {
        // Bookings carried over from the previous day occupy the morning.
        spans.push(booking_span(booking.start.max(day_start), booking.end)?);
    }
    Ok(spans)
}
