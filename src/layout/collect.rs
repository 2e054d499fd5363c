use chrono::NaiveDate;

use crate::model::{Availability, Booking, CalendarEvent, EventKind};

use super::projector::project;
use super::time::booking_span;
use super::LayoutError;

/// Merge the bookings starting on `date` and the availability windows active
/// on `date` into one event list, in canonical order.
pub fn collect_day_events(
    date: NaiveDate,
    bookings: &[Booking],
    availabilities: &[Availability],
) -> Result<Vec<CalendarEvent>, LayoutError> {
    let mut events = Vec::new();

    for booking in bookings.iter().filter(|b| b.start.date() == date) {
        events.push(CalendarEvent {
            id: booking.id,
            span: booking_span(booking.start, booking.end)?,
            kind: EventKind::Booking,
            consultant_id: booking.consultant_id,
        });
    }

    for availability in availabilities {
        if let Some(span) = project(availability, date)? {
            events.push(CalendarEvent {
                id: availability.id,
                span,
                kind: EventKind::Availability,
                consultant_id: Some(availability.consultant_id),
            });
        }
    }

    sort_canonical(&mut events);
    Ok(events)
}

/// Order by start, then end, then id. Later stages only sort by start (stably),
/// so this fixes every tie independently of how the caller ordered its input.
pub(super) fn sort_canonical(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(a.span.end.cmp(&b.span.end))
            .then(a.id.cmp(&b.id))
    });
}
