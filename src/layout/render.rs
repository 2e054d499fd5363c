use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::warn;

use crate::limits::*;
use crate::model::*;

use super::collect::{collect_day_events, sort_canonical};
use super::columns::assign_columns;
use super::group::group_overlapping;
use super::LayoutError;

impl DayTimeRange {
    /// Visible range around `[min_start, max_end)`, padded and clamped to the day.
    pub fn padded(min_start: Minutes, max_end: Minutes) -> Self {
        let start_minutes = min_start.saturating_sub(RANGE_PADDING_MINUTES);
        let end_minutes = (max_end + RANGE_PADDING_MINUTES).min(MINUTES_PER_DAY);
        Self {
            start_minutes,
            end_minutes,
            total_minutes: end_minutes.saturating_sub(start_minutes).max(1),
        }
    }
}

/// Compute the position of every event of one day.
///
/// Fails on the first invalid interval; nothing is emitted in that case.
pub fn layout_day(events: &[CalendarEvent]) -> Result<DayLayout, LayoutError> {
    if events.is_empty() {
        return Ok(DayLayout::default());
    }
    if events.len() > MAX_EVENTS_PER_DAY {
        return Err(LayoutError::TooManyEvents(events.len()));
    }
    for event in events {
        Span::checked(event.span.start, event.span.end)?;
    }

    let started = Instant::now();
    let mut canonical = events.to_vec();
    sort_canonical(&mut canonical);

    let (min_start, max_end) = canonical
        .iter()
        .fold((MINUTES_PER_DAY, 0), |(lo, hi), e| {
            (lo.min(e.span.start), hi.max(e.span.end))
        });
    let range = DayTimeRange::padded(min_start, max_end);

    let mut positions = BTreeMap::new();
    for group in group_overlapping(&canonical) {
        let assignment = assign_columns(&group);
        for (event, &column) in group.iter().zip(&assignment.columns) {
            let position = place(event, column, assignment.used_columns, &range);
            if positions.insert(event.id, position).is_some() {
                warn!(id = %event.id, "duplicate calendar event id, keeping the later position");
            }
        }
    }

    metrics::counter!(crate::observability::LAYOUT_DAYS_TOTAL).increment(1);
    metrics::histogram!(crate::observability::LAYOUT_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    Ok(DayLayout {
        positions,
        time_range: Some(range),
    })
}

fn place(event: &CalendarEvent, column: u32, used_columns: u32, range: &DayTimeRange) -> EventPosition {
    let total = f64::from(range.total_minutes);
    let offset = event.span.start.saturating_sub(range.start_minutes);
    let mut top = f64::from(offset) / total * 100.0;
    let height = (f64::from(event.span.duration()) / total * 100.0).max(MIN_HEIGHT_PERCENT);
    // The height floor can push a late short event past the bottom edge.
    if top + height > 100.0 {
        top = (100.0 - height).max(0.0);
    }
    let columns = f64::from(used_columns);
    EventPosition {
        top,
        left: f64::from(column) / columns * 100.0,
        width: 100.0 / columns,
        height,
    }
}

/// Collect and lay out one calendar date.
pub fn layout_for_date(
    date: NaiveDate,
    bookings: &[Booking],
    availabilities: &[Availability],
) -> Result<DayLayout, LayoutError> {
    let events = collect_day_events(date, bookings, availabilities)?;
    layout_day(&events)
}
