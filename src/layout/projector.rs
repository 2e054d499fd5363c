use chrono::{Datelike, NaiveDate};

use crate::model::{Availability, DayOfWeek, Span};

use super::time::wall_clock_minutes;
use super::LayoutError;

/// A weekly window applies to `date` when the weekday matches and the date
/// lies inside the inclusive active range.
pub fn is_active_on(availability: &Availability, date: NaiveDate) -> bool {
    DayOfWeek::from(date.weekday()) == availability.day
        && availability.active_from <= date
        && date <= availability.active_until
}

/// Concrete minute span of the window on `date`, or `None` if it does not apply.
pub fn project(availability: &Availability, date: NaiveDate) -> Result<Option<Span>, LayoutError> {
    if !is_active_on(availability, date) {
        return Ok(None);
    }
    let start = wall_clock_minutes(&availability.start_time)?;
    let end = wall_clock_minutes(&availability.end_time)?;
    Span::checked(start, end).map(Some)
}
