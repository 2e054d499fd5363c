use chrono::NaiveDate;

use crate::limits::SLOT_STEP_MINUTES;
use crate::model::{Availability, Minutes, Span};

use super::projector::project;
use super::LayoutError;

/// Start minutes of every `duration`-long slot that fits inside one of the
/// windows active on `date`, stepping by 15 minutes from each window start.
/// Sorted and deduplicated across windows.
pub fn bookable_slots(
    date: NaiveDate,
    availabilities: &[Availability],
    duration: Minutes,
) -> Result<Vec<Minutes>, LayoutError> {
    if duration == 0 {
        return Err(LayoutError::ZeroDuration);
    }
    let mut slots = Vec::new();
    for availability in availabilities {
        let Some(window) = project(availability, date)? else {
            continue;
        };
        let mut start = window.start;
        while let Some(end) = start.checked_add(duration) {
            if end > window.end {
                break;
            }
            slots.push(start);
            start += SLOT_STEP_MINUTES;
        }
    }
    slots.sort_unstable();
    slots.dedup();
    Ok(slots)
}

/// Drop slots whose `[start, start + duration)` overlaps any busy span.
/// A zero duration describes no slot at all, so nothing is kept.
pub fn without_conflicts(slots: &[Minutes], duration: Minutes, busy: &[Span]) -> Vec<Minutes> {
    if duration == 0 {
        return Vec::new();
    }
    slots
        .iter()
        .copied()
        .filter(|&start| {
            let Some(end) = start.checked_add(duration) else {
                return false;
            };
            let slot = Span::new(start, end);
            !busy.iter().any(|b| b.overlaps(&slot))
        })
        .collect()
}
