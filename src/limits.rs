use crate::model::Minutes;

pub const MINUTES_PER_DAY: Minutes = 24 * 60;

/// Visible range padding before the first and after the last event of a day.
pub const RANGE_PADDING_MINUTES: Minutes = 30;

/// Visibility floor for very short events, in percent of the day's range.
pub const MIN_HEIGHT_PERCENT: f64 = 3.0;

/// Step between candidate start times when offering bookable slots.
pub const SLOT_STEP_MINUTES: Minutes = 15;

pub const MAX_EVENTS_PER_DAY: usize = 10_000;
pub const MAX_SKILL_LEN: usize = 256;
pub const MAX_CONSULTANTS_PER_USER: usize = 64;
pub const MAX_AVAILABILITIES_PER_USER: usize = 4_096;
