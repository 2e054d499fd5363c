mod calendar;
mod collect;
mod columns;
mod error;
mod group;
mod projector;
mod render;
mod slots;
mod time;

pub use calendar::{layout_days, month_grid_days, week_days, DayView, ViewScale};
pub use collect::collect_day_events;
pub use columns::{assign_columns, ColumnAssignment};
pub use error::LayoutError;
pub use group::group_overlapping;
pub use projector::{is_active_on, project};
pub use render::{layout_day, layout_for_date};
pub use slots::{bookable_slots, without_conflicts};
pub use time::{booking_span, minutes_of_day, overlaps, time_to_minutes, wall_clock_minutes};
