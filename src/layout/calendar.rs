use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::model::{Availability, Booking, DayLayout, DayTimeRange};

use super::render::layout_for_date;
use super::LayoutError;

/// Rendering scale of a day container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewScale {
    Week,
    Month,
}

impl ViewScale {
    pub fn px_per_hour(self) -> f64 {
        match self {
            ViewScale::Week => 60.0,
            ViewScale::Month => 40.0,
        }
    }

    pub fn min_height_px(self) -> f64 {
        match self {
            ViewScale::Week => 80.0,
            ViewScale::Month => 60.0,
        }
    }

    /// Pixel height of a day container; an empty day gets the minimum.
    pub fn container_height_px(self, range: Option<&DayTimeRange>) -> f64 {
        range.map_or(self.min_height_px(), |r| {
            (f64::from(r.total_minutes) / 60.0 * self.px_per_hour()).max(self.min_height_px())
        })
    }
}

/// One day of a multi-day view. Each day carries its own outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct DayView {
    pub date: NaiveDate,
    pub layout: Result<DayLayout, LayoutError>,
    pub container_height_px: f64,
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Monday through Sunday of the week containing `anchor`.
pub fn week_days(anchor: NaiveDate) -> Vec<NaiveDate> {
    monday_of(anchor).iter_days().take(7).collect()
}

/// Whole weeks (Monday first) covering the month containing `anchor`.
pub fn month_grid_days(anchor: NaiveDate) -> Vec<NaiveDate> {
    let first = anchor - Days::new(u64::from(anchor.day0()));
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    let grid_start = monday_of(first);
    let grid_end = last + Days::new(u64::from(6 - last.weekday().num_days_from_monday()));
    grid_start.iter_days().take_while(|d| *d <= grid_end).collect()
}

/// Lay out each day independently; a failing day does not affect the others.
pub fn layout_days(
    days: &[NaiveDate],
    bookings: &[Booking],
    availabilities: &[Availability],
    scale: ViewScale,
) -> Vec<DayView> {
    days.iter()
        .map(|&date| {
            let layout = layout_for_date(date, bookings, availabilities);
            if let Err(e) = &layout {
                warn!(%date, "day layout failed: {e}");
            }
            let container_height_px = match &layout {
                Ok(l) => scale.container_height_px(l.time_range.as_ref()),
                Err(_) => scale.min_height_px(),
            };
            DayView {
                date,
                layout,
                container_height_px,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        let days = week_days(date(2026, 10, 22)); // Thursday
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date(2026, 10, 19));
        assert_eq!(days[0].weekday(), Weekday::Mon);
        assert_eq!(days[6], date(2026, 10, 25));
    }

    #[test]
    fn week_of_a_sunday_is_the_preceding_week() {
        let days = week_days(date(2026, 10, 25));
        assert_eq!(days[0], date(2026, 10, 19));
    }

    #[test]
    fn month_grid_covers_whole_weeks() {
        // October 2026 starts on a Thursday and ends on a Saturday.
        let days = month_grid_days(date(2026, 10, 19));
        assert_eq!(days.first(), Some(&date(2026, 9, 28)));
        assert_eq!(days.last(), Some(&date(2026, 11, 1)));
        assert_eq!(days.len() % 7, 0);
        assert_eq!(days.len(), 35);
    }

    #[test]
    fn month_grid_of_december_crosses_the_year() {
        let days = month_grid_days(date(2026, 12, 5));
        assert_eq!(days.first(), Some(&date(2026, 11, 30)));
        assert_eq!(days.last(), Some(&date(2027, 1, 3)));
    }

    #[test]
    fn container_height_scales_with_range() {
        let range = DayTimeRange {
            start_minutes: 510,
            end_minutes: 1050,
            total_minutes: 540,
        };
        assert_eq!(ViewScale::Week.container_height_px(Some(&range)), 540.0);
        assert_eq!(ViewScale::Month.container_height_px(Some(&range)), 360.0);
        assert_eq!(ViewScale::Week.container_height_px(None), 80.0);
        assert_eq!(ViewScale::Month.container_height_px(None), 60.0);
    }

    #[test]
    fn container_height_has_a_floor() {
        let range = DayTimeRange {
            start_minutes: 570,
            end_minutes: 630,
            total_minutes: 60,
        };
        assert_eq!(ViewScale::Week.container_height_px(Some(&range)), 80.0);
    }
}
