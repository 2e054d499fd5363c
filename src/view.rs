use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::layout::{
    layout_days, layout_for_date, month_grid_days, week_days, DayView, LayoutError, ViewScale,
};
use crate::model::{Availability, Booking, DayLayout};
use crate::store::{CalendarSnapshot, Store};

/// Where calendar views read a user's bookings and availability windows from.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn calendar_of(&self, user_id: Ulid) -> CalendarSnapshot;
}

#[async_trait]
impl CalendarSource for Store {
    async fn calendar_of(&self, user_id: Ulid) -> CalendarSnapshot {
        self.snapshot(user_id).await
    }
}

/// In-memory source for callers that already hold the records.
#[async_trait]
impl CalendarSource for CalendarSnapshot {
    async fn calendar_of(&self, _user_id: Ulid) -> CalendarSnapshot {
        self.clone()
    }
}

/// Day, week and month layouts of one user's calendar.
///
/// The snapshot is taken once per call and the store lock is released before
/// any layout runs.
pub struct CalendarView<S: ?Sized> {
    source: Arc<S>,
}

impl<S: CalendarSource + ?Sized> CalendarView<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    pub async fn day(&self, user_id: Ulid, date: NaiveDate) -> Result<DayLayout, LayoutError> {
        let CalendarSnapshot {
            bookings,
            availabilities,
        } = self.source.calendar_of(user_id).await;
        layout_for_date(date, &bookings, &availabilities)
    }

    pub async fn week(&self, user_id: Ulid, anchor: NaiveDate) -> Vec<DayView> {
        self.days(user_id, &week_days(anchor), ViewScale::Week).await
    }

    pub async fn month(&self, user_id: Ulid, anchor: NaiveDate) -> Vec<DayView> {
        self.days(user_id, &month_grid_days(anchor), ViewScale::Month)
            .await
    }

    async fn days(&self, user_id: Ulid, days: &[NaiveDate], scale: ViewScale) -> Vec<DayView> {
        let snapshot = self.source.calendar_of(user_id).await;
        lay_out(days, &snapshot.bookings, &snapshot.availabilities, scale)
    }
}

fn lay_out(
    days: &[NaiveDate],
    bookings: &[Booking],
    availabilities: &[Availability],
    scale: ViewScale,
) -> Vec<DayView> {
    let span = tracing::debug_span!("layout_days", days = days.len(), ?scale);
    let _enter = span.enter();
    layout_days(days, bookings, availabilities, scale)
}
