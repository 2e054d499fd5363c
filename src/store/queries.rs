use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::layout::{bookable_slots, wall_clock_minutes, without_conflicts};
use crate::model::*;

use super::conflict::{busy_spans, overlapping_bookings};
use super::{Store, StoreError};

/// Bookings and availability windows of one user, copied out of the lock.
#[derive(Debug, Clone, Default)]
pub struct CalendarSnapshot {
    pub bookings: Vec<Booking>,
    pub availabilities: Vec<Availability>,
}

impl Store {
    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        let cal = self.get_calendar(&self.owner_of(&id)?)?;
        let guard = cal.read().await;
        guard.booking(id).cloned()
    }

    pub async fn consultants_for_user(&self, user_id: Ulid) -> Vec<Consultant> {
        match self.get_calendar(&user_id) {
            Some(cal) => cal.read().await.consultants.clone(),
            None => Vec::new(),
        }
    }

    /// Windows of one consultant role, Monday first, then by start time.
    pub async fn list_availabilities(
        &self,
        consultant_id: Ulid,
    ) -> Result<Vec<Availability>, StoreError> {
        let owner = self
            .owner_of(&consultant_id)
            .ok_or(StoreError::NotFound(consultant_id))?;
        let cal = self.get_calendar(&owner).ok_or(StoreError::NotFound(owner))?;
        let mut windows: Vec<Availability> = cal
            .read()
            .await
            .availabilities
            .iter()
            .filter(|a| a.consultant_id == consultant_id)
            .cloned()
            .collect();
        // Stored times were validated on write.
        windows.sort_by_cached_key(|a| {
            (a.day.index(), wall_clock_minutes(&a.start_time).unwrap_or(u32::MAX))
        });
        Ok(windows)
    }

    /// Bookings on any of the user's consultant roles plus their own time-off,
    /// ordered by start.
    pub async fn bookings_for_user(&self, user_id: Ulid) -> Vec<Booking> {
        self.snapshot(user_id).await.bookings
    }

    pub async fn availabilities_for_user(&self, user_id: Ulid) -> Vec<Availability> {
        self.snapshot(user_id).await.availabilities
    }

    pub async fn snapshot(&self, user_id: Ulid) -> CalendarSnapshot {
        let Some(cal) = self.get_calendar(&user_id) else {
            return CalendarSnapshot::default();
        };
        let guard = cal.read().await;
        CalendarSnapshot {
            bookings: guard.bookings.clone(),
            availabilities: guard.availabilities.clone(),
        }
    }

    /// Other bookings on the same calendar that overlap `booking_id`.
    /// Reported only; creation never rejects an overlap.
    pub async fn conflicts_for(&self, booking_id: Ulid) -> Result<Vec<Booking>, StoreError> {
        let owner = self
            .owner_of(&booking_id)
            .ok_or(StoreError::NotFound(booking_id))?;
        let cal = self.get_calendar(&owner).ok_or(StoreError::NotFound(owner))?;
        let guard = cal.read().await;
        let booking = guard
            .booking(booking_id)
            .ok_or(StoreError::NotFound(booking_id))?;
        Ok(overlapping_bookings(&guard, booking))
    }

    /// Start times of `duration`-minute slots on `date` that fall inside the
    /// consultant's windows and clear every booking of the owner that day.
    pub async fn open_slots(
        &self,
        consultant_id: Ulid,
        date: NaiveDate,
        duration: Minutes,
    ) -> Result<Vec<NaiveTime>, StoreError> {
        let owner = self
            .owner_of(&consultant_id)
            .ok_or(StoreError::NotFound(consultant_id))?;
        let cal = self.get_calendar(&owner).ok_or(StoreError::NotFound(owner))?;
        let guard = cal.read().await;
        let windows: Vec<Availability> = guard
            .availabilities
            .iter()
            .filter(|a| a.consultant_id == consultant_id)
            .cloned()
            .collect();
        let busy = busy_spans(&guard, date)?;
        drop(guard);

        let slots = bookable_slots(date, &windows, duration)?;
        Ok(without_conflicts(&slots, duration, &busy)
            .into_iter()
            .filter_map(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0))
            .collect())
    }
}
