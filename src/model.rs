use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::layout::LayoutError;
use crate::limits::MINUTES_PER_DAY;

/// Unix milliseconds, used for job deadlines.
pub type Ms = i64;

/// Minute of day, `0..=1440`.
pub type Minutes = u32;

/// Half-open minute-of-day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Build a span from untrusted bounds.
    pub fn checked(start: Minutes, end: Minutes) -> Result<Self, LayoutError> {
        if start >= end || end > MINUTES_PER_DAY {
            return Err(LayoutError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        crate::layout::overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Monday = 0 .. Sunday = 6.
    pub fn index(self) -> u32 {
        Weekday::from(self).num_days_from_monday()
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

/// A (user, skill) pairing: one service a user can be booked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultant {
    pub id: Ulid,
    pub user_id: Ulid,
    pub skill: String,
}

/// Recurring weekly window during which a consultant is bookable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub id: Ulid,
    pub consultant_id: Ulid,
    pub day: DayOfWeek,
    /// First date the pattern applies to (inclusive).
    #[serde(rename = "start")]
    pub active_from: NaiveDate,
    /// Last date the pattern applies to (inclusive).
    #[serde(rename = "end")]
    pub active_until: NaiveDate,
    /// Wall-clock `"HH:MM[:SS]"`.
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Draft,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub client_id: Ulid,
    /// `None` marks the client's own time-off across all their consultant roles.
    pub consultant_id: Option<Ulid>,
    /// Local wall-clock timestamps.
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: BookingStatus,
    /// Deadline of the pending draft confirmation, if any.
    pub confirm_at: Option<Ms>,
}

impl Booking {
    pub fn is_time_off(&self) -> bool {
        self.consultant_id.is_none()
    }
}

// ── Layout types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Booking,
    Availability,
}

/// One booking or projected availability window on a concrete day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Ulid,
    pub span: Span,
    pub kind: EventKind,
    pub consultant_id: Option<Ulid>,
}

/// Rectangle in percent of the day container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventPosition {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// Padded visible range of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTimeRange {
    pub start_minutes: Minutes,
    pub end_minutes: Minutes,
    pub total_minutes: Minutes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayLayout {
    pub positions: BTreeMap<Ulid, EventPosition>,
    pub time_range: Option<DayTimeRange>,
}

impl DayLayout {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Store state ──────────────────────────────────────────────────

/// Everything shown on one user's calendar: their consultant roles, the
/// availability windows of those roles, bookings made on those roles and
/// the user's own time-off.
#[derive(Debug, Clone)]
pub struct UserCalendar {
    pub user_id: Ulid,
    pub consultants: Vec<Consultant>,
    pub availabilities: Vec<Availability>,
    /// Sorted by `start`.
    pub bookings: Vec<Booking>,
}

impl UserCalendar {
    pub fn new(user_id: Ulid) -> Self {
        Self {
            user_id,
            consultants: Vec::new(),
            availabilities: Vec::new(),
            bookings: Vec::new(),
        }
    }

    pub fn owns_consultant(&self, consultant_id: Ulid) -> bool {
        self.consultants.iter().any(|c| c.id == consultant_id)
    }

    /// Insert or replace an availability window by id.
    pub fn upsert_availability(&mut self, availability: Availability) {
        match self.availabilities.iter_mut().find(|a| a.id == availability.id) {
            Some(slot) => *slot = availability,
            None => self.availabilities.push(availability),
        }
    }

    pub fn remove_availability(&mut self, id: Ulid) -> Option<Availability> {
        let pos = self.availabilities.iter().position(|a| a.id == id)?;
        Some(self.availabilities.remove(pos))
    }

    /// Insert booking maintaining sort order by start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self.bookings.partition_point(|b| b.start <= booking.start);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Bookings whose `[start, end)` intersects the query window.
    pub fn overlapping(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> impl Iterator<Item = &Booking> {
        let right_bound = self.bookings.partition_point(|b| b.start < end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.end > start)
    }
}

/// WAL record format. Every record names the user whose calendar it touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    ConsultantCreated {
        id: Ulid,
        user_id: Ulid,
        skill: String,
    },
    AvailabilityAdded {
        user_id: Ulid,
        availability: Availability,
    },
    AvailabilityUpdated {
        user_id: Ulid,
        availability: Availability,
    },
    AvailabilityRemoved {
        id: Ulid,
        user_id: Ulid,
    },
    BookingCreated {
        user_id: Ulid,
        booking: Booking,
    },
    BookingRescheduled {
        id: Ulid,
        user_id: Ulid,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    BookingConfirmed {
        id: Ulid,
        user_id: Ulid,
    },
    BookingDeleted {
        id: Ulid,
        user_id: Ulid,
    },
}

impl StoreEvent {
    pub fn user_id(&self) -> Ulid {
        match self {
            StoreEvent::ConsultantCreated { user_id, .. }
            | StoreEvent::AvailabilityAdded { user_id, .. }
            | StoreEvent::AvailabilityUpdated { user_id, .. }
            | StoreEvent::AvailabilityRemoved { user_id, .. }
            | StoreEvent::BookingCreated { user_id, .. }
            | StoreEvent::BookingRescheduled { user_id, .. }
            | StoreEvent::BookingConfirmed { user_id, .. }
            | StoreEvent::BookingDeleted { user_id, .. } => *user_id,
        }
    }
}
