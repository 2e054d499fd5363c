use std::future::Future;

use chrono::NaiveDateTime;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tracing::info;
use ulid::Ulid;

use crate::layout::wall_clock_minutes;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{now_ms, validate_booking_range};
use super::{Store, StoreError, WalCommand};

fn record<T>(op: &'static str, result: &Result<T, StoreError>) {
    metrics::counter!(
        observability::MUTATIONS_TOTAL,
        "op" => op,
        "status" => observability::status_label(result),
    )
    .increment(1);
}

fn validate_availability(availability: &Availability) -> Result<(), StoreError> {
    if availability.active_from > availability.active_until {
        return Err(StoreError::InvalidActiveRange);
    }
    let start = wall_clock_minutes(&availability.start_time)?;
    let end = wall_clock_minutes(&availability.end_time)?;
    Span::checked(start, end)?;
    Ok(())
}

impl Store {
    /// Claim `id` for `owner` in the entity index, failing if anything holds it.
    fn reserve_id(&self, id: Ulid, owner: Ulid) -> Result<(), StoreError> {
        match self.entity_to_user.entry(id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(owner);
                Ok(())
            }
        }
    }

    /// Run `write` with `id` reserved for `owner`. A failed write frees the id.
    async fn with_reserved_id<T>(
        &self,
        id: Ulid,
        owner: Ulid,
        write: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        self.reserve_id(id, owner)?;
        let result = write.await;
        if result.is_err() {
            self.entity_to_user.remove_if(&id, |_, held| *held == owner);
        }
        result
    }

    pub async fn create_consultant(
        &self,
        id: Ulid,
        user_id: Ulid,
        skill: String,
    ) -> Result<(), StoreError> {
        let result = self.create_consultant_inner(id, user_id, skill).await;
        record("create_consultant", &result);
        result
    }

    async fn create_consultant_inner(
        &self,
        id: Ulid,
        user_id: Ulid,
        skill: String,
    ) -> Result<(), StoreError> {
        if skill.len() > MAX_SKILL_LEN {
            return Err(StoreError::LimitExceeded("skill name too long"));
        }
        let _gate = self.write_gate.read().await;
        self.with_reserved_id(id, user_id, async {
            let cal = self.calendar_or_create(user_id);
            let mut guard = cal.write().await;
            if guard.consultants.len() >= MAX_CONSULTANTS_PER_USER {
                return Err(StoreError::LimitExceeded("too many consultant roles"));
            }
            let event = StoreEvent::ConsultantCreated { id, user_id, skill };
            self.persist_and_apply(&mut guard, &event).await?;
            info!(consultant = %id, user = %user_id, "consultant created");
            Ok(())
        })
        .await
    }

    /// Publish a weekly window for one of `user_id`'s consultant roles.
    pub async fn add_availability(
        &self,
        user_id: Ulid,
        availability: Availability,
    ) -> Result<(), StoreError> {
        let result = self.add_availability_inner(user_id, availability).await;
        record("add_availability", &result);
        result
    }

    async fn add_availability_inner(
        &self,
        user_id: Ulid,
        availability: Availability,
    ) -> Result<(), StoreError> {
        validate_availability(&availability)?;
        let _gate = self.write_gate.read().await;
        self.with_reserved_id(availability.id, user_id, async {
            let cal = self
                .get_calendar(&user_id)
                .ok_or(StoreError::NotFound(availability.consultant_id))?;
            let mut guard = cal.write().await;
            self.check_consultant_owner(&guard, availability.consultant_id)?;
            if guard.availabilities.len() >= MAX_AVAILABILITIES_PER_USER {
                return Err(StoreError::LimitExceeded("too many availability windows"));
            }
            let event = StoreEvent::AvailabilityAdded {
                user_id,
                availability,
            };
            self.persist_and_apply(&mut guard, &event).await
        })
        .await
    }

    /// Replace an existing window. It may move to another of the user's roles.
    pub async fn update_availability(
        &self,
        user_id: Ulid,
        availability: Availability,
    ) -> Result<(), StoreError> {
        let result = self.update_availability_inner(user_id, availability).await;
        record("update_availability", &result);
        result
    }

    async fn update_availability_inner(
        &self,
        user_id: Ulid,
        availability: Availability,
    ) -> Result<(), StoreError> {
        validate_availability(&availability)?;
        let _gate = self.write_gate.read().await;
        let mut guard = self.resolve_entity_write(&availability.id).await?;
        if guard.user_id != user_id {
            return Err(StoreError::NotOwner {
                entity: availability.id,
                user: user_id,
            });
        }
        self.check_consultant_owner(&guard, availability.consultant_id)?;
        let event = StoreEvent::AvailabilityUpdated {
            user_id,
            availability,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    pub async fn remove_availability(&self, user_id: Ulid, id: Ulid) -> Result<(), StoreError> {
        let result = async {
            let _gate = self.write_gate.read().await;
            let mut guard = self.resolve_entity_write(&id).await?;
            if guard.user_id != user_id
                || !guard.availabilities.iter().any(|a| a.id == id)
            {
                return Err(StoreError::NotOwner {
                    entity: id,
                    user: user_id,
                });
            }
            let event = StoreEvent::AvailabilityRemoved { id, user_id };
            self.persist_and_apply(&mut guard, &event).await
        }
        .await;
        record("remove_availability", &result);
        result
    }

    fn check_consultant_owner(
        &self,
        cal: &UserCalendar,
        consultant_id: Ulid,
    ) -> Result<(), StoreError> {
        if cal.owns_consultant(consultant_id) {
            return Ok(());
        }
        if self.entity_to_user.contains_key(&consultant_id) {
            Err(StoreError::NotOwner {
                entity: consultant_id,
                user: cal.user_id,
            })
        } else {
            Err(StoreError::NotFound(consultant_id))
        }
    }

    /// Book `consultant_id` for `client_id`, or block out the client's own time
    /// when `consultant_id` is `None`.
    ///
    /// A consultant booking starts as `Draft` and is confirmed by the
    /// background job once its delay has passed. Time-off is confirmed at once.
    pub async fn create_booking(
        &self,
        id: Ulid,
        client_id: Ulid,
        consultant_id: Option<Ulid>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Booking, StoreError> {
        let result = self
            .create_booking_inner(id, client_id, consultant_id, start, end)
            .await;
        record("create_booking", &result);
        result
    }

    async fn create_booking_inner(
        &self,
        id: Ulid,
        client_id: Ulid,
        consultant_id: Option<Ulid>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Booking, StoreError> {
        validate_booking_range(&start, &end)?;
        let _gate = self.write_gate.read().await;

        let (owner, status, confirm_at) = match consultant_id {
            Some(cid) => {
                let owner = self.owner_of(&cid).ok_or(StoreError::NotFound(cid))?;
                (owner, BookingStatus::Draft, Some(now_ms() + self.confirm_delay))
            }
            None => (client_id, BookingStatus::Confirmed, None),
        };
        self.with_reserved_id(id, owner, async {
            let cal = self.calendar_or_create(owner);
            let mut guard = cal.write().await;
            if let Some(cid) = consultant_id
                && !guard.owns_consultant(cid)
            {
                return Err(StoreError::NotFound(cid));
            }

            let booking = Booking {
                id,
                client_id,
                consultant_id,
                start,
                end,
                status,
                confirm_at,
            };
            let event = StoreEvent::BookingCreated {
                user_id: owner,
                booking: booking.clone(),
            };
            self.persist_and_apply(&mut guard, &event).await?;
            info!(booking = %id, user = %owner, ?status, "booking created");
            Ok(booking)
        })
        .await
    }

    /// Move a booking. Only the client who made it may do so.
    pub async fn reschedule_booking(
        &self,
        user_id: Ulid,
        id: Ulid,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Booking, StoreError> {
        let result = async {
            validate_booking_range(&start, &end)?;
            let _gate = self.write_gate.read().await;
            let mut guard = self.resolve_entity_write(&id).await?;
            self.check_client(&guard, id, user_id)?;
            let event = StoreEvent::BookingRescheduled {
                id,
                user_id: guard.user_id,
                start,
                end,
            };
            self.persist_and_apply(&mut guard, &event).await?;
            guard.booking(id).cloned().ok_or(StoreError::NotFound(id))
        }
        .await;
        record("reschedule_booking", &result);
        result
    }

    /// Delete a booking and cancel its pending confirmation, if any.
    pub async fn delete_booking(&self, user_id: Ulid, id: Ulid) -> Result<(), StoreError> {
        let result = async {
            let _gate = self.write_gate.read().await;
            let mut guard = self.resolve_entity_write(&id).await?;
            self.check_client(&guard, id, user_id)?;
            let event = StoreEvent::BookingDeleted {
                id,
                user_id: guard.user_id,
            };
            self.persist_and_apply(&mut guard, &event).await
        }
        .await;
        record("delete_booking", &result);
        result
    }

    fn check_client(&self, cal: &UserCalendar, id: Ulid, user_id: Ulid) -> Result<(), StoreError> {
        let booking = cal.booking(id).ok_or(StoreError::NotFound(id))?;
        if booking.client_id != user_id {
            return Err(StoreError::NotOwner {
                entity: id,
                user: user_id,
            });
        }
        Ok(())
    }

    /// Move a draft to `Confirmed`. Returns `false` if it already was.
    pub async fn confirm_booking(&self, id: Ulid) -> Result<bool, StoreError> {
        let _gate = self.write_gate.read().await;
        let mut guard = self.resolve_entity_write(&id).await?;
        let status = guard.booking(id).ok_or(StoreError::NotFound(id))?.status;
        if status == BookingStatus::Confirmed {
            return Ok(false);
        }
        let event = StoreEvent::BookingConfirmed {
            id,
            user_id: guard.user_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        Ok(true)
    }

    /// `(booking_id, user_id)` of drafts whose confirmation deadline has passed.
    /// Calendars locked by a writer are skipped until the next sweep.
    pub fn collect_due_confirmations(&self, now: Ms) -> Vec<(Ulid, Ulid)> {
        let mut due = Vec::new();
        let mut pending = 0usize;
        for entry in self.calendars.iter() {
            let Ok(guard) = entry.value().try_read() else {
                continue;
            };
            for booking in &guard.bookings {
                if let Some(at) = booking.confirm_at {
                    pending += 1;
                    if at <= now {
                        due.push((booking.id, guard.user_id));
                    }
                }
            }
        }
        metrics::gauge!(observability::BOOKINGS_PENDING).set(pending as f64);
        due
    }

    /// Rewrite the WAL with the events that recreate the current state.
    /// Writers wait until the rewritten log is in place.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let _gate = self.write_gate.write().await;
        let calendars: Vec<_> = self.calendars.iter().map(|e| e.value().clone()).collect();
        let mut events = Vec::new();
        for cal in calendars {
            let guard = cal.read().await;
            let user_id = guard.user_id;
            events.extend(guard.consultants.iter().map(|c| StoreEvent::ConsultantCreated {
                id: c.id,
                user_id,
                skill: c.skill.clone(),
            }));
            events.extend(guard.availabilities.iter().map(|a| StoreEvent::AvailabilityAdded {
                user_id,
                availability: a.clone(),
            }));
            events.extend(guard.bookings.iter().map(|b| StoreEvent::BookingCreated {
                user_id,
                booking: b.clone(),
            }));
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
