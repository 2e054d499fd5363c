mod conflict;
mod error;
mod mutations;
mod queries;

pub use conflict::now_ms;
pub use error::StoreError;
pub use queries::CalendarSnapshot;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::wal::Wal;

pub type SharedCalendar = Arc<RwLock<UserCalendar>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: StoreEvent,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<StoreEvent>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (StoreEvent, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that queue up while one batch is being written are
/// committed together with a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so stale bytes don't leak into the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { response, .. } => {
            let _ = response.send(Err(io::Error::other("append routed to control path")));
        }
    }
}

/// Durable booking store. One calendar per user, each behind its own lock.
pub struct Store {
    pub calendars: DashMap<Ulid, SharedCalendar>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: consultant / availability / booking id → owning user.
    pub(super) entity_to_user: DashMap<Ulid, Ulid>,
    /// Delay before a draft booking is confirmed.
    pub(super) confirm_delay: Ms,
    /// Mutations hold this shared from before they lock a calendar until
    /// their event is applied. Compaction holds it exclusively, so no append
    /// can fall between its snapshot and the log swap.
    pub(super) write_gate: RwLock<()>,
}

/// Apply an event to a calendar. The caller holds its lock.
fn apply_to_calendar(cal: &mut UserCalendar, event: &StoreEvent, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        StoreEvent::ConsultantCreated { id, user_id, skill } => {
            cal.consultants.push(Consultant {
                id: *id,
                user_id: *user_id,
                skill: skill.clone(),
            });
            entity_map.insert(*id, *user_id);
        }
        StoreEvent::AvailabilityAdded {
            user_id,
            availability,
        }
        | StoreEvent::AvailabilityUpdated {
            user_id,
            availability,
        } => {
            entity_map.insert(availability.id, *user_id);
            cal.upsert_availability(availability.clone());
        }
        StoreEvent::AvailabilityRemoved { id, .. } => {
            cal.remove_availability(*id);
            entity_map.remove(id);
        }
        StoreEvent::BookingCreated { user_id, booking } => {
            entity_map.insert(booking.id, *user_id);
            cal.insert_booking(booking.clone());
        }
        StoreEvent::BookingRescheduled { id, start, end, .. } => {
            if let Some(mut booking) = cal.remove_booking(*id) {
                booking.start = *start;
                booking.end = *end;
                cal.insert_booking(booking);
            }
        }
        StoreEvent::BookingConfirmed { id, .. } => {
            if let Some(booking) = cal.booking_mut(*id) {
                booking.status = BookingStatus::Confirmed;
                booking.confirm_at = None;
            }
        }
        StoreEvent::BookingDeleted { id, .. } => {
            cal.remove_booking(*id);
            entity_map.remove(id);
        }
    }
}

impl Store {
    /// Replay the WAL at `wal_path`, drop any torn tail, and start its writer
    /// task. Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf, notify: Arc<NotifyHub>, confirm_delay: Ms) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let entity_to_user = DashMap::new();
        let mut replayed: HashMap<Ulid, UserCalendar> = HashMap::new();
        for event in &events {
            let user_id = event.user_id();
            let cal = replayed
                .entry(user_id)
                .or_insert_with(|| UserCalendar::new(user_id));
            apply_to_calendar(cal, event, &entity_to_user);
        }

        let calendars = DashMap::new();
        for (user_id, cal) in replayed {
            calendars.insert(user_id, Arc::new(RwLock::new(cal)));
        }
        metrics::gauge!(observability::CALENDARS_LOADED).set(calendars.len() as f64);
        info!(
            events = events.len(),
            calendars = calendars.len(),
            "store opened at {}",
            wal_path.display()
        );

        Ok(Self {
            calendars,
            wal_tx,
            notify,
            entity_to_user,
            confirm_delay,
            write_gate: RwLock::new(()),
        })
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &StoreEvent) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    pub fn get_calendar(&self, user_id: &Ulid) -> Option<SharedCalendar> {
        self.calendars.get(user_id).map(|e| e.value().clone())
    }

    pub(super) fn calendar_or_create(&self, user_id: Ulid) -> SharedCalendar {
        let cal = self
            .calendars
            .entry(user_id)
            .or_insert_with(|| Arc::new(RwLock::new(UserCalendar::new(user_id))))
            .value()
            .clone();
        metrics::gauge!(observability::CALENDARS_LOADED).set(self.calendars.len() as f64);
        cal
    }

    pub fn owner_of(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_user.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        cal: &mut UserCalendar,
        event: &StoreEvent,
    ) -> Result<(), StoreError> {
        self.wal_append(event).await?;
        apply_to_calendar(cal, event, &self.entity_to_user);
        self.notify.send(cal.user_id, event);
        debug!(user = %cal.user_id, "applied {event:?}");
        Ok(())
    }

    /// Lookup entity → owner, acquire the owner's calendar for writing.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<UserCalendar>, StoreError> {
        let user_id = self
            .owner_of(entity_id)
            .ok_or(StoreError::NotFound(*entity_id))?;
        let cal = self
            .get_calendar(&user_id)
            .ok_or(StoreError::NotFound(user_id))?;
        Ok(cal.write_owned().await)
    }
}
