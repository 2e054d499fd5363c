use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::StoreEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Per-user broadcast of calendar changes, so open views can refresh.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<StoreEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to changes of one user's calendar.
    pub fn subscribe(&self, user_id: Ulid) -> broadcast::Receiver<StoreEvent> {
        self.channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, user_id: Ulid, event: &StoreEvent) {
        if let Some(sender) = self.channels.get(&user_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop channels whose subscribers have all gone away.
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
        before - self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_its_users_events() {
        let hub = NotifyHub::new();
        let user = Ulid::new();
        let mut rx = hub.subscribe(user);

        let event = StoreEvent::BookingConfirmed {
            id: Ulid::new(),
            user_id: user,
        };
        hub.send(user, &event);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn other_users_events_are_not_delivered() {
        let hub = NotifyHub::new();
        let mine = Ulid::new();
        let theirs = Ulid::new();
        let mut rx = hub.subscribe(mine);
        hub.send(
            theirs,
            &StoreEvent::BookingDeleted {
                id: Ulid::new(),
                user_id: theirs,
            },
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let user = Ulid::new();
        hub.send(
            user,
            &StoreEvent::BookingDeleted {
                id: Ulid::new(),
                user_id: user,
            },
        );
    }

    #[test]
    fn prune_drops_abandoned_channels() {
        let hub = NotifyHub::new();
        let kept = hub.subscribe(Ulid::new());
        drop(hub.subscribe(Ulid::new()));
        assert_eq!(hub.prune(), 1);
        drop(kept);
        assert_eq!(hub.prune(), 1);
    }
}
