//! In-process publish/subscribe fabric fanning realtime events out to room and user
//! subscriptions.
//!
//! Delivery is best-effort: every subscription owns a bounded queue and a publish that finds
//! it full drops the event for that subscriber only. Publishing never blocks and never fails;
//! the record store stays the source of truth and clients can always re-fetch it.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{Span, debug, info_span};
use uuid::Uuid;

use crate::dto::events::RealtimeEvent;

/// Identifier of a live subscription.
pub type SubscriptionId = Uuid;

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Receiving end of a subscription.
///
/// Yields events in publication order until the subscription is removed from the bus, after
/// which already-queued events are still drained before [`Subscription::recv`] returns `None`.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    room_id: Option<Uuid>,
    user_id: Uuid,
    receiver: mpsc::Receiver<RealtimeEvent>,
}

impl Subscription {
    /// Identifier used to unsubscribe.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Room followed, if any.
    pub fn room_id(&self) -> Option<Uuid> {
        self.room_id
    }

    /// User the subscription belongs to.
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Wait for the next event; `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.receiver.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<RealtimeEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Per-publish delivery report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers the event was queued for.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
}

struct Subscriber {
    room_id: Option<Uuid>,
    user_id: Uuid,
    sender: mpsc::Sender<RealtimeEvent>,
    dropped: AtomicU64,
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriptionId, Subscriber>,
    by_room: HashMap<Uuid, HashSet<SubscriptionId>>,
    by_user: HashMap<Uuid, HashSet<SubscriptionId>>,
}

impl Registry {
    fn remove(&mut self, id: SubscriptionId) -> Option<Subscriber> {
        let subscriber = self.subscribers.remove(&id)?;
        if let Some(room_id) = subscriber.room_id {
            detach(&mut self.by_room, room_id, id);
        }
        detach(&mut self.by_user, subscriber.user_id, id);
        Some(subscriber)
    }
}

fn detach(index: &mut HashMap<Uuid, HashSet<SubscriptionId>>, key: Uuid, id: SubscriptionId) {
    if let Some(ids) = index.get_mut(&key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(&key);
        }
    }
}

/// Which index a publish fans out over.
#[derive(Clone, Copy)]
enum Target {
    Room(Uuid),
    User(Uuid),
}

struct BusInner {
    registry: RwLock<Registry>,
    capacity: usize,
    span: Span,
}

/// Cheaply cloneable handle to the shared subscriber registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus whose subscriptions queue up to `capacity` events each, logging inside
    /// `span`.
    pub fn new(capacity: usize, span: Span) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: RwLock::new(Registry::default()),
                capacity: capacity.max(1),
                span,
            }),
        }
    }

    /// Bus with a fresh `event_bus` span.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, info_span!("event_bus"))
    }

    /// Register a subscription for `user_id`, additionally bound to `room_id` when given.
    ///
    /// One user may hold any number of subscriptions at once (one per device or tab).
    pub fn subscribe(&self, room_id: Option<Uuid>, user_id: Uuid) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let id = Uuid::new_v4();

        {
            let mut registry = self.write();
            registry.subscribers.insert(
                id,
                Subscriber {
                    room_id,
                    user_id,
                    sender,
                    dropped: AtomicU64::new(0),
                },
            );
            if let Some(room_id) = room_id {
                registry.by_room.entry(room_id).or_default().insert(id);
            }
            registry.by_user.entry(user_id).or_default().insert(id);
        }

        self.inner.span.in_scope(|| {
            debug!(subscription_id = %id, ?room_id, %user_id, "subscription opened");
        });

        Subscription {
            id,
            room_id,
            user_id,
            receiver,
        }
    }

    /// Remove and close a subscription. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.write().remove(id);
        if let Some(subscriber) = &removed {
            self.inner.span.in_scope(|| {
                debug!(
                    subscription_id = %id,
                    dropped = subscriber.dropped.load(Ordering::Relaxed),
                    "subscription closed"
                );
            });
        }
        removed.is_some()
    }

    /// Queue `event` for every subscription bound to `room_id`.
    pub fn publish_to_room(&self, room_id: Uuid, event: &RealtimeEvent) -> Delivery {
        self.publish(Target::Room(room_id), event)
    }

    /// Queue `event` for every subscription held by `user_id`, whatever room it watches.
    pub fn publish_to_user(&self, user_id: Uuid, event: &RealtimeEvent) -> Delivery {
        self.publish(Target::User(user_id), event)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.read().subscribers.len()
    }

    /// Number of live subscriptions bound to `room_id`.
    pub fn room_subscriber_count(&self, room_id: Uuid) -> usize {
        self.read().by_room.get(&room_id).map_or(0, HashSet::len)
    }

    /// Events dropped so far for one subscription because its queue was full.
    pub fn dropped_for(&self, id: SubscriptionId) -> Option<u64> {
        self.read()
            .subscribers
            .get(&id)
            .map(|subscriber| subscriber.dropped.load(Ordering::Relaxed))
    }

    fn publish(&self, target: Target, event: &RealtimeEvent) -> Delivery {
        let mut delivery = Delivery::default();
        let mut closed = Vec::new();

        {
            let registry = self.read();
            let ids = match target {
                Target::Room(room_id) => registry.by_room.get(&room_id),
                Target::User(user_id) => registry.by_user.get(&user_id),
            };

            for id in ids.into_iter().flatten() {
                let Some(subscriber) = registry.subscribers.get(id) else {
                    continue;
                };
                match subscriber.sender.try_send(event.clone()) {
                    Ok(()) => delivery.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        delivery.dropped += 1;
                        subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                        self.inner.span.in_scope(|| {
                            debug!(
                                subscription_id = %id,
                                event = event.kind.as_str(),
                                "subscriber queue full; event dropped"
                            );
                        });
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        // Receivers dropped without unsubscribing are pruned lazily.
        if !closed.is_empty() {
            let mut registry = self.write();
            for id in closed {
                registry.remove(id);
            }
        }

        delivery
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dto::events::EventKind;

    fn event(n: u32) -> RealtimeEvent {
        RealtimeEvent::new(EventKind::TurnChanged, json!({ "n": n }))
    }

    #[tokio::test]
    async fn room_publish_reaches_only_that_room() {
        let bus = EventBus::with_capacity(4);
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();
        let mut in_a = bus.subscribe(Some(room_a), Uuid::new_v4());
        let mut in_b = bus.subscribe(Some(room_b), Uuid::new_v4());

        let delivery = bus.publish_to_room(room_a, &event(1));
        assert_eq!(delivery, Delivery { delivered: 1, dropped: 0 });

        assert_eq!(in_a.recv().await, Some(event(1)));
        assert_eq!(in_b.try_recv(), None);
    }

    #[tokio::test]
    async fn user_publish_reaches_every_device() {
        let bus = EventBus::with_capacity(4);
        let user = Uuid::new_v4();
        let mut phone = bus.subscribe(None, user);
        let mut laptop = bus.subscribe(Some(Uuid::new_v4()), user);

        let delivery = bus.publish_to_user(user, &event(7));
        assert_eq!(delivery.delivered, 2);
        assert_eq!(phone.recv().await, Some(event(7)));
        assert_eq!(laptop.recv().await, Some(event(7)));
    }

    #[test]
    fn full_queue_drops_for_that_subscriber_only() {
        let bus = EventBus::with_capacity(2);
        let room = Uuid::new_v4();
        let mut slow = bus.subscribe(Some(room), Uuid::new_v4());
        let mut fast = bus.subscribe(Some(room), Uuid::new_v4());

        bus.publish_to_room(room, &event(1));
        bus.publish_to_room(room, &event(2));
        assert_eq!(fast.try_recv(), Some(event(1)));
        assert_eq!(fast.try_recv(), Some(event(2)));

        let delivery = bus.publish_to_room(room, &event(3));
        assert_eq!(delivery, Delivery { delivered: 1, dropped: 1 });
        assert_eq!(bus.dropped_for(slow.id()), Some(1));

        assert_eq!(fast.try_recv(), Some(event(3)));
        assert_eq!(slow.try_recv(), Some(event(1)));
        assert_eq!(slow.try_recv(), Some(event(2)));
        assert_eq!(slow.try_recv(), None);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_closes_the_queue() {
        let bus = EventBus::with_capacity(4);
        let room = Uuid::new_v4();
        let mut subscription = bus.subscribe(Some(room), Uuid::new_v4());
        bus.publish_to_room(room, &event(1));

        assert!(bus.unsubscribe(subscription.id()));
        assert!(!bus.unsubscribe(subscription.id()));
        assert_eq!(bus.room_subscriber_count(room), 0);

        assert_eq!(subscription.recv().await, Some(event(1)));
        assert_eq!(subscription.recv().await, None);
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        let delivery = bus.publish_to_room(Uuid::new_v4(), &event(1));
        assert_eq!(delivery, Delivery::default());
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let bus = EventBus::with_capacity(4);
        let room = Uuid::new_v4();
        let subscription = bus.subscribe(Some(room), Uuid::new_v4());
        drop(subscription);

        let delivery = bus.publish_to_room(room, &event(1));
        assert_eq!(delivery.delivered, 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn concurrent_publishers_never_block() {
        let bus = EventBus::with_capacity(1);
        let room = Uuid::new_v4();
        let idle = bus.subscribe(Some(room), Uuid::new_v4());

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        bus.publish_to_room(room, &event(n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(bus.dropped_for(idle.id()), Some(799));
    }
}
