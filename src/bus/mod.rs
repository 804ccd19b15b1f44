//! In-process object bus.
//!
//! [`ObjectBus`] holds the latest [`Snapshot`] of every published entity and
//! fans change notifications out to subscribers. Publishers (a transport
//! adaptor or the simulated station) call [`ObjectBus::insert`],
//! [`ObjectBus::update`] and [`ObjectBus::remove`]; observers call
//! [`ObjectBus::subscribe`].
//!
//! Each entity has its own mutex. Reading the snapshot handed to a new
//! subscriber and appending that subscriber happen under it, as does applying
//! an update and delivering its notification, so a subscriber observes every
//! change made after the snapshot it was given and none made before.
//!
//! Every subscriber owns an unbounded channel: notifications are never
//! coalesced, which transition assertions depend on.

mod error;
mod subscription;

use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
pub use error::BusError;
pub use subscription::{Notification, Subscription, SubscriptionId};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::entity::{EntityId, Snapshot, Value};

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<Notification>,
}

pub(crate) struct Slot {
    snapshot: Snapshot,
    seq: u64,
    removed: bool,
    subscribers: Vec<Subscriber>,
}

impl Slot {
    pub(crate) fn detach(&mut self, id: SubscriptionId) { self.subscribers.retain(|s| s.id != id); }
}

pub(crate) fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct BusInner {
    entities: DashMap<EntityId, Arc<Mutex<Slot>>>,
    next_subscription: AtomicU64,
}

/// Shared handle to the object bus.
///
/// Cloning is cheap; all clones observe the same entities.
#[derive(Clone, Default)]
pub struct ObjectBus(Arc<BusInner>);

impl ObjectBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn slot(&self, id: &EntityId) -> Result<Arc<Mutex<Slot>>, BusError> {
        self.0
            .entities
            .get(id)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| BusError::UnknownEntity(id.clone()))
    }

    /// Publish a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::AlreadyExists`] if an entity with the same id is
    /// already published.
    pub fn insert(&self, snapshot: Snapshot) -> Result<(), BusError> {
        match self.0.entities.entry(snapshot.id().clone()) {
            Entry::Occupied(entry) => Err(BusError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(entity = %snapshot.id(), kind = %snapshot.kind(), "entity added");
                entry.insert(Arc::new(Mutex::new(Slot {
                    snapshot,
                    seq: 0,
                    removed: false,
                    subscribers: Vec::new(),
                })));
                Ok(())
            }
        }
    }

    /// Apply field changes to an entity and notify its subscribers.
    ///
    /// Fields whose value does not change are ignored. When nothing changes no
    /// notification is emitted and `Ok(None)` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnknownEntity`] if the entity is not published.
    pub fn update<I, K, V>(
        &self,
        id: &EntityId,
        changes: I,
    ) -> Result<Option<Notification>, BusError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let slot = self.slot(id)?;
        let mut slot = lock(&slot);
        if slot.removed {
            return Err(BusError::UnknownEntity(id.clone()));
        }
        let mut changed = Vec::new();
        for (field, value) in changes {
            let field = field.into();
            if slot.snapshot.set(field.clone(), value.into()) {
                changed.push(field);
            }
        }
        if changed.is_empty() {
            return Ok(None);
        }
        slot.seq += 1;
        let notification = Notification {
            entity: id.clone(),
            seq: slot.seq,
            changed,
            snapshot: slot.snapshot.clone(),
        };
        slot.subscribers
            .retain(|sub| sub.tx.send(notification.clone()).is_ok());
        trace!(
            entity = %id,
            seq = notification.seq,
            changed = ?notification.changed,
            subscribers = slot.subscribers.len(),
            "entity updated"
        );
        Ok(Some(notification))
    }

    /// Withdraw an entity. Its subscriptions end.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnknownEntity`] if the entity is not published.
    pub fn remove(&self, id: &EntityId) -> Result<Snapshot, BusError> {
        let (_, slot) = self
            .0
            .entities
            .remove(id)
            .ok_or_else(|| BusError::UnknownEntity(id.clone()))?;
        let mut slot = lock(&slot);
        slot.removed = true;
        slot.subscribers.clear();
        debug!(entity = %id, "entity removed");
        Ok(slot.snapshot.clone())
    }

    /// Current snapshot of an entity.
    #[must_use]
    pub fn snapshot(&self, id: &EntityId) -> Option<Snapshot> {
        let slot = self.slot(id).ok()?;
        let slot = lock(&slot);
        Some(slot.snapshot.clone())
    }

    /// Whether an entity is published.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool { self.0.entities.contains_key(id) }

    /// Ids of all published entities, sorted.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.0.entities.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Subscribe to an entity's change notifications.
    ///
    /// Returns the snapshot current at the moment of subscribing together with
    /// the subscription. Every update applied after that snapshot is delivered
    /// to the subscription; none applied before it is.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::UnknownEntity`] if the entity is not published.
    pub fn subscribe(&self, id: &EntityId) -> Result<(Snapshot, Subscription), BusError> {
        let slot = self.slot(id)?;
        let weak = Arc::downgrade(&slot);
        let mut guard = lock(&slot);
        if guard.removed {
            return Err(BusError::UnknownEntity(id.clone()));
        }
        let sub_id = SubscriptionId(self.0.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        guard.subscribers.push(Subscriber { id: sub_id, tx });
        let snapshot = guard.snapshot.clone();
        drop(guard);
        trace!(entity = %id, subscription = sub_id.0, "subscribed");
        Ok((snapshot, Subscription::new(sub_id, id.clone(), weak, rx)))
    }

    /// Number of live subscriptions on an entity.
    #[must_use]
    pub fn subscriber_count(&self, id: &EntityId) -> usize {
        let Ok(slot) = self.slot(id) else {
            return 0;
        };
        let count = lock(&slot).subscribers.len();
        count
    }

    /// Number of live subscriptions across all entities.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        let slots: Vec<_> = self.0.entities.iter().map(|e| Arc::clone(e.value())).collect();
        slots.iter().map(|slot| lock(slot).subscribers.len()).sum()
    }
}

impl std::fmt::Debug for ObjectBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBus")
            .field("entities", &self.0.entities.len())
            .finish_non_exhaustive()
    }
}
