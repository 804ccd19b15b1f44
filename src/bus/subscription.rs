//! Subscriptions and the notifications delivered through them.

use std::{
    pin::Pin,
    sync::{Mutex, Weak},
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::trace;

use super::{Slot, lock};
use crate::entity::{EntityId, Snapshot};

/// Identifier of a subscription, unique per bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(super) u64);

impl SubscriptionId {
    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

/// A change to one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Entity that changed.
    pub entity: EntityId,
    /// Per-entity sequence number, starting at 1 for the first change.
    pub seq: u64,
    /// Names of the fields whose value changed.
    pub changed: Vec<String>,
    /// Full snapshot after the change.
    pub snapshot: Snapshot,
}

/// Live subscription to an entity.
///
/// Dropping the subscription detaches it from the entity before `drop`
/// returns; no notification is queued for it afterwards. The stream ends when
/// the entity is removed from the bus.
pub struct Subscription {
    id: SubscriptionId,
    entity: EntityId,
    slot: Weak<Mutex<Slot>>,
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Subscription {
    pub(super) fn new(
        id: SubscriptionId,
        entity: EntityId,
        slot: Weak<Mutex<Slot>>,
        rx: mpsc::UnboundedReceiver<Notification>,
    ) -> Self {
        Self {
            id,
            entity,
            slot,
            rx,
        }
    }

    /// Identifier of this subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId { self.id }

    /// Entity this subscription observes.
    #[must_use]
    pub fn entity(&self) -> &EntityId { &self.entity }

    /// Receive the next notification.
    ///
    /// Returns `None` once the entity has been removed and every queued
    /// notification has been consumed.
    pub async fn recv(&mut self) -> Option<Notification> { self.rx.recv().await }

    /// Receive a queued notification without waiting.
    pub fn try_recv(&mut self) -> Option<Notification> { self.rx.try_recv().ok() }

    /// Detach from the entity. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            lock(&slot).detach(self.id);
        }
        self.rx.close();
        trace!(entity = %self.entity, subscription = self.id.0, "unsubscribed");
    }
}

impl Stream for Subscription {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}
