//! Event-driven waits on entity state.
//!
//! [`WaitEngine`] suspends the calling task until a [`Condition`] holds on an
//! entity, or until an entity is observed moving directly from one condition
//! to another. Waits never poll: each one subscribes to the entity on the
//! [`ObjectBus`] and is resolved by the notifications it receives.
//!
//! Registration and resolution are split. [`WaitEngine::register_condition`]
//! and [`WaitEngine::register_transition`] subscribe and perform the single
//! registration-time evaluation, returning a [`PendingWait`]. Awaiting
//! [`PendingWait::resolve`] yields the outcome. Registering before triggering
//! an action guarantees that every notification the action causes is seen:
//!
//! ```
//! use std::time::Duration;
//!
//! use airharness::{
//!     bus::ObjectBus,
//!     condition::Condition,
//!     entity::{EntityKind, Snapshot},
//!     state::ConnectionState,
//!     wait::WaitEngine,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = ObjectBus::new();
//! let device = Snapshot::new("/dev/0", EntityKind::Device)
//!     .with("state", ConnectionState::Disconnected);
//! let id = device.id().clone();
//! bus.insert(device)?;
//!
//! let engine = WaitEngine::new(bus.clone());
//! let pending = engine.register_condition(
//!     &id,
//!     &Condition::state_is(ConnectionState::Connected),
//!     Duration::from_secs(5),
//! )?;
//! bus.update(&id, [("state", ConnectionState::Connecting)])?;
//! bus.update(&id, [("state", ConnectionState::Connected)])?;
//! let snapshot = pending.resolve().await?;
//! assert_eq!(snapshot.state(), Some(ConnectionState::Connected));
//! # Ok(())
//! # }
//! ```

mod error;
mod pending;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
pub use error::WaitError;
pub use pending::{OutstandingWait, PendingWait, WaitId};
use pending::{Mode, Ticket};
use tokio::time::Instant;
use tracing::debug;

use crate::{
    bus::ObjectBus,
    condition::Condition,
    entity::{EntityId, Snapshot},
};

/// Outstanding waits keyed by id.
pub(crate) type Outstanding = DashMap<WaitId, OutstandingWait>;

/// Registers and tracks waits against an [`ObjectBus`].
///
/// Cloning is cheap; clones share the set of outstanding waits.
#[derive(Clone)]
pub struct WaitEngine {
    bus: ObjectBus,
    outstanding: Arc<Outstanding>,
    next_id: Arc<AtomicU64>,
}

impl WaitEngine {
    /// Create an engine observing `bus`.
    #[must_use]
    pub fn new(bus: ObjectBus) -> Self {
        Self {
            bus,
            outstanding: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Bus this engine observes.
    #[must_use]
    pub fn bus(&self) -> &ObjectBus { &self.bus }

    /// Register a wait for `condition` to hold on `entity`.
    ///
    /// The condition is evaluated once against the snapshot taken atomically
    /// with subscribing. If it already holds the returned wait is resolved
    /// and its subscription has been released.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::UnknownEntity`] if the entity is not published
    /// and [`WaitError::Condition`] if the condition cannot be evaluated.
    pub fn register_condition(
        &self,
        entity: &EntityId,
        condition: &Condition,
        timeout: Duration,
    ) -> Result<PendingWait, WaitError> {
        self.register(entity, Mode::condition(condition.clone()), timeout)
    }

    /// Register a wait for `entity` to move directly from `from` to `to`.
    ///
    /// If `from` does not hold at registration the wait first waits for it.
    /// Once `from` has been observed, every notification must satisfy `to`
    /// (which resolves the wait) or `from` (which keeps it pending); any other
    /// notification fails the wait with [`WaitError::TransitionViolation`].
    ///
    /// # Errors
    ///
    /// As for [`WaitEngine::register_condition`].
    pub fn register_transition(
        &self,
        entity: &EntityId,
        from: &Condition,
        to: &Condition,
        timeout: Duration,
    ) -> Result<PendingWait, WaitError> {
        self.register(entity, Mode::transition(from.clone(), to.clone()), timeout)
    }

    /// Wait until `condition` holds on `entity` or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] if the deadline elapses, plus the
    /// registration errors of [`WaitEngine::register_condition`].
    pub async fn wait_for_condition(
        &self,
        entity: &EntityId,
        condition: &Condition,
        timeout: Duration,
    ) -> Result<Snapshot, WaitError> {
        self.register_condition(entity, condition, timeout)?
            .resolve()
            .await
    }

    /// Wait until `entity` moves directly from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::TransitionViolation`] if an intermediate
    /// notification satisfies neither condition and [`WaitError::Timeout`] if
    /// the deadline elapses.
    pub async fn wait_for_transition(
        &self,
        entity: &EntityId,
        from: &Condition,
        to: &Condition,
        timeout: Duration,
    ) -> Result<Snapshot, WaitError> {
        self.register_transition(entity, from, to, timeout)?
            .resolve()
            .await
    }

    /// Waits registered and not yet resolved or dropped.
    #[must_use]
    pub fn outstanding(&self) -> Vec<OutstandingWait> {
        let mut waits: Vec<_> = self.outstanding.iter().map(|e| e.value().clone()).collect();
        waits.sort_by_key(|w| w.id);
        waits
    }

    fn register(
        &self,
        entity: &EntityId,
        mut mode: Mode,
        timeout: Duration,
    ) -> Result<PendingWait, WaitError> {
        let (snapshot, subscription) = self
            .bus
            .subscribe(entity)
            .map_err(|_| WaitError::UnknownEntity(entity.clone()))?;
        let id = WaitId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = deadline_after(timeout);
        let expected = mode.describe();
        let satisfied = mode.check_initial(&snapshot)?;
        debug!(
            wait = id.0,
            entity = %entity,
            expected = %expected,
            satisfied,
            "wait registered"
        );
        let ticket = Ticket::issue(
            Arc::clone(&self.outstanding),
            OutstandingWait {
                id,
                entity: entity.clone(),
                expected,
                deadline,
            },
        );
        Ok(PendingWait::new(
            ticket,
            mode,
            timeout,
            snapshot,
            (!satisfied).then_some(subscription),
        ))
    }
}

/// Deadline `timeout` from now, saturating far in the future.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

impl std::fmt::Debug for WaitEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitEngine")
            .field("outstanding", &self.outstanding.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
