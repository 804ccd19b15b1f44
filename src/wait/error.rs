//! Errors reported by waits.

use std::time::Duration;

use thiserror::Error;

use crate::{
    condition::ConditionError,
    entity::{EntityId, Snapshot},
};

/// Errors produced by [`super::WaitEngine`] operations.
///
/// None of these are retried by the engine; each terminates the wait that
/// raised it.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline elapsed before the condition or transition was observed.
    #[error("timed out after {waited:?} waiting for `{expected}` on {entity}; last seen {last}")]
    Timeout {
        /// Entity being observed.
        entity: EntityId,
        /// Condition or transition that was expected.
        expected: String,
        /// Timeout the wait was registered with.
        waited: Duration,
        /// Most recent snapshot observed.
        last: Box<Snapshot>,
    },
    /// A notification showed a state outside the asserted transition path.
    #[error(
        "transition `{from}` -> `{to}` on {entity} passed through {observed} (changed: {changed:?})"
    )]
    TransitionViolation {
        /// Entity being observed.
        entity: EntityId,
        /// Condition that had to keep holding until `to`.
        from: String,
        /// Condition ending the transition.
        to: String,
        /// Offending intermediate snapshot.
        observed: Box<Snapshot>,
        /// Fields changed by the offending notification.
        changed: Vec<String>,
    },
    /// The entity is not published on the bus.
    #[error("cannot wait on unknown entity {0}")]
    UnknownEntity(EntityId),
    /// The entity was removed while the wait was pending.
    #[error("entity {0} was removed while waiting")]
    EntityRemoved(EntityId),
    /// The condition could not be evaluated.
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

impl WaitError {
    /// Whether this error is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool { matches!(self, Self::Timeout { .. }) }

    /// Whether this error is a transition violation.
    #[must_use]
    pub fn is_violation(&self) -> bool { matches!(self, Self::TransitionViolation { .. }) }
}
