//! Registered waits and their resolution.

use std::{sync::Arc, time::Duration};

use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::{Outstanding, WaitError};
use crate::{
    bus::{Notification, Subscription},
    condition::Condition,
    entity::{EntityId, Snapshot},
    metrics::{self, WaitOutcome},
};

/// Identifier of a registered wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaitId(pub(super) u64);

impl WaitId {
    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

/// Description of a wait that has not yet been resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutstandingWait {
    /// Wait identifier.
    pub id: WaitId,
    /// Entity being observed.
    pub entity: EntityId,
    /// Condition or transition expected.
    pub expected: String,
    /// Deadline fixed at registration.
    pub deadline: Instant,
}

/// Keeps a wait listed as outstanding until dropped.
pub(super) struct Ticket {
    registry: Arc<Outstanding>,
    wait: OutstandingWait,
}

impl Ticket {
    pub(super) fn issue(registry: Arc<Outstanding>, wait: OutstandingWait) -> Self {
        registry.insert(wait.id, wait.clone());
        metrics::inc_pending();
        Self { registry, wait }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.registry.remove(&self.wait.id);
        metrics::dec_pending();
    }
}

pub(super) enum Mode {
    Condition(Condition),
    Transition {
        from: Condition,
        to: Condition,
        from_seen: bool,
    },
}

enum Step {
    Continue,
    Done,
}

impl Mode {
    pub(super) fn condition(condition: Condition) -> Self { Mode::Condition(condition) }

    pub(super) fn transition(from: Condition, to: Condition) -> Self {
        Mode::Transition {
            from,
            to,
            from_seen: false,
        }
    }

    pub(super) fn describe(&self) -> String {
        match self {
            Mode::Condition(condition) => condition.to_string(),
            Mode::Transition { from, to, .. } => format!("{from} -> {to}"),
        }
    }

    /// Evaluate the snapshot taken at registration. Returns whether the wait
    /// is already satisfied.
    pub(super) fn check_initial(&mut self, snapshot: &Snapshot) -> Result<bool, WaitError> {
        match self {
            Mode::Condition(condition) => Ok(condition.evaluate(snapshot)?),
            Mode::Transition {
                from,
                to,
                from_seen,
            } => {
                if !from.evaluate(snapshot)? {
                    return Ok(false);
                }
                *from_seen = true;
                Ok(to.evaluate(snapshot)?)
            }
        }
    }

    fn step(&mut self, notification: &Notification) -> Result<Step, WaitError> {
        let snapshot = &notification.snapshot;
        match self {
            Mode::Condition(condition) => Ok(if condition.evaluate(snapshot)? {
                Step::Done
            } else {
                Step::Continue
            }),
            Mode::Transition {
                from,
                to,
                from_seen,
            } => {
                if !*from_seen {
                    if !from.evaluate(snapshot)? {
                        return Ok(Step::Continue);
                    }
                    *from_seen = true;
                    return Ok(if to.evaluate(snapshot)? {
                        Step::Done
                    } else {
                        Step::Continue
                    });
                }
                if to.evaluate(snapshot)? {
                    Ok(Step::Done)
                } else if from.evaluate(snapshot)? {
                    Ok(Step::Continue)
                } else {
                    Err(WaitError::TransitionViolation {
                        entity: notification.entity.clone(),
                        from: from.to_string(),
                        to: to.to_string(),
                        observed: Box::new(snapshot.clone()),
                        changed: notification.changed.clone(),
                    })
                }
            }
        }
    }
}

/// A registered wait owned by the flow that issued it.
///
/// Resolved exactly once by [`PendingWait::resolve`]. Dropping an unresolved
/// wait cancels it and releases its subscription.
pub struct PendingWait {
    ticket: Ticket,
    mode: Mode,
    timeout: Duration,
    last: Snapshot,
    subscription: Option<Subscription>,
}

impl PendingWait {
    pub(super) fn new(
        ticket: Ticket,
        mode: Mode,
        timeout: Duration,
        last: Snapshot,
        subscription: Option<Subscription>,
    ) -> Self {
        Self {
            ticket,
            mode,
            timeout,
            last,
            subscription,
        }
    }

    /// Identifier of this wait.
    #[must_use]
    pub fn id(&self) -> WaitId { self.ticket.wait.id }

    /// Entity being observed.
    #[must_use]
    pub fn entity(&self) -> &EntityId { &self.ticket.wait.entity }

    /// Whether the wait was satisfied at registration.
    #[must_use]
    pub fn is_satisfied(&self) -> bool { self.subscription.is_none() }

    /// Suspend until the wait resolves.
    ///
    /// Returns the snapshot that satisfied the wait. The subscription is
    /// released before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`], [`WaitError::TransitionViolation`],
    /// [`WaitError::EntityRemoved`] or [`WaitError::Condition`].
    pub async fn resolve(mut self) -> Result<Snapshot, WaitError> {
        let outcome = self.drive().await;
        self.subscription = None;
        let id = self.ticket.wait.id.0;
        let entity = &self.ticket.wait.entity;
        match &outcome {
            Ok(_) => {
                debug!(wait = id, entity = %entity, "wait satisfied");
                metrics::inc_waits(WaitOutcome::Satisfied);
            }
            Err(WaitError::Timeout { expected, .. }) => {
                warn!(wait = id, entity = %entity, expected = %expected, "wait timed out");
                metrics::inc_waits(WaitOutcome::Timeout);
            }
            Err(err @ WaitError::TransitionViolation { .. }) => {
                warn!(wait = id, entity = %entity, error = %err, "transition violated");
                metrics::inc_waits(WaitOutcome::Violation);
            }
            Err(err) => {
                warn!(wait = id, entity = %entity, error = %err, "wait failed");
                metrics::inc_waits(WaitOutcome::Failed);
            }
        }
        outcome
    }

    async fn drive(&mut self) -> Result<Snapshot, WaitError> {
        let Self {
            ticket,
            mode,
            timeout,
            last,
            subscription,
        } = self;
        let Some(subscription) = subscription.as_mut() else {
            return Ok(last.clone());
        };
        loop {
            match time::timeout_at(ticket.wait.deadline, subscription.recv()).await {
                Err(_) => {
                    return Err(WaitError::Timeout {
                        entity: ticket.wait.entity.clone(),
                        expected: ticket.wait.expected.clone(),
                        waited: *timeout,
                        last: Box::new(last.clone()),
                    });
                }
                Ok(None) => return Err(WaitError::EntityRemoved(ticket.wait.entity.clone())),
                Ok(Some(notification)) => {
                    let step = mode.step(&notification)?;
                    *last = notification.snapshot;
                    if let Step::Done = step {
                        return Ok(last.clone());
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for PendingWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWait")
            .field("id", &self.ticket.wait.id)
            .field("entity", &self.ticket.wait.entity)
            .field("expected", &self.ticket.wait.expected)
            .field("satisfied", &self.is_satisfied())
            .finish_non_exhaustive()
    }
}
