//! Canonical error and result types for the crate.
//!
//! Each module reports its own error type. [`HarnessError`] gathers them for
//! callers that drive several modules and only need to propagate.

use thiserror::Error;

use crate::{
    agent::{DispatchError, RegistryError},
    bus::BusError,
    condition::ConditionError,
    config::HarnessConfigError,
    harness::TeardownError,
    scenario::ScenarioError,
    station::ActionError,
    storage::StorageError,
    wait::WaitError,
};

/// Top-level error type exposed by `airharness`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Publishing into or subscribing to the bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// A condition could not be parsed or evaluated.
    #[error(transparent)]
    Condition(#[from] ConditionError),
    /// A wait failed.
    #[error(transparent)]
    Wait(#[from] WaitError),
    /// Agent registration was misused.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A credential request failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// A station action failed.
    #[error(transparent)]
    Action(#[from] ActionError),
    /// Fixture storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The harness configuration was rejected.
    #[error(transparent)]
    Config(#[from] HarnessConfigError),
    /// Teardown found leaked resources.
    #[error(transparent)]
    Teardown(#[from] TeardownError),
    /// A canonical scenario failed.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

impl HarnessError {
    /// Whether the error is a wait that ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Wait(e) | Self::Scenario(ScenarioError::Wait(e)) => e.is_timeout(),
            _ => false,
        }
    }

    /// Whether the error is a broken transition assertion.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        match self {
            Self::Wait(e) | Self::Scenario(ScenarioError::Wait(e)) => e.is_violation(),
            _ => false,
        }
    }
}

/// Result type used throughout `airharness`.
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::entity::{EntityId, EntityKind, Snapshot};

    #[test]
    fn classifies_wait_failures() {
        let timeout = WaitError::Timeout {
            entity: EntityId::new("/dev/0"),
            expected: "obj.scanning".into(),
            waited: Duration::from_secs(1),
            last: Box::new(Snapshot::new("/dev/0", EntityKind::Device)),
        };
        let err = HarnessError::from(ScenarioError::from(timeout));
        assert!(err.is_timeout());
        assert!(!err.is_violation());
        assert!(!HarnessError::from(ActionError::Busy).is_timeout());
    }
}
