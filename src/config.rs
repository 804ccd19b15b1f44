//! Harness configuration.
//!
//! [`HarnessConfig`] holds the knobs a scenario run can tune. Build one with
//! [`HarnessBuilder`], which validates the values before a [`Harness`] is
//! started.
//!
//! [`Harness`]: crate::Harness

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::{Harness, storage::StorageError};

/// Timeout applied to waits when the caller does not give one.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(50);

/// Default number of credential requests queued for the agent service.
pub const DEFAULT_AGENT_QUEUE_CAPACITY: usize = 16;

/// Errors produced when validating a [`HarnessConfig`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HarnessConfigError {
    /// The default wait timeout was zero.
    #[error("default wait timeout must be greater than zero")]
    ZeroTimeout,
    /// The agent request queue capacity was zero.
    #[error("invalid agent queue capacity {0}; must be >= 1")]
    InvalidCapacity(usize),
    /// The storage directory could not be prepared.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Settings for a [`Harness`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Timeout for waits that do not specify one.
    pub wait_timeout: Duration,
    /// Capacity of the credential request queue.
    pub agent_queue_capacity: usize,
    /// Publish each credential request as an `AgentRequest` entity.
    pub mirror_agent_requests: bool,
    /// Fixture storage directory, cleared at teardown.
    pub storage_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            agent_queue_capacity: DEFAULT_AGENT_QUEUE_CAPACITY,
            mirror_agent_requests: false,
            storage_dir: None,
        }
    }
}

impl HarnessConfig {
    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessConfigError::ZeroTimeout`] or
    /// [`HarnessConfigError::InvalidCapacity`] for out-of-range values.
    pub fn validate(&self) -> Result<(), HarnessConfigError> {
        if self.wait_timeout.is_zero() {
            return Err(HarnessConfigError::ZeroTimeout);
        }
        if self.agent_queue_capacity == 0 {
            return Err(HarnessConfigError::InvalidCapacity(self.agent_queue_capacity));
        }
        Ok(())
    }
}

/// Builder for [`Harness`].
///
/// ```
/// use std::time::Duration;
///
/// use airharness::HarnessBuilder;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let harness = HarnessBuilder::default()
///     .wait_timeout(Duration::from_secs(5))
///     .mirror_agent_requests(true)
///     .build()
///     .expect("failed to build Harness");
/// assert_eq!(harness.config().wait_timeout, Duration::from_secs(5));
/// harness.teardown().await.expect("clean teardown");
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct HarnessBuilder {
    config: HarnessConfig,
}

impl HarnessBuilder {
    /// Set the default wait timeout.
    #[must_use]
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.wait_timeout = timeout;
        self
    }

    /// Set the credential request queue capacity.
    #[must_use]
    pub fn agent_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.agent_queue_capacity = capacity;
        self
    }

    /// Mirror credential requests onto the bus.
    #[must_use]
    pub fn mirror_agent_requests(mut self, mirror: bool) -> Self {
        self.config.mirror_agent_requests = mirror;
        self
    }

    /// Use `dir` as fixture storage.
    #[must_use]
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = Some(dir.into());
        self
    }

    /// Validated configuration without starting a harness.
    ///
    /// # Errors
    ///
    /// See [`HarnessConfig::validate`].
    pub fn config(self) -> Result<HarnessConfig, HarnessConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Start a [`Harness`] on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or [`HarnessConfigError::Storage`] if the
    /// storage directory cannot be created.
    pub fn build(self) -> Result<Harness, HarnessConfigError> { Harness::with_config(self.config) }
}

impl From<HarnessConfig> for HarnessBuilder {
    fn from(config: HarnessConfig) -> Self { Self { config } }
}
