//! Per-scenario facade over the bus, waits, agents and storage.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    agent::{Agent, AgentChannel, AgentId, AgentRegistry, AgentService, RegistryError},
    bus::ObjectBus,
    condition::Condition,
    config::{HarnessBuilder, HarnessConfig, HarnessConfigError},
    entity::{EntityId, Snapshot},
    storage::{FixtureStorage, StorageError},
    wait::{OutstandingWait, PendingWait, WaitEngine, WaitError},
};

/// Resources a scenario left behind.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TeardownError {
    /// Waits were still registered.
    #[error("{} wait(s) still outstanding", .0.len())]
    LeakedWaits(Vec<OutstandingWait>),
    /// Bus subscriptions were still alive.
    #[error("{0} bus subscription(s) still alive")]
    LeakedSubscriptions(usize),
    /// Fixture storage could not be cleared.
    #[error("failed to clear fixture storage: {0}")]
    Storage(#[from] StorageError),
}

/// What teardown cleaned up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Agents unregistered, in registration order.
    pub released_agents: Vec<AgentId>,
    /// Entries removed from fixture storage.
    pub cleared_fixtures: usize,
}

/// Everything one scenario needs.
///
/// Owns an [`ObjectBus`] for the station to publish into, a [`WaitEngine`]
/// observing it, an [`AgentRegistry`] answered through a running
/// [`AgentService`], and optional [`FixtureStorage`]. Finish with
/// [`Harness::teardown`] to prove nothing leaked.
pub struct Harness {
    config: HarnessConfig,
    waits: WaitEngine,
    agents: AgentRegistry,
    service: AgentService,
    storage: Option<FixtureStorage>,
}

impl Harness {
    /// Builder with default settings.
    #[must_use]
    pub fn builder() -> HarnessBuilder { HarnessBuilder::default() }

    /// Start a harness with `config` on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a validation error from [`HarnessConfig::validate`] or
    /// [`HarnessConfigError::Storage`] if storage cannot be opened.
    pub fn with_config(config: HarnessConfig) -> Result<Self, HarnessConfigError> {
        config.validate()?;
        let storage = config
            .storage_dir
            .as_ref()
            .map(|dir| FixtureStorage::open(dir.clone()))
            .transpose()?;
        let bus = ObjectBus::new();
        let agents = AgentRegistry::new();
        let mirror = config.mirror_agent_requests.then(|| bus.clone());
        let service = AgentService::spawn(agents.clone(), config.agent_queue_capacity, mirror);
        debug!(timeout = ?config.wait_timeout, "harness started");
        Ok(Self {
            config,
            waits: WaitEngine::new(bus),
            agents,
            service,
            storage,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig { &self.config }

    /// Bus the station publishes into.
    #[must_use]
    pub fn bus(&self) -> &ObjectBus { self.waits.bus() }

    /// Wait engine observing [`Harness::bus`].
    #[must_use]
    pub fn waits(&self) -> &WaitEngine { &self.waits }

    /// Registered agents.
    #[must_use]
    pub fn agents(&self) -> &AgentRegistry { &self.agents }

    /// Handle the station uses to request credentials.
    #[must_use]
    pub fn agent_channel(&self) -> AgentChannel { self.service.channel() }

    /// Fixture storage, when configured.
    #[must_use]
    pub fn storage(&self) -> Option<&FixtureStorage> { self.storage.as_ref() }

    /// Current snapshot of `entity`.
    #[must_use]
    pub fn snapshot(&self, entity: &EntityId) -> Option<Snapshot> { self.bus().snapshot(entity) }

    /// Register `agent` behind any already registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateRegistration`] for a repeated id.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) -> Result<(), RegistryError> {
        self.agents.register(agent)
    }

    /// Unregister and release the agent with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAgent`] if it is not registered.
    pub fn unregister_agent(&self, id: &AgentId) -> Result<(), RegistryError> {
        self.agents.unregister(id)
    }

    /// Register a condition wait with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`WaitEngine::register_condition`].
    pub fn register_condition(
        &self,
        entity: &EntityId,
        condition: &Condition,
    ) -> Result<PendingWait, WaitError> {
        self.waits
            .register_condition(entity, condition, self.config.wait_timeout)
    }

    /// Register a transition wait with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`WaitEngine::register_transition`].
    pub fn register_transition(
        &self,
        entity: &EntityId,
        from: &Condition,
        to: &Condition,
    ) -> Result<PendingWait, WaitError> {
        self.waits
            .register_transition(entity, from, to, self.config.wait_timeout)
    }

    /// Wait for `condition` on `entity` with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`WaitEngine::wait_for_condition`].
    pub async fn wait_for_condition(
        &self,
        entity: &EntityId,
        condition: &Condition,
    ) -> Result<Snapshot, WaitError> {
        self.wait_for_condition_within(entity, condition, self.config.wait_timeout)
            .await
    }

    /// Wait for `condition` on `entity` for at most `timeout`.
    ///
    /// # Errors
    ///
    /// See [`WaitEngine::wait_for_condition`].
    pub async fn wait_for_condition_within(
        &self,
        entity: &EntityId,
        condition: &Condition,
        timeout: Duration,
    ) -> Result<Snapshot, WaitError> {
        self.waits.wait_for_condition(entity, condition, timeout).await
    }

    /// Wait for `entity` to move directly from `from` to `to` with the default
    /// timeout.
    ///
    /// # Errors
    ///
    /// See [`WaitEngine::wait_for_transition`].
    pub async fn wait_for_transition(
        &self,
        entity: &EntityId,
        from: &Condition,
        to: &Condition,
    ) -> Result<Snapshot, WaitError> {
        self.wait_for_transition_within(entity, from, to, self.config.wait_timeout)
            .await
    }

    /// Wait for `entity` to move directly from `from` to `to` for at most
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// See [`WaitEngine::wait_for_transition`].
    pub async fn wait_for_transition_within(
        &self,
        entity: &EntityId,
        from: &Condition,
        to: &Condition,
        timeout: Duration,
    ) -> Result<Snapshot, WaitError> {
        self.waits
            .wait_for_transition(entity, from, to, timeout)
            .await
    }

    /// Release every resource and check nothing leaked.
    ///
    /// Remaining agents are unregistered and released, the agent service is
    /// stopped and fixture storage is cleared. Cleanup runs to completion
    /// before any leak is reported.
    ///
    /// # Errors
    ///
    /// Returns [`TeardownError::LeakedWaits`] if a wait is still registered,
    /// [`TeardownError::LeakedSubscriptions`] if a bus subscription is alive
    /// and [`TeardownError::Storage`] if storage cannot be cleared.
    pub async fn teardown(self) -> Result<TeardownReport, TeardownError> {
        let Self {
            waits,
            agents,
            service,
            storage,
            ..
        } = self;

        let released_agents = agents.clear();
        service.shutdown().await;
        let cleared = storage.as_ref().map(FixtureStorage::clear_all).transpose();

        let leaked = waits.outstanding();
        if !leaked.is_empty() {
            warn!(count = leaked.len(), "waits outstanding at teardown");
            return Err(TeardownError::LeakedWaits(leaked));
        }
        let subscriptions = waits.bus().total_subscribers();
        if subscriptions > 0 {
            warn!(count = subscriptions, "subscriptions alive at teardown");
            return Err(TeardownError::LeakedSubscriptions(subscriptions));
        }
        let report = TeardownReport {
            released_agents,
            cleared_fixtures: cleared?.unwrap_or(0),
        };
        debug!(
            agents = report.released_agents.len(),
            fixtures = report.cleared_fixtures,
            "harness torn down"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("agents", &self.agents)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
