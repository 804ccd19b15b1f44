//! Ordered agent registry.
//!
//! [`AgentQueue`] is the ordered collection itself; [`AgentRegistry`] shares
//! one behind a mutex and exposes the narrow dispatch interface used by the
//! agent service.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::{Agent, AgentId, Credential, CredentialRequest, DispatchError, RegistryError};
use crate::metrics::{self, DispatchOutcome};

/// Agents in registration order.
///
/// # Invariants
/// - no [`AgentId`] appears more than once;
/// - [`AgentQueue::push`] appends at the tail;
/// - [`AgentQueue::remove`] preserves the relative order of the remainder;
/// - the head is the earliest agent still registered.
#[derive(Default)]
pub struct AgentQueue {
    entries: Vec<Arc<dyn Agent>>,
}

impl AgentQueue {
    /// Append `agent`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateRegistration`] if an agent with the
    /// same id is present.
    pub fn push(&mut self, agent: Arc<dyn Agent>) -> Result<(), RegistryError> {
        if self.position(agent.id()).is_some() {
            return Err(RegistryError::DuplicateRegistration(agent.id().clone()));
        }
        self.entries.push(agent);
        Ok(())
    }

    /// Remove the agent with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAgent`] if it is not present.
    pub fn remove(&mut self, id: &AgentId) -> Result<Arc<dyn Agent>, RegistryError> {
        let index = self
            .position(id)
            .ok_or_else(|| RegistryError::UnknownAgent(id.clone()))?;
        Ok(self.entries.remove(index))
    }

    /// Earliest registered agent.
    #[must_use]
    pub fn head(&self) -> Option<&Arc<dyn Agent>> { self.entries.first() }

    /// Ids in dispatch priority order.
    #[must_use]
    pub fn ids(&self) -> Vec<AgentId> { self.entries.iter().map(|a| a.id().clone()).collect() }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Remove every agent, in order.
    pub fn drain(&mut self) -> Vec<Arc<dyn Agent>> { std::mem::take(&mut self.entries) }

    fn position(&self, id: &AgentId) -> Option<usize> {
        self.entries.iter().position(|a| a.id() == id)
    }
}

/// Shared, first-registered-wins agent registry.
#[derive(Clone, Default)]
pub struct AgentRegistry(Arc<Mutex<AgentQueue>>);

impl AgentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn queue(&self) -> MutexGuard<'_, AgentQueue> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `agent` behind every agent already registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateRegistration`] if it is already
    /// registered.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<(), RegistryError> {
        let id = agent.id().clone();
        self.queue().push(agent)?;
        debug!(agent = %id, "agent registered");
        Ok(())
    }

    /// Unregister the agent with `id` and release it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownAgent`] if it is not registered.
    pub fn unregister(&self, id: &AgentId) -> Result<(), RegistryError> {
        let agent = self.queue().remove(id)?;
        agent.release();
        debug!(agent = %id, "agent unregistered");
        Ok(())
    }

    /// Unregister and release every agent. Returns their ids in order.
    pub fn clear(&self) -> Vec<AgentId> {
        let agents = self.queue().drain();
        agents
            .into_iter()
            .map(|agent| {
                agent.release();
                agent.id().clone()
            })
            .collect()
    }

    /// Earliest registered agent.
    #[must_use]
    pub fn head(&self) -> Option<Arc<dyn Agent>> { self.queue().head().map(Arc::clone) }

    /// Ids in dispatch priority order.
    #[must_use]
    pub fn ids(&self) -> Vec<AgentId> { self.queue().ids() }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize { self.queue().len() }

    /// Whether no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.queue().is_empty() }

    /// Answer `request` with the head agent.
    ///
    /// No agent other than the head is consulted, whatever its answer.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoAgent`] if the registry is empty, without
    /// invoking any agent, and [`DispatchError::Agent`] carrying the head
    /// agent's refusal unchanged.
    pub async fn dispatch(&self, request: &CredentialRequest) -> Result<Credential, DispatchError> {
        let Some(agent) = self.head() else {
            return Err(no_agent(request));
        };
        consult(agent.as_ref(), request).await
    }
}

/// Record that `request` found the registry empty.
pub(super) fn no_agent(request: &CredentialRequest) -> DispatchError {
    warn!(network = %request.network, kind = request.kind.as_str(), "no agent registered");
    metrics::inc_dispatch(DispatchOutcome::NoAgent);
    DispatchError::NoAgent
}

/// Ask `agent` for the credential and record the outcome.
pub(super) async fn consult(
    agent: &dyn Agent,
    request: &CredentialRequest,
) -> Result<Credential, DispatchError> {
    debug!(
        agent = %agent.id(),
        network = %request.network,
        kind = request.kind.as_str(),
        "dispatching credential request"
    );
    match agent.resolve(request).await {
        Ok(credential) => {
            metrics::inc_dispatch(DispatchOutcome::Answered);
            Ok(credential)
        }
        Err(source) => {
            warn!(agent = %agent.id(), network = %request.network, %source, "agent refused");
            metrics::inc_dispatch(DispatchOutcome::Refused);
            Err(DispatchError::Agent {
                agent: agent.id().clone(),
                source,
            })
        }
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AgentRegistry").field(&self.ids()).finish()
    }
}
