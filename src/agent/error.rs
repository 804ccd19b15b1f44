//! Error types for agent registration and credential dispatch.

use thiserror::Error;

use super::AgentId;

/// Misuse of the agent registry. Always a caller error.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The agent is already registered.
    #[error("agent {0} is already registered")]
    DuplicateRegistration(AgentId),
    /// The agent is not registered.
    #[error("agent {0} is not registered")]
    UnknownAgent(AgentId),
}

/// Refusal returned by an agent's own logic.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The agent does not handle this kind of request.
    #[error("request declined")]
    Declined,
    /// The agent has no credential to offer.
    #[error("request canceled")]
    Canceled,
    /// The agent failed while resolving the credential.
    #[error("agent failed: {0}")]
    Failed(String),
}

/// Failure of a credential request.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No agent was registered when the request arrived.
    #[error("no agent registered")]
    NoAgent,
    /// The head agent refused; its answer is passed through unchanged.
    #[error("agent {agent} refused: {source}")]
    Agent {
        /// Agent that was consulted.
        agent: AgentId,
        /// The agent's answer.
        source: AgentError,
    },
    /// The agent service has shut down.
    #[error("agent service closed")]
    ServiceClosed,
}
