//! Credential agents and their dispatch.
//!
//! When the station under test needs a secret it sends a
//! [`CredentialRequest`] over an [`AgentChannel`]. The [`AgentService`] task
//! answers it through the [`AgentRegistry`], which consults exactly one agent:
//! the earliest one still registered.

mod error;
mod psk;
mod registry;
mod service;

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
pub use error::{AgentError, DispatchError, RegistryError};
pub use psk::PskAgent;
pub use registry::{AgentQueue, AgentRegistry};
pub use service::{AgentChannel, AgentService, mirrored_request};

use crate::entity::EntityId;

/// Identity of an agent, an object path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(String);

impl AgentId {
    /// Create an [`AgentId`] from an object path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self { Self(path.into()) }

    /// Allocate a process-unique id under `/test/agent/`.
    #[must_use]
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(format!("/test/agent/{}", NEXT.fetch_add(1, Ordering::Relaxed)))
    }

    /// Return the object path.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Secret material. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret string.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self { Self(secret.into()) }

    /// Reveal the secret.
    #[must_use]
    pub fn expose(&self) -> &str { &self.0 }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Secret(***)") }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

/// What the station is asking for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Network passphrase.
    Passphrase,
    /// Passphrase protecting a client private key.
    PrivateKeyPassphrase,
    /// User name and password for an 802.1X network.
    UserNameAndPassword,
    /// Password, optionally for a user the station already knows.
    UserPassword {
        /// User the password is for.
        user: Option<String>,
    },
}

impl RequestKind {
    /// Name used when requests are mirrored on the bus.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Passphrase => "passphrase",
            RequestKind::PrivateKeyPassphrase => "private-key-passphrase",
            RequestKind::UserNameAndPassword => "user-name-and-password",
            RequestKind::UserPassword { .. } => "user-password",
        }
    }
}

/// A credential request for one network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Network the credential is for.
    pub network: EntityId,
    /// What is requested.
    pub kind: RequestKind,
}

impl CredentialRequest {
    /// Request the passphrase of `network`.
    #[must_use]
    pub fn passphrase(network: impl Into<EntityId>) -> Self {
        Self {
            network: network.into(),
            kind: RequestKind::Passphrase,
        }
    }

    /// Request a user name and password for `network`.
    #[must_use]
    pub fn user_name_and_password(network: impl Into<EntityId>) -> Self {
        Self {
            network: network.into(),
            kind: RequestKind::UserNameAndPassword,
        }
    }
}

/// Credential supplied by an agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    /// Network or private-key passphrase.
    Passphrase(Secret),
    /// Password for a user the station named.
    Password(Secret),
    /// User name and password.
    UserAndPassword {
        /// User name.
        user: String,
        /// Password.
        password: Secret,
    },
}

/// Why an outstanding request was withdrawn from an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The requester stopped waiting for the answer.
    UserCanceled,
    /// The agent service shut down while the request was in flight.
    Shutdown,
}

/// A test-supplied credential resolver.
///
/// At most one agent is consulted per request: the earliest registered.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Identity used for registration.
    fn id(&self) -> &AgentId;

    /// Resolve the credential for `request`.
    ///
    /// The answer is returned to the station unchanged.
    async fn resolve(&self, request: &CredentialRequest) -> Result<Credential, AgentError>;

    /// Called when the agent is unregistered.
    fn release(&self) {}

    /// Called when a request this agent is resolving is withdrawn.
    fn cancel(&self, _reason: CancelReason) {}
}
