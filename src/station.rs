//! Action channel into the station under test.
//!
//! Scenarios trigger behaviour through [`StationControl`] and observe the
//! consequences on the object bus. Results are surfaced as the station
//! reports them; nothing here retries.

use async_trait::async_trait;
use thiserror::Error;

use crate::entity::EntityId;

/// Failure reported by the station for a requested action.
///
/// Variants mirror the error names the daemon returns over its control bus.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// A credential was needed and no agent was registered.
    #[error("no agent registered to supply credentials")]
    NoAgent,
    /// The operation was attempted and failed.
    #[error("operation failed: {0}")]
    Failed(String),
    /// The operation was aborted, for example by an agent refusing.
    #[error("operation aborted")]
    Aborted,
    /// The named network or BSS does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The station is not connected.
    #[error("not connected")]
    NotConnected,
    /// Another operation is in progress or the station is in the wrong state.
    #[error("busy")]
    Busy,
    /// The station does not support the operation.
    #[error("not supported")]
    NotSupported,
}

impl ActionError {
    /// Short name of the error as reported by the daemon.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ActionError::NoAgent => "NoAgent",
            ActionError::Failed(_) => "Failed",
            ActionError::Aborted => "Aborted",
            ActionError::NotFound(_) => "NotFound",
            ActionError::NotConnected => "NotConnected",
            ActionError::Busy => "Busy",
            ActionError::NotSupported => "NotSupported",
        }
    }
}

/// Actions a scenario can ask the station to perform.
#[async_trait]
pub trait StationControl: Send + Sync {
    /// Device entity published for this station.
    fn device(&self) -> &EntityId;

    /// Connect to the network named `ssid`.
    async fn connect(&self, ssid: &str) -> Result<(), ActionError>;

    /// Connect through the BSS `bssid`.
    async fn connect_bssid(&self, bssid: &str) -> Result<(), ActionError>;

    /// Disconnect from the current network.
    async fn disconnect(&self) -> Result<(), ActionError>;

    /// Roam to `bssid` within the current network.
    async fn roam(&self, bssid: &str) -> Result<(), ActionError>;

    /// Run a scan.
    async fn scan(&self) -> Result<(), ActionError>;
}
