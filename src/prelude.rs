//! Optional convenience imports for writing scenarios.
//!
//! Prefer importing specialised APIs directly from their owning modules.
//!
//! # Examples
//!
//! ```rust,no_run
//! use airharness::prelude::*;
//!
//! async fn connected(harness: &Harness, device: &EntityId) -> Result<Snapshot> {
//!     let condition: Condition = "obj.state == DeviceState.connected".parse()?;
//!     Ok(harness.wait_for_condition(device, &condition).await?)
//! }
//! ```

pub use crate::{
    agent::{Agent, AgentId, Credential, CredentialRequest, PskAgent},
    condition::Condition,
    entity::{EntityId, Snapshot, Value},
    error::{HarnessError, Result},
    harness::Harness,
    state::ConnectionState,
    station::{ActionError, StationControl},
    wait::WaitError,
};
