#![doc(html_root_url = "https://docs.rs/airharness/latest")]
//! Public API for the `airharness` library.
//!
//! This crate drives and verifies a wireless-connection manager that exposes
//! its state over a control bus. It provides condition evaluation over entity
//! snapshots, waits and strict transition assertions, an ordered
//! first-registered-wins credential agent registry, and an in-process
//! simulated station for running the canonical scenarios.

pub mod agent;
pub mod bus;
pub mod condition;
pub mod config;
pub mod entity;
pub mod error;
pub mod harness;
pub mod metrics;
pub mod prelude;
pub mod scenario;
pub mod sim;
pub mod state;
pub mod station;
pub mod storage;
pub mod wait;

pub use agent::{Agent, AgentChannel, AgentId, AgentRegistry, AgentService, PskAgent};
pub use bus::{Notification, ObjectBus, Subscription};
pub use condition::{Condition, evaluate};
pub use config::{DEFAULT_WAIT_TIMEOUT, HarnessBuilder, HarnessConfig};
pub use entity::{EntityId, EntityKind, Snapshot, Value};
pub use error::{HarnessError, Result};
pub use harness::{Harness, TeardownError, TeardownReport};
pub use metrics::{DISPATCH_TOTAL, WAITS_PENDING, WAITS_TOTAL};
pub use state::{ConnectionState, NetworkType};
pub use station::{ActionError, StationControl};
pub use wait::{PendingWait, WaitEngine, WaitError};
