//! Fixtures and assertions for exercising `airharness` in tests.
//!
//! A [`Rig`] pairs a [`Harness`](airharness::Harness) with a
//! [`SimulatedStation`](airharness::sim::SimulatedStation) seeing the
//! canonical scenario networks.
//!
//! ```rust
//! use airharness::{Condition, ConnectionState, StationControl};
//! use airharness_testing::{Rig, wait_expect};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let rig = Rig::default();
//! let agent = rig.register_psk(airharness::scenario::PASSPHRASE);
//! rig.station.connect(airharness::scenario::SSID).await.expect("connect");
//! wait_expect!(rig.harness.wait_for_condition(
//!     rig.device(),
//!     &Condition::state_is(ConnectionState::Connected),
//! ));
//! assert_eq!(agent.requests().len(), 1);
//! # }
//! ```

pub mod fixtures;
pub mod logging;
pub mod macros;
pub mod metrics;

pub use fixtures::{Rig, StateRecorder, rig};
pub use logging::{LoggerHandle, logger};

/// Result type for tests that propagate errors with `?`.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
