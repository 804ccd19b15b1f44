//! A harness wired to a simulated station.

use std::{sync::Arc, time::Duration};

use airharness::{
    ConnectionState,
    EntityId,
    Harness,
    HarnessConfig,
    PskAgent,
    Subscription,
    TeardownError,
    TeardownReport,
    scenario::{SSID, fixture_networks},
    sim::{SimConfig, SimulatedStation},
    station::StationControl,
};
use futures::StreamExt;
use rstest::fixture;

/// Wait timeout used by [`Rig::default`].
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Harness`] with a [`SimulatedStation`] publishing into it.
pub struct Rig {
    /// The harness under test.
    pub harness: Harness,
    /// The station, seeing [`fixture_networks`].
    pub station: SimulatedStation,
}

impl Rig {
    /// Start a rig on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if the harness configuration is invalid.
    #[expect(
        clippy::expect_used,
        reason = "a rig that cannot start must abort the test immediately"
    )]
    #[must_use]
    pub fn new(harness: HarnessConfig, sim: SimConfig) -> Self {
        let harness = Harness::with_config(harness).expect("failed to start harness");
        let station = SimulatedStation::attach_to(&harness, sim, fixture_networks())
            .expect("failed to publish station");
        Self { harness, station }
    }

    /// Device entity.
    #[must_use]
    pub fn device(&self) -> &EntityId { self.station.device() }

    /// Entity of the scenario network.
    ///
    /// # Panics
    ///
    /// Panics if the station does not publish it.
    #[expect(
        clippy::expect_used,
        reason = "the scenario network is part of every rig"
    )]
    #[must_use]
    pub fn network(&self) -> EntityId {
        self.station
            .network(SSID)
            .cloned()
            .expect("scenario network missing")
    }

    /// Register a [`PskAgent`] answering `passphrase` once.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    #[expect(clippy::expect_used, reason = "fresh agent ids never collide")]
    pub fn register_psk(&self, passphrase: &str) -> Arc<PskAgent> {
        let agent = Arc::new(PskAgent::new(passphrase));
        self.harness
            .register_agent(agent.clone())
            .expect("failed to register agent");
        agent
    }

    /// Start recording the device's state notifications.
    ///
    /// # Panics
    ///
    /// Panics if the device is not published.
    #[expect(clippy::expect_used, reason = "the device is part of every rig")]
    #[must_use]
    pub fn record_states(&self) -> StateRecorder {
        let (_, subscription) = self
            .harness
            .bus()
            .subscribe(self.device())
            .expect("device missing");
        StateRecorder(subscription)
    }

    /// Drop the station and tear the harness down.
    ///
    /// # Errors
    ///
    /// See [`Harness::teardown`].
    pub async fn teardown(self) -> Result<TeardownReport, TeardownError> {
        drop(self.station);
        self.harness.teardown().await
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new(
            HarnessConfig {
                wait_timeout: TEST_TIMEOUT,
                ..HarnessConfig::default()
            },
            SimConfig::default(),
        )
    }
}

/// Rig with a short default timeout and a well-behaved station.
#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn rig() -> Rig { Rig::default() }

/// Records the device states published while it is alive.
pub struct StateRecorder(Subscription);

impl StateRecorder {
    /// Wait up to `timeout` for the next state change.
    pub async fn next_state(&mut self, timeout: Duration) -> Option<ConnectionState> {
        loop {
            let notification = tokio::time::timeout(timeout, self.0.next()).await.ok()??;
            if notification.changed.iter().any(|f| f == "state") {
                return notification.snapshot.state();
            }
        }
    }

    /// States already published, consuming the recorder.
    #[must_use]
    pub fn finish(mut self) -> Vec<ConnectionState> {
        let mut states = Vec::new();
        while let Some(notification) = self.0.try_recv() {
            if notification.changed.iter().any(|f| f == "state") {
                states.extend(notification.snapshot.state());
            }
        }
        states
    }
}
