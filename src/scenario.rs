//! Canonical scenarios run against the simulated station.
//!
//! Each scenario starts its own [`Harness`] and [`SimulatedStation`], runs as
//! a flat sequence of register, act and resolve steps, then tears the harness
//! down and checks nothing leaked.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use crate::agent::Agent;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    Harness,
    agent::{PskAgent, RegistryError, mirrored_request},
    bus::BusError,
    condition::{Condition, ConditionError},
    config::{HarnessConfig, HarnessConfigError},
    entity::{EntityId, Snapshot, Value},
    harness::{TeardownError, TeardownReport},
    sim::{SimConfig, SimNetwork, SimulatedStation},
    state::UnknownVariant,
    station::{ActionError, StationControl},
    storage::StorageError,
    wait::{PendingWait, WaitError},
};

/// Network every scenario connects to.
pub const SSID: &str = "ssidCCMP";
/// Passphrase of [`SSID`].
pub const PASSPHRASE: &str = "secret123";
/// Strongest access point of [`SSID`].
pub const BSS_PRIMARY: &str = "02:00:00:00:01:00";
/// Second access point of [`SSID`], the roaming target.
pub const BSS_SECONDARY: &str = "02:00:00:00:02:00";
/// Network only the second agent holds a secret for.
pub const SSID_ALT: &str = "ssidTKIP";
/// Passphrase of [`SSID_ALT`].
pub const PASSPHRASE_ALT: &str = "secret456";

/// The canonical scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Connecting with no agent registered fails with `NoAgent`.
    NoAgent,
    /// A registered agent supplies the passphrase for a full connect and
    /// disconnect cycle.
    OwnAgent,
    /// With two agents only the first registered is consulted, then the
    /// second once the first is unregistered.
    FirstAgent,
    /// Roaming goes directly from `roaming` to `connected`.
    Roam,
    /// Roaming through `disconnected` is caught as a transition violation.
    RoamFault,
}

impl Scenario {
    /// Every scenario, in the order they are run.
    pub const ALL: [Scenario; 5] = [
        Scenario::NoAgent,
        Scenario::OwnAgent,
        Scenario::FirstAgent,
        Scenario::Roam,
        Scenario::RoamFault,
    ];

    /// Name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Scenario::NoAgent => "no-agent",
            Scenario::OwnAgent => "own-agent",
            Scenario::FirstAgent => "first-agent",
            Scenario::Roam => "roam",
            Scenario::RoamFault => "roam-fault",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Scenario {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "scenario",
                name: s.to_owned(),
            })
    }
}

/// Settings shared by every scenario run.
#[derive(Clone, Debug, Default)]
pub struct ScenarioConfig {
    /// Harness settings.
    pub harness: HarnessConfig,
    /// Simulator settings. The roaming fault is forced per scenario.
    pub sim: SimConfig,
}

/// A scenario that passed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Scenario run.
    pub scenario: Scenario,
    /// Wall time taken.
    pub elapsed: Duration,
    /// What teardown cleaned up.
    pub teardown: TeardownReport,
}

/// Why a scenario failed.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The harness could not be started.
    #[error("harness configuration: {0}")]
    Config(#[from] HarnessConfigError),
    /// The station could not be published.
    #[error("bus: {0}")]
    Bus(#[from] BusError),
    /// A scenario condition failed to parse or evaluate.
    #[error(transparent)]
    Condition(#[from] ConditionError),
    /// A wait failed.
    #[error(transparent)]
    Wait(#[from] WaitError),
    /// Agent registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A station action failed.
    #[error("station action failed: {0}")]
    Action(#[from] ActionError),
    /// Fixture storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Teardown found leaked resources.
    #[error("teardown: {0}")]
    Teardown(#[from] TeardownError),
    /// The system behaved differently from what the scenario asserts.
    #[error("{scenario}: {detail}")]
    Unexpected {
        /// Scenario that observed it.
        scenario: Scenario,
        /// What was observed.
        detail: String,
    },
}

fn unexpected(scenario: Scenario, detail: impl Into<String>) -> ScenarioError {
    ScenarioError::Unexpected {
        scenario,
        detail: detail.into(),
    }
}

fn condition(text: &str) -> Result<Condition, ConditionError> { text.parse() }

/// Networks the simulated station sees in every scenario.
#[must_use]
pub fn fixture_networks() -> Vec<SimNetwork> {
    vec![
        SimNetwork::psk(SSID, PASSPHRASE)
            .bss(BSS_PRIMARY, -2000)
            .bss(BSS_SECONDARY, -4000),
        SimNetwork::psk(SSID_ALT, PASSPHRASE_ALT).bss("02:00:00:00:04:00", -5000),
        SimNetwork::open("ssidOpen").bss("02:00:00:00:03:00", -6000),
    ]
}

/// Run `scenario` with `config`.
///
/// # Errors
///
/// Returns the first failure observed. Teardown runs even when the scenario
/// body fails; the body's error wins.
pub async fn run(
    scenario: Scenario,
    config: &ScenarioConfig,
) -> Result<ScenarioReport, ScenarioError> {
    let started = Instant::now();
    let harness = Harness::with_config(config.harness.clone())?;
    let sim = config
        .sim
        .clone()
        .roam_through_disconnect(scenario == Scenario::RoamFault);
    let station = SimulatedStation::attach_to(&harness, sim, fixture_networks())?;
    let storage = harness.storage().cloned();

    let outcome = match scenario {
        Scenario::NoAgent => no_agent(&harness, &station).await,
        Scenario::OwnAgent => own_agent(&harness, &station).await,
        Scenario::FirstAgent => first_agent(&harness, &station).await,
        Scenario::Roam => roam(&harness, &station).await,
        Scenario::RoamFault => roam_fault(&harness, &station).await,
    };
    drop(station);
    let teardown = harness.teardown().await;
    if let Err(e) = &outcome {
        warn!(%scenario, error = %e, "scenario failed");
    }
    outcome?;
    let teardown = teardown?;
    if let Some(storage) = storage {
        if !storage.is_empty()? {
            return Err(unexpected(scenario, "fixture storage not empty after teardown"));
        }
    }

    let elapsed = started.elapsed();
    info!(%scenario, ?elapsed, "scenario passed");
    Ok(ScenarioReport {
        scenario,
        elapsed,
        teardown,
    })
}

/// Run every scenario in order. A failure does not stop the ones after it.
pub async fn run_all(
    config: &ScenarioConfig,
) -> Vec<(Scenario, Result<ScenarioReport, ScenarioError>)> {
    let mut results = Vec::with_capacity(Scenario::ALL.len());
    for scenario in Scenario::ALL {
        results.push((scenario, run(scenario, config).await));
    }
    results
}

fn network<'a>(
    station: &'a SimulatedStation,
    scenario: Scenario,
) -> Result<&'a EntityId, ScenarioError> {
    station
        .network(SSID)
        .ok_or_else(|| unexpected(scenario, format!("network {SSID} not published")))
}

async fn connect(
    harness: &Harness,
    station: &SimulatedStation,
    ssid: &str,
) -> Result<(), ScenarioError> {
    let pending = harness.register_condition(
        station.device(),
        &condition("obj.state == DeviceState.connected")?,
    )?;
    station.connect(ssid).await?;
    pending.resolve().await?;
    Ok(())
}

async fn disconnect(harness: &Harness, station: &SimulatedStation) -> Result<(), ScenarioError> {
    let pending = harness.register_condition(
        station.device(),
        &condition("obj.state == DeviceState.disconnected")?,
    )?;
    station.disconnect().await?;
    pending.resolve().await?;
    Ok(())
}

const JOIN_PATH: [&str; 3] = ["disconnected", "connecting", "connected"];
const LEAVE_PATH: [&str; 3] = ["connected", "disconnecting", "disconnected"];

/// Register a transition wait for each consecutive pair of device states.
fn register_path(
    harness: &Harness,
    station: &SimulatedStation,
    states: &[&str],
) -> Result<Vec<PendingWait>, ScenarioError> {
    states
        .windows(2)
        .map(|pair| -> Result<PendingWait, ScenarioError> {
            let from = condition(&format!("obj.state == DeviceState.{}", pair[0]))?;
            let to = condition(&format!("obj.state == DeviceState.{}", pair[1]))?;
            Ok(harness.register_transition(station.device(), &from, &to)?)
        })
        .collect()
}

/// Resolve path waits in order, returning the final device snapshot.
async fn resolve_path(
    scenario: Scenario,
    waits: Vec<PendingWait>,
) -> Result<Snapshot, ScenarioError> {
    let mut last = None;
    for wait in waits {
        last = Some(wait.resolve().await?);
    }
    last.ok_or_else(|| unexpected(scenario, "empty state path"))
}

async fn no_agent(harness: &Harness, station: &SimulatedStation) -> Result<(), ScenarioError> {
    let scenario = Scenario::NoAgent;
    let disconnected = condition("obj.state == DeviceState.disconnected")?;
    harness
        .wait_for_condition(station.device(), &disconnected)
        .await?;

    match station.connect(SSID).await {
        Err(ActionError::NoAgent) => {}
        other => return Err(unexpected(scenario, format!("connect returned {other:?}"))),
    }
    harness
        .wait_for_condition(station.device(), &disconnected)
        .await?;

    if harness.config().mirror_agent_requests {
        harness
            .wait_for_condition(
                &mirrored_request(1),
                &condition("obj.outcome == 'no-agent' and obj.agent is None")?,
            )
            .await?;
    }
    Ok(())
}

async fn own_agent(harness: &Harness, station: &SimulatedStation) -> Result<(), ScenarioError> {
    let scenario = Scenario::OwnAgent;
    if let Some(storage) = harness.storage() {
        storage.write(
            &format!("{SSID}.psk"),
            format!("[Security]\nPassphrase={PASSPHRASE}\n"),
        )?;
    }
    let agent = Arc::new(PskAgent::new(PASSPHRASE));
    harness.register_agent(agent.clone())?;
    let network = network(station, scenario)?;

    let joining = register_path(harness, station, &JOIN_PATH)?;
    station.connect(SSID).await?;
    let device = resolve_path(scenario, joining).await?;
    if device.get("connected_network") != Some(&Value::Object(network.clone())) {
        return Err(unexpected(scenario, format!("connected to the wrong network: {device}")));
    }
    harness
        .wait_for_condition(network, &condition("obj.connected == True")?)
        .await?;
    if agent.requests().len() != 1 {
        return Err(unexpected(
            scenario,
            format!("agent consulted {} times", agent.requests().len()),
        ));
    }

    let leaving = register_path(harness, station, &LEAVE_PATH)?;
    station.disconnect().await?;
    resolve_path(scenario, leaving).await?;
    harness
        .wait_for_condition(network, &condition("not obj.connected")?)
        .await?;
    harness.unregister_agent(agent.id())?;
    if !agent.is_released() {
        return Err(unexpected(scenario, "agent not released"));
    }
    Ok(())
}

async fn first_agent(harness: &Harness, station: &SimulatedStation) -> Result<(), ScenarioError> {
    let scenario = Scenario::FirstAgent;
    let first = Arc::new(PskAgent::new(PASSPHRASE));
    let second = Arc::new(PskAgent::new(PASSPHRASE_ALT));
    harness.register_agent(first.clone())?;
    harness.register_agent(second.clone())?;

    connect(harness, station, SSID).await?;
    disconnect(harness, station).await?;
    if (first.requests().len(), second.requests().len()) != (1, 0) {
        return Err(unexpected(scenario, "the first registered agent was not the one consulted"));
    }

    harness.unregister_agent(first.id())?;
    connect(harness, station, SSID_ALT).await?;
    disconnect(harness, station).await?;
    if (first.requests().len(), second.requests().len()) != (1, 1) {
        return Err(unexpected(
            scenario,
            "the remaining agent was not consulted after unregistering the first",
        ));
    }
    harness.unregister_agent(second.id())?;
    Ok(())
}

fn roaming_transition() -> Result<(Condition, Condition), ConditionError> {
    Ok((
        condition("obj.state == DeviceState.roaming")?,
        condition("obj.state == DeviceState.connected")?,
    ))
}

async fn roam(harness: &Harness, station: &SimulatedStation) -> Result<(), ScenarioError> {
    let scenario = Scenario::Roam;
    harness.register_agent(Arc::new(PskAgent::new(PASSPHRASE)))?;
    connect(harness, station, SSID).await?;
    if !station.attached(BSS_PRIMARY) {
        return Err(unexpected(scenario, "station not attached to the primary BSS"));
    }

    let (from, to) = roaming_transition()?;
    let pending = harness.register_transition(station.device(), &from, &to)?;
    station.roam(BSS_SECONDARY).await?;
    let device = pending.resolve().await?;

    if device.get("connected_bss") != Some(&Value::from(BSS_SECONDARY)) {
        return Err(unexpected(scenario, format!("roamed to the wrong BSS: {device}")));
    }
    if !station.attached(BSS_SECONDARY) || station.attached(BSS_PRIMARY) {
        return Err(unexpected(scenario, "access points disagree about the roam"));
    }
    if !station.interface_up() {
        return Err(unexpected(scenario, "interface down after roaming"));
    }
    disconnect(harness, station).await
}

async fn roam_fault(harness: &Harness, station: &SimulatedStation) -> Result<(), ScenarioError> {
    let scenario = Scenario::RoamFault;
    harness.register_agent(Arc::new(PskAgent::new(PASSPHRASE)))?;
    connect(harness, station, SSID).await?;

    let (from, to) = roaming_transition()?;
    let pending = harness.register_transition(station.device(), &from, &to)?;
    station.roam(BSS_SECONDARY).await?;
    match pending.resolve().await {
        Err(WaitError::TransitionViolation { observed, .. }) => {
            info!(%scenario, observed = %observed, "transition violation caught");
        }
        Ok(device) => {
            return Err(unexpected(
                scenario,
                format!("roam through disconnect went unnoticed: {device}"),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    harness
        .wait_for_condition(
            station.device(),
            &condition("obj.state == DeviceState.connected")?,
        )
        .await?;
    disconnect(harness, station).await
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("no-agent", Scenario::NoAgent)]
    #[case("own-agent", Scenario::OwnAgent)]
    #[case("first-agent", Scenario::FirstAgent)]
    #[case("roam", Scenario::Roam)]
    #[case("roam-fault", Scenario::RoamFault)]
    fn names_round_trip(#[case] name: &str, #[case] scenario: Scenario) {
        assert_eq!(name.parse::<Scenario>(), Ok(scenario));
        assert_eq!(scenario.to_string(), name);
    }

    #[test]
    fn unknown_scenario_is_rejected() {
        let err = "fils".parse::<Scenario>().expect_err("unknown");
        assert_eq!(err.to_string(), "unknown scenario `fils`");
    }

    #[test]
    fn agent_secrets_only_open_their_own_network() {
        use crate::agent::{Credential, Secret};

        let networks = fixture_networks();
        let find = |ssid: &str| {
            networks
                .iter()
                .find(|n| n.ssid() == ssid)
                .expect("fixture network")
        };
        let secret = |s: &str| Credential::Passphrase(Secret::new(s));
        assert!(find(SSID).accepts(&secret(PASSPHRASE)));
        assert!(!find(SSID).accepts(&secret(PASSPHRASE_ALT)));
        assert!(find(SSID_ALT).accepts(&secret(PASSPHRASE_ALT)));
        assert!(!find(SSID_ALT).accepts(&secret(PASSPHRASE)));
    }

    fn harness_with_device() -> (Harness, SimulatedStation) {
        let harness = Harness::builder()
            .wait_timeout(Duration::from_secs(5))
            .build()
            .expect("harness");
        let station = SimulatedStation::attach_to(&harness, SimConfig::default(), [])
            .expect("station");
        (harness, station)
    }

    #[tokio::test]
    async fn state_path_resolves_along_every_step() {
        let (harness, station) = harness_with_device();
        let path = register_path(&harness, &station, &JOIN_PATH).expect("register");
        for state in ["connecting", "connected"] {
            let state: crate::state::ConnectionState = state.parse().expect("state");
            harness
                .bus()
                .update(station.device(), [("state", Value::State(state))])
                .expect("update");
        }

        let device = resolve_path(Scenario::OwnAgent, path).await.expect("path");
        assert_eq!(device.state(), Some(crate::state::ConnectionState::Connected));
    }

    #[tokio::test]
    async fn state_path_rejects_a_skipped_step() {
        let (harness, station) = harness_with_device();
        let path = register_path(&harness, &station, &JOIN_PATH).expect("register");
        harness
            .bus()
            .update(
                station.device(),
                [("state", Value::State(crate::state::ConnectionState::Connected))],
            )
            .expect("update");

        let err = resolve_path(Scenario::OwnAgent, path)
            .await
            .expect_err("connecting was skipped");
        assert!(matches!(err, ScenarioError::Wait(WaitError::TransitionViolation { .. })));
    }
}
