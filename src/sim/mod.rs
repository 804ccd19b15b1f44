//! In-process stand-in for the station under test.
//!
//! [`SimulatedStation`] publishes a device, its visible networks and their
//! ordered scan entries onto an [`ObjectBus`], asks for credentials through an
//! [`AgentChannel`] and implements [`StationControl`]. It models the
//! observable connection state machine only.

mod network;

use std::{
    cmp::Reverse,
    collections::BTreeSet,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
pub use network::{Bss, SimNetwork};
use tracing::{debug, warn};

use crate::{
    Harness,
    agent::{AgentChannel, CredentialRequest, DispatchError},
    bus::{BusError, ObjectBus},
    entity::{EntityId, EntityKind, Snapshot, Value},
    state::{ConnectionState, NetworkType},
    station::{ActionError, StationControl},
};

/// Object path of the simulated device.
pub const DEVICE_PATH: &str = "/net/connman/iwd/0/4";

/// Behaviour knobs for [`SimulatedStation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Pause between published steps of an action.
    pub step_delay: Duration,
    /// Roam through `disconnected` and `connecting` instead of straight back
    /// to `connected`.
    pub roam_through_disconnect: bool,
    /// Interface name published on the device.
    pub interface: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::ZERO,
            roam_through_disconnect: false,
            interface: "wlan0".to_owned(),
        }
    }
}

impl SimConfig {
    /// Set the pause between published steps.
    #[must_use]
    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Enable or disable the faulty roaming path.
    #[must_use]
    pub fn roam_through_disconnect(mut self, enabled: bool) -> Self {
        self.roam_through_disconnect = enabled;
        self
    }
}

struct Known {
    network: SimNetwork,
    path: EntityId,
}

struct Link {
    network: usize,
    bss: String,
}

/// Returns the device to `disconnected` when a connect attempt is abandoned,
/// whether it failed or its future was dropped.
struct Rollback<'a> {
    station: &'a SimulatedStation,
    armed: bool,
}

impl Rollback<'_> {
    fn disarm(mut self) { self.armed = false; }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.station.set_state(ConnectionState::Disconnected) {
                warn!(device = %self.station.device, error = %e, "failed to roll back connect");
            }
        }
    }
}

/// Simulated station publishing into an [`ObjectBus`].
pub struct SimulatedStation {
    bus: ObjectBus,
    agents: AgentChannel,
    config: SimConfig,
    device: EntityId,
    networks: Vec<Known>,
    ordered: Vec<EntityId>,
    link: tokio::sync::Mutex<Option<Link>>,
    attached: Mutex<BTreeSet<String>>,
}

impl SimulatedStation {
    /// Publish a station seeing `networks` and return its control handle.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::AlreadyExists`] if the device or one of the
    /// networks is already published.
    pub fn new(
        bus: ObjectBus,
        agents: AgentChannel,
        config: SimConfig,
        networks: impl IntoIterator<Item = SimNetwork>,
    ) -> Result<Self, BusError> {
        let device = EntityId::new(DEVICE_PATH);
        bus.insert(
            Snapshot::new(device.clone(), EntityKind::Device)
                .with("name", config.interface.as_str())
                .with("state", ConnectionState::Disconnected)
                .with("connected_network", Value::Null)
                .with("connected_bss", Value::Null)
                .with("scanning", false)
                .with("powered", true),
        )?;

        let mut known = Vec::new();
        for network in networks {
            let path = EntityId::new(format!("{DEVICE_PATH}/{}", network.path_suffix()));
            bus.insert(
                Snapshot::new(path.clone(), EntityKind::Network)
                    .with("name", network.ssid())
                    .with("type", network.kind())
                    .with("connected", false),
            )?;
            known.push(Known { network, path });
        }

        let mut by_signal: Vec<&Known> = known.iter().collect();
        by_signal.sort_by_key(|k| Reverse(k.network.best_bss().map_or(i64::MIN, |b| b.signal)));
        let mut ordered = Vec::with_capacity(by_signal.len());
        for (n, k) in by_signal.into_iter().enumerate() {
            let id = EntityId::new(format!("{DEVICE_PATH}/ordered/{n}"));
            bus.insert(
                Snapshot::new(id.clone(), EntityKind::OrderedNetworkEntry)
                    .with("name", k.network.ssid())
                    .with("type", k.network.kind())
                    .with("signal_strength", k.network.best_bss().map(|b| b.signal))
                    .with("network", k.path.clone()),
            )?;
            ordered.push(id);
        }

        debug!(device = %device, networks = known.len(), "simulated station published");
        Ok(Self {
            bus,
            agents,
            config,
            device,
            networks: known,
            ordered,
            link: tokio::sync::Mutex::new(None),
            attached: Mutex::new(BTreeSet::new()),
        })
    }

    /// Publish a station into `harness`, answering credentials through its
    /// agents.
    ///
    /// # Errors
    ///
    /// As for [`SimulatedStation::new`].
    pub fn attach_to(
        harness: &Harness,
        config: SimConfig,
        networks: impl IntoIterator<Item = SimNetwork>,
    ) -> Result<Self, BusError> {
        Self::new(harness.bus().clone(), harness.agent_channel(), config, networks)
    }

    /// Network entity for `ssid`.
    #[must_use]
    pub fn network(&self, ssid: &str) -> Option<&EntityId> {
        self.networks
            .iter()
            .find(|k| k.network.ssid() == ssid)
            .map(|k| &k.path)
    }

    /// Ordered scan entries, strongest first.
    #[must_use]
    pub fn ordered_networks(&self) -> &[EntityId] { &self.ordered }

    /// Whether the access point `bssid` sees this station attached.
    #[must_use]
    pub fn attached(&self, bssid: &str) -> bool { self.attached_set().contains(bssid) }

    /// Whether the interface is operational.
    #[must_use]
    pub fn interface_up(&self) -> bool { self.state() == Some(ConnectionState::Connected) }

    fn attached_set(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> Option<ConnectionState> {
        self.bus.snapshot(&self.device).and_then(|s| s.state())
    }

    fn begin(&self) -> Result<tokio::sync::MutexGuard<'_, Option<Link>>, ActionError> {
        self.link.try_lock().map_err(|_| ActionError::Busy)
    }

    fn publish<const N: usize>(
        &self,
        entity: &EntityId,
        changes: [(&'static str, Value); N],
    ) -> Result<(), ActionError> {
        self.bus
            .update(entity, changes)
            .map(drop)
            .map_err(|e| ActionError::Failed(e.to_string()))
    }

    fn set_state(&self, state: ConnectionState) -> Result<(), ActionError> {
        debug!(device = %self.device, %state, "station state");
        self.publish(&self.device, [("state", state.into())])
    }

    async fn step(&self) {
        if !self.config.step_delay.is_zero() {
            tokio::time::sleep(self.config.step_delay).await;
        }
    }

    async fn authenticate(&self, known: &Known) -> Result<(), ActionError> {
        let request = match known.network.kind() {
            NetworkType::Open => return Ok(()),
            NetworkType::Psk => CredentialRequest::passphrase(known.path.clone()),
            NetworkType::Eap => CredentialRequest::user_name_and_password(known.path.clone()),
        };
        let credential = self.agents.request(request).await.map_err(|e| match e {
            DispatchError::NoAgent => ActionError::NoAgent,
            _ => ActionError::Aborted,
        })?;
        if known.network.accepts(&credential) {
            Ok(())
        } else {
            Err(ActionError::Failed(format!(
                "authentication to {} rejected",
                known.network.ssid()
            )))
        }
    }

    async fn connect_to(&self, index: usize, bss: String) -> Result<(), ActionError> {
        let mut link = self.begin()?;
        if link.is_some() || self.state() != Some(ConnectionState::Disconnected) {
            return Err(ActionError::Busy);
        }
        let known = &self.networks[index];
        debug!(network = %known.path, bss = %bss, "connecting");

        self.set_state(ConnectionState::Connecting)?;
        let rollback = Rollback {
            station: self,
            armed: true,
        };
        self.step().await;
        self.authenticate(known).await?;
        self.step().await;

        self.publish(
            &self.device,
            [
                ("state", ConnectionState::Connected.into()),
                ("connected_network", known.path.clone().into()),
                ("connected_bss", bss.as_str().into()),
            ],
        )?;
        rollback.disarm();
        self.publish(&known.path, [("connected", true.into())])?;
        self.attached_set().insert(bss.clone());
        *link = Some(Link {
            network: index,
            bss,
        });
        Ok(())
    }
}

#[async_trait]
impl StationControl for SimulatedStation {
    fn device(&self) -> &EntityId { &self.device }

    async fn connect(&self, ssid: &str) -> Result<(), ActionError> {
        let (index, bss) = self
            .networks
            .iter()
            .enumerate()
            .find(|(_, k)| k.network.ssid() == ssid)
            .and_then(|(i, k)| k.network.best_bss().map(|b| (i, b.address.clone())))
            .ok_or_else(|| ActionError::NotFound(ssid.to_owned()))?;
        self.connect_to(index, bss).await
    }

    async fn connect_bssid(&self, bssid: &str) -> Result<(), ActionError> {
        let index = self
            .networks
            .iter()
            .position(|k| k.network.has_bss(bssid))
            .ok_or_else(|| ActionError::NotFound(bssid.to_owned()))?;
        self.connect_to(index, bssid.to_owned()).await
    }

    async fn disconnect(&self) -> Result<(), ActionError> {
        let mut link = self.begin()?;
        let Some(current) = link.take() else {
            return Err(ActionError::NotConnected);
        };
        let known = &self.networks[current.network];

        self.set_state(ConnectionState::Disconnecting)?;
        self.step().await;
        self.publish(
            &self.device,
            [
                ("state", ConnectionState::Disconnected.into()),
                ("connected_network", Value::Null),
                ("connected_bss", Value::Null),
            ],
        )?;
        self.publish(&known.path, [("connected", false.into())])?;
        self.attached_set().remove(&current.bss);
        Ok(())
    }

    async fn roam(&self, bssid: &str) -> Result<(), ActionError> {
        let mut link = self.begin()?;
        let Some(current) = link.as_mut() else {
            return Err(ActionError::NotConnected);
        };
        let known = &self.networks[current.network];
        if !known.network.has_bss(bssid) {
            return Err(ActionError::NotFound(bssid.to_owned()));
        }
        debug!(from = %current.bss, to = bssid, "roaming");

        self.set_state(ConnectionState::Roaming)?;
        self.step().await;
        if self.config.roam_through_disconnect {
            self.publish(
                &self.device,
                [
                    ("state", ConnectionState::Disconnected.into()),
                    ("connected_network", Value::Null),
                    ("connected_bss", Value::Null),
                ],
            )?;
            self.step().await;
            self.set_state(ConnectionState::Connecting)?;
            self.step().await;
        }
        self.publish(
            &self.device,
            [
                ("state", ConnectionState::Connected.into()),
                ("connected_network", known.path.clone().into()),
                ("connected_bss", bssid.into()),
            ],
        )?;

        let mut attached = self.attached_set();
        attached.remove(&current.bss);
        attached.insert(bssid.to_owned());
        current.bss = bssid.to_owned();
        Ok(())
    }

    async fn scan(&self) -> Result<(), ActionError> {
        let _link = self.begin()?;
        self.publish(&self.device, [("scanning", true.into())])?;
        self.step().await;
        self.publish(&self.device, [("scanning", false.into())])
    }
}

impl std::fmt::Debug for SimulatedStation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedStation")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("networks", &self.networks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
