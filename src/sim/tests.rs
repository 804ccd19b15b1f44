//! Tests for the simulated station.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::*;
use crate::{
    agent::PskAgent,
    bus::Subscription,
};

const SSID: &str = "ssidCCMP";
const BSS_A: &str = "02:00:00:00:0a:00";
const BSS_B: &str = "02:00:00:00:0b:00";

fn networks() -> Vec<SimNetwork> {
    vec![
        SimNetwork::psk(SSID, "secret123")
            .bss(BSS_A, -2000)
            .bss(BSS_B, -4000),
        SimNetwork::open("ssidOpen").bss("02:00:00:00:0c:00", -1000),
        SimNetwork::eap("ssidEAP", "user@example.com", "hunter2")
            .bss("02:00:00:00:0d:00", -6000),
    ]
}

struct Rig {
    harness: Harness,
    station: SimulatedStation,
}

impl Rig {
    fn states(&self) -> Subscription {
        let (_, subscription) = self
            .harness
            .bus()
            .subscribe(self.station.device())
            .expect("subscribe");
        subscription
    }

    fn device_field(&self, field: &str) -> Value {
        self.harness
            .snapshot(self.station.device())
            .and_then(|s| s.get(field).cloned())
            .expect("device field")
    }
}

fn rig_with(config: SimConfig) -> Rig {
    let harness = Harness::builder().build().expect("harness");
    let station = SimulatedStation::attach_to(&harness, config, networks()).expect("station");
    Rig { harness, station }
}

#[fixture]
fn rig() -> Rig { rig_with(SimConfig::default()) }

fn drain_states(mut subscription: Subscription) -> Vec<ConnectionState> {
    let mut states = Vec::new();
    while let Some(notification) = subscription.try_recv() {
        if notification.changed.iter().any(|f| f == "state") {
            states.extend(notification.snapshot.state());
        }
    }
    states
}

#[rstest]
#[tokio::test]
async fn publishes_device_networks_and_ordered_entries(rig: Rig) {
    let bus = rig.harness.bus();
    let device = bus.snapshot(rig.station.device()).expect("device");
    assert_eq!(device.state(), Some(ConnectionState::Disconnected));
    assert_eq!(device.get("connected_network"), Some(&Value::Null));

    let network = rig.station.network(SSID).expect("network");
    assert_eq!(network.as_str(), "/net/connman/iwd/0/4/7373696443434d50_psk");
    let ordered: Vec<_> = rig
        .station
        .ordered_networks()
        .iter()
        .map(|id| bus.snapshot(id).expect("entry").get("name").cloned())
        .collect();
    assert_eq!(
        ordered,
        vec![
            Some(Value::from("ssidOpen")),
            Some(Value::from(SSID)),
            Some(Value::from("ssidEAP")),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn connect_without_agent_fails_and_returns_to_disconnected(rig: Rig) {
    let states = rig.states();
    assert_eq!(rig.station.connect(SSID).await, Err(ActionError::NoAgent));
    assert_eq!(
        drain_states(states),
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );
    assert!(!rig.station.interface_up());
}

#[rstest]
#[tokio::test]
async fn connect_and_disconnect_with_agent(rig: Rig) {
    let agent = Arc::new(PskAgent::new("secret123"));
    rig.harness.register_agent(agent.clone()).expect("register");
    let states = rig.states();

    rig.station.connect(SSID).await.expect("connect");
    let network = rig.station.network(SSID).expect("network").clone();
    assert_eq!(rig.device_field("connected_network"), Value::Object(network.clone()));
    assert_eq!(rig.device_field("connected_bss"), Value::from(BSS_A));
    assert!(rig.station.attached(BSS_A));
    assert!(rig.station.interface_up());
    assert_eq!(agent.requests().len(), 1);
    assert_eq!(agent.requests()[0].network, network);

    assert_eq!(rig.station.connect(SSID).await, Err(ActionError::Busy));

    rig.station.disconnect().await.expect("disconnect");
    assert_eq!(rig.device_field("connected_network"), Value::Null);
    assert!(!rig.station.attached(BSS_A));
    assert_eq!(
        drain_states(states),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        ]
    );
    assert_eq!(rig.station.disconnect().await, Err(ActionError::NotConnected));
}

#[rstest]
#[tokio::test]
async fn wrong_passphrase_fails(rig: Rig) {
    rig.harness
        .register_agent(Arc::new(PskAgent::new("wrong")))
        .expect("register");
    assert!(matches!(
        rig.station.connect(SSID).await,
        Err(ActionError::Failed(_))
    ));
    assert_eq!(rig.device_field("state"), Value::State(ConnectionState::Disconnected));
}

#[rstest]
#[tokio::test]
async fn agent_refusal_aborts(rig: Rig) {
    let agent = Arc::new(PskAgent::with_passphrases(std::iter::empty()));
    rig.harness.register_agent(agent).expect("register");
    assert_eq!(rig.station.connect(SSID).await, Err(ActionError::Aborted));
}

#[rstest]
#[tokio::test]
async fn eap_network_asks_for_user_credentials(rig: Rig) {
    let agent = PskAgent::with_passphrases(std::iter::empty())
        .users([("user@example.com", "hunter2")]);
    rig.harness.register_agent(Arc::new(agent)).expect("register");
    rig.station.connect("ssidEAP").await.expect("connect");
}

#[rstest]
#[tokio::test]
async fn open_network_needs_no_agent(rig: Rig) {
    rig.station
        .connect_bssid("02:00:00:00:0c:00")
        .await
        .expect("connect");
    assert!(rig.station.interface_up());
}

#[rstest]
#[tokio::test]
async fn unknown_network_and_bss_are_not_found(rig: Rig) {
    assert_eq!(
        rig.station.connect("missing").await,
        Err(ActionError::NotFound("missing".into()))
    );
    assert_eq!(
        rig.station.connect_bssid("02:ff:ff:ff:ff:ff").await,
        Err(ActionError::NotFound("02:ff:ff:ff:ff:ff".into()))
    );
    assert_eq!(rig.station.roam(BSS_B).await, Err(ActionError::NotConnected));
}

#[rstest]
#[case::direct(false, vec![ConnectionState::Roaming, ConnectionState::Connected])]
#[case::through_disconnect(true, vec![
    ConnectionState::Roaming,
    ConnectionState::Disconnected,
    ConnectionState::Connecting,
    ConnectionState::Connected,
])]
#[tokio::test]
async fn roam_publishes_state_path(#[case] fault: bool, #[case] expected: Vec<ConnectionState>) {
    let rig = rig_with(SimConfig::default().roam_through_disconnect(fault));
    rig.harness
        .register_agent(Arc::new(PskAgent::new("secret123")))
        .expect("register");
    rig.station.connect(SSID).await.expect("connect");

    let states = rig.states();
    rig.station.roam(BSS_B).await.expect("roam");
    assert_eq!(drain_states(states), expected);
    assert_eq!(rig.device_field("connected_bss"), Value::from(BSS_B));
    assert!(rig.station.attached(BSS_B));
    assert!(!rig.station.attached(BSS_A));
}

#[rstest]
#[tokio::test]
async fn roam_to_foreign_bss_is_not_found(rig: Rig) {
    rig.harness
        .register_agent(Arc::new(PskAgent::new("secret123")))
        .expect("register");
    rig.station.connect(SSID).await.expect("connect");
    assert_eq!(
        rig.station.roam("02:00:00:00:0c:00").await,
        Err(ActionError::NotFound("02:00:00:00:0c:00".into()))
    );
}

#[rstest]
#[tokio::test]
async fn scan_toggles_scanning(rig: Rig) {
    let (_, mut subscription) = rig
        .harness
        .bus()
        .subscribe(rig.station.device())
        .expect("subscribe");
    rig.station.scan().await.expect("scan");
    let scanning: Vec<_> = [subscription.try_recv(), subscription.try_recv()]
        .into_iter()
        .map(|n| n.and_then(|n| n.snapshot.get("scanning").cloned()))
        .collect();
    assert_eq!(
        scanning,
        vec![Some(Value::Bool(true)), Some(Value::Bool(false))]
    );
}

#[tokio::test(start_paused = true)]
async fn step_delay_spaces_out_notifications() {
    let rig = rig_with(SimConfig::default().step_delay(Duration::from_millis(250)));
    let started = tokio::time::Instant::now();
    rig.station.scan().await.expect("scan");
    assert!(started.elapsed() >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn abandoned_connect_returns_to_disconnected() {
    let rig = rig_with(SimConfig::default().step_delay(Duration::from_secs(1)));
    rig.harness
        .register_agent(Arc::new(PskAgent::new("secret123")))
        .expect("register");
    let states = rig.states();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(500), rig.station.connect(SSID)).await;
    assert!(abandoned.is_err(), "connect should still be in progress");
    assert_eq!(
        drain_states(states),
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );
    assert_eq!(rig.device_field("connected_network"), Value::Null);

    rig.station.connect(SSID).await.expect("connect after abandoning");
    assert_eq!(rig.device_field("state"), Value::State(ConnectionState::Connected));
}
