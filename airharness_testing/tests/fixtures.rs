//! Integration coverage for the `airharness_testing` fixtures and macros.

use std::time::Duration;

use airharness::{Agent, Condition, ConnectionState, StationControl, scenario::PASSPHRASE};
use airharness_testing::{Rig, TestResult, expect_timeout, rig, wait_expect};
use rstest::rstest;

#[rstest]
#[tokio::test]
async fn rig_connects_and_tears_down_clean(rig: Rig) -> TestResult {
    let agent = rig.register_psk(PASSPHRASE);
    let recorder = rig.record_states();

    rig.station.connect(airharness::scenario::SSID).await?;
    let device = wait_expect!(rig.harness.wait_for_condition(
        rig.device(),
        &Condition::state_is(ConnectionState::Connected),
    ));
    assert_eq!(
        device.get("connected_network"),
        Some(&airharness::Value::Object(rig.network()))
    );
    assert_eq!(
        recorder.finish(),
        vec![ConnectionState::Connecting, ConnectionState::Connected]
    );

    let report = rig.teardown().await?;
    assert_eq!(report.released_agents, vec![agent.id().clone()]);
    Ok(())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn expect_timeout_returns_last_snapshot(rig: Rig) {
    let last = expect_timeout!(rig.harness.wait_for_condition_within(
        rig.device(),
        &Condition::truthy("scanning"),
        Duration::from_secs(1),
    ));
    assert_eq!(last.state(), Some(ConnectionState::Disconnected));
}

#[rstest]
#[tokio::test]
async fn recorder_reports_next_state(rig: Rig) {
    let mut recorder = rig.record_states();
    assert_eq!(
        rig.station.connect(airharness::scenario::SSID).await,
        Err(airharness::ActionError::NoAgent)
    );
    assert_eq!(
        recorder.next_state(Duration::from_secs(1)).await,
        Some(ConnectionState::Connecting)
    );
    assert_eq!(
        recorder.next_state(Duration::from_secs(1)).await,
        Some(ConnectionState::Disconnected)
    );
}
