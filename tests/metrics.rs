#![cfg(feature = "metrics")]
//! Tests for `airharness` metrics.
//!
//! These run whole waits and credential dispatches on a current-thread
//! runtime inside `metrics::with_local_recorder`, so every task records into
//! the same `metrics_util::debugging::DebuggingRecorder`.

use std::{future::Future, time::Duration};

use airharness::{
    Condition,
    ConnectionState,
    DISPATCH_TOTAL,
    StationControl,
    WAITS_PENDING,
    WAITS_TOTAL,
    scenario::{PASSPHRASE, SSID},
};
use airharness_testing::{
    Rig,
    metrics::{Recorded, debugging_recorder_setup},
};

/// Run `body` to completion with a local debugging recorder installed.
fn record<F, Fut>(body: F) -> Recorded
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("failed to build runtime")
            .block_on(body());
    });
    Recorded::take(&snapshotter)
}

#[test]
fn satisfied_wait_is_counted() {
    let recorded = record(|| async {
        let rig = Rig::default();
        rig.register_psk(PASSPHRASE);
        let pending = rig
            .harness
            .register_condition(rig.device(), &Condition::state_is(ConnectionState::Connected))
            .expect("register");
        rig.station.connect(SSID).await.expect("connect");
        pending.resolve().await.expect("connected");
        rig.teardown().await.expect("clean teardown");
    });

    assert_eq!(recorded.counter(WAITS_TOTAL, ("outcome", "satisfied")), 1);
    assert_eq!(recorded.counter(DISPATCH_TOTAL, ("outcome", "answered")), 1);
    assert_eq!(recorded.gauge(WAITS_PENDING), Some(0.0));
}

#[test]
fn timeout_and_no_agent_are_counted() {
    let recorded = record(|| async {
        let rig = Rig::default();
        let connected = Condition::state_is(ConnectionState::Connected);
        assert!(rig.station.connect(SSID).await.is_err());
        let err = rig
            .harness
            .wait_for_condition_within(rig.device(), &connected, Duration::from_secs(1))
            .await
            .expect_err("never connects");
        assert!(err.is_timeout());
        rig.teardown().await.expect("clean teardown");
    });

    assert_eq!(recorded.counter(WAITS_TOTAL, ("outcome", "timeout")), 1);
    assert_eq!(recorded.counter(WAITS_TOTAL, ("outcome", "satisfied")), 0);
    assert_eq!(recorded.counter(DISPATCH_TOTAL, ("outcome", "no_agent")), 1);
}

#[test]
fn transition_violation_is_counted() {
    let recorded = record(|| async {
        let rig = Rig::new(
            airharness::HarnessConfig {
                wait_timeout: Duration::from_secs(5),
                ..airharness::HarnessConfig::default()
            },
            airharness::sim::SimConfig::default().roam_through_disconnect(true),
        );
        rig.register_psk(PASSPHRASE);
        rig.station.connect(SSID).await.expect("connect");

        let pending = rig
            .harness
            .register_transition(
                rig.device(),
                &Condition::state_is(ConnectionState::Roaming),
                &Condition::state_is(ConnectionState::Connected),
            )
            .expect("register");
        rig.station
            .roam(airharness::scenario::BSS_SECONDARY)
            .await
            .expect("roam");
        assert!(pending.resolve().await.expect_err("violation").is_violation());
        rig.teardown().await.expect("clean teardown");
    });

    assert_eq!(recorded.counter(WAITS_TOTAL, ("outcome", "violation")), 1);
}
