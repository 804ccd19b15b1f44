//! Tests for waits and transition assertions.

use rstest::{fixture, rstest};

use super::*;
use crate::{entity::EntityKind, state::ConnectionState};

const TIMEOUT: Duration = Duration::from_secs(5);

fn device() -> EntityId { EntityId::new("/dev/0") }

#[fixture]
fn engine() -> WaitEngine {
    let bus = ObjectBus::new();
    bus.insert(
        Snapshot::new(device(), EntityKind::Device)
            .with("state", ConnectionState::Connected)
            .with("connected_bss", "02:00:00:00:00:00"),
    )
    .expect("insert device");
    WaitEngine::new(bus)
}

fn set_state(engine: &WaitEngine, state: ConnectionState) {
    engine
        .bus()
        .update(&device(), [("state", state)])
        .expect("update state");
}

fn state(s: ConnectionState) -> Condition { Condition::state_is(s) }

#[rstest]
#[tokio::test]
async fn already_true_condition_resolves_without_notifications(engine: WaitEngine) {
    let pending = engine
        .register_condition(&device(), &state(ConnectionState::Connected), TIMEOUT)
        .expect("register");
    assert!(pending.is_satisfied());
    assert_eq!(engine.bus().subscriber_count(&device()), 0);

    let snapshot = pending.resolve().await.expect("resolved");
    assert_eq!(snapshot.state(), Some(ConnectionState::Connected));
    assert!(engine.outstanding().is_empty());
}

#[rstest]
#[tokio::test]
async fn condition_resolves_on_first_satisfying_notification(engine: WaitEngine) {
    let pending = engine
        .register_condition(&device(), &state(ConnectionState::Disconnected), TIMEOUT)
        .expect("register");
    assert_eq!(engine.outstanding().len(), 1);

    set_state(&engine, ConnectionState::Disconnecting);
    set_state(&engine, ConnectionState::Disconnected);
    set_state(&engine, ConnectionState::Connecting);

    let snapshot = pending.resolve().await.expect("resolved");
    assert_eq!(snapshot.state(), Some(ConnectionState::Disconnected));
    assert_eq!(engine.bus().subscriber_count(&device()), 0);
    assert!(engine.outstanding().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn timeout_releases_subscription(engine: WaitEngine) {
    let pending = engine
        .register_condition(&device(), &state(ConnectionState::Roaming), Duration::from_secs(2))
        .expect("register");
    set_state(&engine, ConnectionState::Disconnecting);

    let started = Instant::now();
    let err = pending.resolve().await.unwrap_err();
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    match err {
        WaitError::Timeout { waited, last, .. } => {
            assert_eq!(waited, Duration::from_secs(2));
            assert_eq!(last.state(), Some(ConnectionState::Disconnecting));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(engine.bus().subscriber_count(&device()), 0);
    assert!(engine.outstanding().is_empty());

    let late = engine
        .bus()
        .update(&device(), [("state", ConnectionState::Roaming)])
        .expect("update")
        .expect("changed");
    assert_eq!(late.seq, 2, "update after timeout still applies to the entity");
    assert_eq!(engine.bus().total_subscribers(), 0);
}

#[rstest]
#[tokio::test]
async fn direct_transition_succeeds(engine: WaitEngine) {
    set_state(&engine, ConnectionState::Roaming);
    let pending = engine
        .register_transition(
            &device(),
            &state(ConnectionState::Roaming),
            &state(ConnectionState::Connected),
            TIMEOUT,
        )
        .expect("register");

    engine
        .bus()
        .update(&device(), [("connected_bss", "02:00:00:00:01:00")])
        .expect("update bss");
    set_state(&engine, ConnectionState::Connected);

    let snapshot = pending.resolve().await.expect("direct transition");
    assert_eq!(snapshot.state(), Some(ConnectionState::Connected));
}

#[rstest]
#[case::through_disconnected(ConnectionState::Disconnected)]
#[case::through_connecting(ConnectionState::Connecting)]
#[case::through_autoconnect(ConnectionState::Autoconnect)]
#[case::through_disconnecting(ConnectionState::Disconnecting)]
#[tokio::test]
async fn intermediate_state_violates_transition(
    engine: WaitEngine,
    #[case] intermediate: ConnectionState,
) {
    set_state(&engine, ConnectionState::Roaming);
    let pending = engine
        .register_transition(
            &device(),
            &state(ConnectionState::Roaming),
            &state(ConnectionState::Connected),
            TIMEOUT,
        )
        .expect("register");

    set_state(&engine, intermediate);
    set_state(&engine, ConnectionState::Connected);

    match pending.resolve().await {
        Err(WaitError::TransitionViolation {
            observed, changed, ..
        }) => {
            assert_eq!(observed.state(), Some(intermediate));
            assert_eq!(changed, vec!["state".to_owned()]);
        }
        other => panic!("expected violation, got {other:?}"),
    }
    assert_eq!(engine.bus().subscriber_count(&device()), 0);
}

#[rstest]
#[tokio::test]
async fn transition_first_waits_for_from(engine: WaitEngine) {
    let pending = engine
        .register_transition(
            &device(),
            &state(ConnectionState::Roaming),
            &state(ConnectionState::Connected),
            TIMEOUT,
        )
        .expect("register");
    assert!(!pending.is_satisfied(), "connected before roaming does not count");

    set_state(&engine, ConnectionState::Disconnected);
    set_state(&engine, ConnectionState::Roaming);
    set_state(&engine, ConnectionState::Connected);

    pending.resolve().await.expect("transition after reaching from");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn transition_times_out_while_stuck_in_from(engine: WaitEngine) {
    set_state(&engine, ConnectionState::Roaming);
    let err = engine
        .wait_for_transition(
            &device(),
            &state(ConnectionState::Roaming),
            &state(ConnectionState::Connected),
            Duration::from_millis(500),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_violation());
}

#[rstest]
fn unknown_field_fails_registration(engine: WaitEngine) {
    let err = engine
        .register_condition(&device(), &Condition::truthy("p2p_group"), TIMEOUT)
        .unwrap_err();
    assert!(matches!(err, WaitError::Condition(_)));
    assert_eq!(engine.bus().subscriber_count(&device()), 0);
    assert!(engine.outstanding().is_empty());
}

#[rstest]
fn unknown_entity_fails_registration(engine: WaitEngine) {
    let missing = EntityId::new("/dev/9");
    let err = engine
        .register_condition(&missing, &Condition::Const(true), TIMEOUT)
        .unwrap_err();
    assert_eq!(err, WaitError::UnknownEntity(missing));
}

#[rstest]
#[tokio::test]
async fn removal_fails_pending_wait(engine: WaitEngine) {
    let pending = engine
        .register_condition(&device(), &state(ConnectionState::Roaming), TIMEOUT)
        .expect("register");
    engine.bus().remove(&device()).expect("remove");
    assert_eq!(
        pending.resolve().await.unwrap_err(),
        WaitError::EntityRemoved(device())
    );
}

#[rstest]
#[tokio::test]
async fn independent_waits_do_not_interfere(engine: WaitEngine) {
    let disconnecting = engine
        .register_condition(&device(), &state(ConnectionState::Disconnecting), TIMEOUT)
        .expect("register");
    let disconnected = engine
        .register_condition(&device(), &state(ConnectionState::Disconnected), TIMEOUT)
        .expect("register");
    assert_eq!(engine.bus().subscriber_count(&device()), 2);

    set_state(&engine, ConnectionState::Disconnecting);
    disconnecting.resolve().await.expect("first wait");
    assert_eq!(engine.bus().subscriber_count(&device()), 1);
    assert_eq!(engine.outstanding().len(), 1);

    set_state(&engine, ConnectionState::Disconnected);
    disconnected.resolve().await.expect("second wait");
    assert_eq!(engine.bus().total_subscribers(), 0);
}

#[rstest]
fn dropping_pending_wait_cancels_it(engine: WaitEngine) {
    let pending = engine
        .register_condition(&device(), &state(ConnectionState::Roaming), TIMEOUT)
        .expect("register");
    let listed = engine.outstanding();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, pending.id());
    assert_eq!(listed[0].expected, "obj.state == DeviceState.roaming");

    drop(pending);
    assert!(engine.outstanding().is_empty());
    assert_eq!(engine.bus().subscriber_count(&device()), 0);
}
