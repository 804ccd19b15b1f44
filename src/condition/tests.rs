//! Tests for condition parsing and evaluation.

use rstest::{fixture, rstest};

use super::*;
use crate::{
    entity::{EntityId, EntityKind},
    state::NetworkType,
};

#[fixture]
fn device() -> Snapshot {
    Snapshot::new("/net/connman/iwd/0/4", EntityKind::Device)
        .with("state", ConnectionState::Connected)
        .with("scanning", false)
        .with("connected_network", EntityId::new("/net/connman/iwd/0/4/7373696431_psk"))
        .with("connected_bss", Option::<String>::None)
        .with("signal", -60i64)
}

#[rstest]
#[case("obj.state == DeviceState.connected", true)]
#[case("obj.state != DeviceState.connected", false)]
#[case("obj.state == DeviceState.roaming", false)]
#[case("not obj.scanning", true)]
#[case("obj.scanning", false)]
#[case("obj.connected_network is not None", true)]
#[case("obj.connected_bss is None", true)]
#[case("obj.connected_network == '/net/connman/iwd/0/4/7373696431_psk'", true)]
#[case("obj.signal == -60", true)]
#[case("obj.scanning or obj.state == DeviceState.connected", true)]
#[case("not (obj.scanning or obj.connected_bss is None)", false)]
#[case("True and not False", true)]
fn evaluates_textual_conditions(device: Snapshot, #[case] text: &str, #[case] expected: bool) {
    let condition: Condition = text.parse().expect("condition should parse");
    assert_eq!(evaluate(&device, &condition), Ok(expected), "{text}");
}

#[test]
fn parsed_and_built_conditions_match() {
    let parsed: Condition = "obj.connected_network is not None and obj.type == NetworkType.psk"
        .parse()
        .expect("condition should parse");
    let built = Condition::is_some("connected_network")
        .and(Condition::field("type").eq(NetworkType::Psk));
    assert_eq!(parsed, built);
}

#[test]
fn and_binds_tighter_than_or() {
    let parsed: Condition = "obj.a or obj.b and obj.c".parse().expect("condition should parse");
    let expected = Condition::truthy("a").or(Condition::truthy("b").and(Condition::truthy("c")));
    assert_eq!(parsed, expected);
}

#[rstest]
fn unknown_field_is_reported(device: Snapshot) {
    let err = Condition::truthy("p2p_peers").evaluate(&device).unwrap_err();
    assert_eq!(
        err,
        ConditionError::UnknownField {
            entity: device.id().clone(),
            kind: EntityKind::Device,
            field: "p2p_peers".into(),
        }
    );
}

#[rstest]
#[case("obj.state ==", 12)]
#[case("obj.state == DeviceState.associated", 25)]
#[case("obj.state = 1", 10)]
#[case("(obj.scanning", 13)]
#[case("device.state", 0)]
#[case("obj.scanning obj.powered", 13)]
#[case("obj.name == 'open", 12)]
fn reports_parse_offsets(#[case] text: &str, #[case] offset: usize) {
    match text.parse::<Condition>() {
        Err(ConditionError::Parse { offset: got, .. }) => assert_eq!(got, offset, "{text}"),
        other => panic!("expected parse error for {text}, got {other:?}"),
    }
}

#[test]
fn display_round_trips_through_parser() {
    let original = Condition::state_is(ConnectionState::Roaming)
        .or(Condition::is_none("connected_network").not());
    let reparsed: Condition = original.to_string().parse().expect("display output should parse");
    assert_eq!(reparsed, original);
}

#[rstest]
#[case::eap_network(Condition::field("type").eq(NetworkType::Eap))]
#[case::quoted_string(Condition::field("name").eq(r#"it's "quoted" \ here"#))]
#[case::state_or_string(
    Condition::state_is(ConnectionState::Connecting).and(Condition::field("name").ne("a'b"))
)]
fn literal_display_round_trips(#[case] original: Condition) {
    let reparsed: Condition = original.to_string().parse().expect("display output should parse");
    assert_eq!(reparsed, original);
}

#[rstest]
fn object_literal_display_reparses_to_equivalent_condition(device: Snapshot) {
    let path = EntityId::new("/net/connman/iwd/0/4/7373696431_psk");
    let original = Condition::field("connected_network").eq(path);
    let text = original.to_string();
    assert_eq!(text, "obj.connected_network == '/net/connman/iwd/0/4/7373696431_psk'");

    let reparsed: Condition = text.parse().expect("display output should parse");
    assert!(reparsed.evaluate(&device).expect("known field"));
    assert!(original.evaluate(&device).expect("known field"));
}

#[rstest]
#[case("obj.type == NetworkType.8021x")]
#[case("obj.type == NetworkType.eap")]
fn parses_eap_network_type_names(#[case] text: &str) {
    let network = Snapshot::new("/net/1", EntityKind::Network).with("type", NetworkType::Eap);
    let condition: Condition = text.parse().expect("valid condition");
    assert!(condition.evaluate(&network).expect("known field"), "{text}");
}

#[test]
fn parses_escaped_quotes_in_strings() {
    let condition: Condition = r"obj.name == 'it\'s'".parse().expect("valid condition");
    assert_eq!(condition, Condition::field("name").eq("it's"));
}
