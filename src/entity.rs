//! Observed entities and their field values.
//!
//! A [`Snapshot`] is the harness's read-only copy of a remote object at one
//! instant: its identity, its kind and the current value of every field.

use std::{collections::BTreeMap, fmt};

use crate::state::{ConnectionState, NetworkType};

/// Object path naming an entity on the bus.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new [`EntityId`] from an object path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self { Self(path.into()) }

    /// Return the object path.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self { Self(value) }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Interface an entity exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A wireless device and its connection state.
    Device,
    /// A network known to a device.
    Network,
    /// An entry of a device's ordered scan results.
    OrderedNetworkEntry,
    /// A credential request issued to the agent registry.
    AgentRequest,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Device => "Device",
            Self::Network => "Network",
            Self::OrderedNetworkEntry => "OrderedNetwork",
            Self::AgentRequest => "AgentRequest",
        })
    }
}

/// Value of a single entity field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Absent value, such as an unset object reference.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// String.
    Str(String),
    /// Device connection state.
    State(ConnectionState),
    /// Network security type.
    NetworkType(NetworkType),
    /// Reference to another entity.
    Object(EntityId),
}

impl Value {
    /// Truthiness used when a field appears on its own in a condition.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::State(_) | Value::NetworkType(_) | Value::Object(_) => true,
        }
    }

    /// Loose equality: like kinds compare by value and an object reference
    /// equals a string holding the same path.
    #[must_use]
    pub fn loosely_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(id), Value::Str(s)) | (Value::Str(s), Value::Object(id)) => {
                id.as_str() == s
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write_quoted(f, s),
            Value::State(state) => write!(f, "DeviceState.{state}"),
            Value::NetworkType(ty) => write!(f, "NetworkType.{ty}"),
            Value::Object(id) => write_quoted(f, id.as_str()),
        }
    }
}

/// Write `s` as a single-quoted condition literal, escaping backslashes and quotes.
fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        if matches!(c, '\\' | '\'') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("'")
}

impl From<bool> for Value {
    fn from(value: bool) -> Self { Value::Bool(value) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Value::Int(value) }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Value::Str(value.to_owned()) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Value::Str(value) }
}

impl From<ConnectionState> for Value {
    fn from(value: ConnectionState) -> Self { Value::State(value) }
}

impl From<NetworkType> for Value {
    fn from(value: NetworkType) -> Self { Value::NetworkType(value) }
}

impl From<EntityId> for Value {
    fn from(value: EntityId) -> Self { Value::Object(value) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self { value.map_or(Value::Null, Into::into) }
}

/// Point-in-time copy of an entity's fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    id: EntityId,
    kind: EntityKind,
    fields: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Create an empty snapshot for `id`.
    #[must_use]
    pub fn new(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter used when constructing snapshots.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Identity of the entity.
    #[must_use]
    pub fn id(&self) -> &EntityId { &self.id }

    /// Interface the entity exposes.
    #[must_use]
    pub fn kind(&self) -> EntityKind { self.kind }

    /// Current value of `field`, if the entity has it.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> { self.fields.get(field) }

    /// Connection state, when the entity carries a `state` field.
    #[must_use]
    pub fn state(&self) -> Option<ConnectionState> {
        match self.fields.get("state") {
            Some(Value::State(state)) => Some(*state),
            _ => None,
        }
    }

    /// Iterate over fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set `field` to `value`, returning whether the stored value changed.
    pub(crate) fn set(&mut self, field: String, value: Value) -> bool {
        match self.fields.get(&field) {
            Some(current) if *current == value => false,
            _ => {
                self.fields.insert(field, value);
                true
            }
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {{", self.kind, self.id)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{name}: {value}")?;
        }
        f.write_str(" }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_only_real_changes() {
        let mut snap = Snapshot::new("/dev/0", EntityKind::Device).with("scanning", false);
        assert!(!snap.set("scanning".into(), Value::Bool(false)));
        assert!(snap.set("scanning".into(), Value::Bool(true)));
        assert!(snap.set("powered".into(), Value::Bool(true)));
    }

    #[test]
    fn object_reference_equals_matching_path() {
        let obj = Value::Object(EntityId::new("/net/1"));
        assert!(obj.loosely_eq(&Value::from("/net/1")));
        assert!(!obj.loosely_eq(&Value::from("/net/2")));
        assert!(!Value::Int(1).loosely_eq(&Value::Bool(true)));
    }

    #[test]
    fn display_lists_fields_in_order() {
        let snap = Snapshot::new("/dev/0", EntityKind::Device)
            .with("state", ConnectionState::Roaming)
            .with("connected_network", Option::<EntityId>::None);
        assert_eq!(
            snap.to_string(),
            "Device /dev/0 { connected_network: None, state: DeviceState.roaming }"
        );
    }

    #[test]
    fn literals_display_quoted_and_escaped() {
        assert_eq!(Value::Object(EntityId::new("/net/1")).to_string(), "'/net/1'");
        assert_eq!(Value::from(r"it's a\b").to_string(), r"'it\'s a\\b'");
    }
}
