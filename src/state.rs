//! Enumerations owned by the station under test.
//!
//! The harness only ever observes these values; the station decides when they
//! change.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Connection state reported by a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No association and no attempt in progress.
    Disconnected,
    /// An association attempt is in progress.
    Connecting,
    /// Associated and authenticated.
    Connected,
    /// Tearing down the current association.
    Disconnecting,
    /// Moving between access points of the same network.
    Roaming,
    /// Scanning for a known network to join automatically.
    Autoconnect,
}

impl ConnectionState {
    /// Every state, in declaration order.
    pub const ALL: [ConnectionState; 6] = [
        ConnectionState::Disconnected,
        ConnectionState::Connecting,
        ConnectionState::Connected,
        ConnectionState::Disconnecting,
        ConnectionState::Roaming,
        ConnectionState::Autoconnect,
    ];

    /// Lowercase name used on the bus and in conditions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Roaming => "roaming",
            Self::Autoconnect => "autoconnect",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Security type of a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetworkType {
    /// No authentication.
    Open,
    /// Pre-shared key (WPA-PSK or SAE).
    Psk,
    /// 802.1X / EAP.
    Eap,
}

impl NetworkType {
    /// Name used on the bus.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Psk => "psk",
            Self::Eap => "8021x",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Returned when a state or network type name is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{name}`")]
pub struct UnknownVariant {
    /// Enumeration being parsed.
    pub kind: &'static str,
    /// Offending name.
    pub name: String,
}

impl FromStr for ConnectionState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "DeviceState",
                name: s.to_owned(),
            })
    }
}

impl FromStr for NetworkType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "psk" => Ok(Self::Psk),
            "8021x" | "eap" => Ok(Self::Eap),
            other => Err(UnknownVariant {
                kind: "NetworkType",
                name: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("disconnected", ConnectionState::Disconnected)]
    #[case("roaming", ConnectionState::Roaming)]
    #[case("autoconnect", ConnectionState::Autoconnect)]
    fn parses_state_names(#[case] name: &str, #[case] expected: ConnectionState) {
        assert_eq!(name.parse::<ConnectionState>(), Ok(expected));
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn rejects_unknown_state() {
        let err = "associated".parse::<ConnectionState>().unwrap_err();
        assert_eq!(err.kind, "DeviceState");
        assert_eq!(err.to_string(), "unknown DeviceState `associated`");
    }

    #[test]
    fn eap_alias_maps_to_8021x() {
        assert_eq!("eap".parse::<NetworkType>(), Ok(NetworkType::Eap));
        assert_eq!(NetworkType::Eap.as_str(), "8021x");
    }
}
