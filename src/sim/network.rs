//! Networks the simulated station can see.

use std::fmt::Write as _;

use crate::{agent::Credential, state::NetworkType};

/// A network advertised to the simulated station.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimNetwork {
    ssid: String,
    kind: NetworkType,
    passphrase: Option<String>,
    users: Vec<(String, String)>,
    bsses: Vec<Bss>,
}

/// One access point of a [`SimNetwork`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bss {
    /// Hardware address, `aa:bb:cc:dd:ee:ff`.
    pub address: String,
    /// Signal strength in hundredths of dBm.
    pub signal: i64,
}

impl SimNetwork {
    fn new(ssid: &str, kind: NetworkType) -> Self {
        Self {
            ssid: ssid.to_owned(),
            kind,
            passphrase: None,
            users: Vec::new(),
            bsses: Vec::new(),
        }
    }

    /// Open network.
    #[must_use]
    pub fn open(ssid: &str) -> Self { Self::new(ssid, NetworkType::Open) }

    /// WPA-PSK network protected by `passphrase`.
    #[must_use]
    pub fn psk(ssid: &str, passphrase: &str) -> Self {
        Self {
            passphrase: Some(passphrase.to_owned()),
            ..Self::new(ssid, NetworkType::Psk)
        }
    }

    /// 802.1X network accepting `user` with `password`.
    #[must_use]
    pub fn eap(ssid: &str, user: &str, password: &str) -> Self {
        Self {
            users: vec![(user.to_owned(), password.to_owned())],
            ..Self::new(ssid, NetworkType::Eap)
        }
    }

    /// Add an access point.
    #[must_use]
    pub fn bss(mut self, address: &str, signal: i64) -> Self {
        self.bsses.push(Bss {
            address: address.to_owned(),
            signal,
        });
        self
    }

    /// Network name.
    #[must_use]
    pub fn ssid(&self) -> &str { &self.ssid }

    /// Security type.
    #[must_use]
    pub fn kind(&self) -> NetworkType { self.kind }

    /// Access points, in the order added.
    #[must_use]
    pub fn bsses(&self) -> &[Bss] { &self.bsses }

    /// Strongest access point.
    #[must_use]
    pub fn best_bss(&self) -> Option<&Bss> { self.bsses.iter().max_by_key(|b| b.signal) }

    /// Whether `address` is one of this network's access points.
    #[must_use]
    pub fn has_bss(&self, address: &str) -> bool { self.bsses.iter().any(|b| b.address == address) }

    /// Whether `credential` authenticates against this network.
    #[must_use]
    pub fn accepts(&self, credential: &Credential) -> bool {
        match (self.kind, credential) {
            (NetworkType::Psk, Credential::Passphrase(secret)) => {
                self.passphrase.as_deref() == Some(secret.expose())
            }
            (NetworkType::Eap, Credential::UserAndPassword { user, password }) => self
                .users
                .iter()
                .any(|(u, p)| u == user && p == password.expose()),
            _ => false,
        }
    }

    /// Object path suffix: the hex-encoded SSID and the security type.
    #[must_use]
    pub fn path_suffix(&self) -> String {
        let mut suffix = String::with_capacity(self.ssid.len() * 2 + 6);
        for byte in self.ssid.bytes() {
            let _ = write!(suffix, "{byte:02x}");
        }
        suffix.push('_');
        suffix.push_str(self.kind.as_str());
        suffix
    }
}
