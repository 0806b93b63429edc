use derive_more::{AsRef, Debug, Display, From, FromStr};
use serde::{Deserialize, Serialize};

/// The bus object path of a device, e.g. `/org/mconnect/device/0`.
///
/// This is the key the registry tracks devices by.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsRef, From, FromStr, Display, Debug)]
#[debug("DevicePath({})", _0)]
pub struct DevicePath(pub String);

impl DevicePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for DevicePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DevicePath {
    fn from(s: &str) -> Self {
        DevicePath(s.to_owned())
    }
}

/// An opaque capability identifier as advertised by a device, e.g. `kdeconnect.battery`.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsRef, From, FromStr, Display, Debug)]
#[debug("CapabilityName({})", _0)]
pub struct CapabilityName(pub String);

impl CapabilityName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CapabilityName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CapabilityName {
    fn from(s: &str) -> Self {
        CapabilityName(s.to_owned())
    }
}
