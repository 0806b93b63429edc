use thiserror::Error;

use crate::DevicePath;

#[derive(Error, Debug)]
pub enum Error {
    #[error("mconnect daemon is not reachable: {0}")]
    DaemonUnavailable(String),
    #[error("Malformed payload for signal {signal}: {reason}")]
    MalformedPayload { signal: String, reason: String },
    #[error("No device is known at {0}")]
    UnknownDevice(DevicePath),
    #[error("Dbus connection error")]
    Dbus(#[from] zbus::Error),
}

impl Error {
    pub fn malformed(signal: &str, reason: impl Into<String>) -> Self {
        Error::MalformedPayload { signal: signal.to_owned(), reason: reason.into() }
    }

    pub fn is_daemon_unavailable(&self) -> bool {
        matches!(self, Error::DaemonUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
