use futures::{future::BoxFuture, stream::BoxStream};

use crate::*;

/// A single decoded argument of a bus signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    U32(u32),
    Bool(bool),
    Str(String),
    /// Any argument type the client has no use for, carried as its type signature.
    Other(String),
}

/// A signal received from a remote object, with its arguments decoded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub interface: String,
    pub member: String,
    pub args: Vec<Arg>,
}

impl Signal {
    pub fn new(interface: &str, member: &str, args: Vec<Arg>) -> Self {
        Self { interface: interface.to_owned(), member: member.to_owned(), args }
    }
}

/// Stream of signals for one subscription. Dropping it releases the subscription.
pub type SignalStream = BoxStream<'static, Signal>;

/// Access to the daemon's remote objects.
///
/// Everything the registry, devices and plugins know about the daemon goes through this trait, so
/// that the same logic runs against the real bus ([`DbusTransport`]) and against in-memory fakes.
///
/// Failures of an individual call are reported as [`Error::DaemonUnavailable`] and only affect
/// that call.
pub trait Transport: Send + Sync + 'static {
    /// Ask the manager for the object paths of all devices it currently knows about.
    fn list_devices(&self) -> BoxFuture<'_, Result<Vec<DevicePath>>>;

    /// Ask the manager to allow the device at `path`.
    fn allow_device<'a>(&'a self, path: &'a DevicePath) -> BoxFuture<'a, Result<()>>;

    /// Read every property of the device at `path` once.
    fn device_properties<'a>(&'a self, path: &'a DevicePath) -> BoxFuture<'a, Result<DeviceProperties>>;

    /// Write the `Allowed` property of the device at `path`.
    fn set_allowed<'a>(&'a self, path: &'a DevicePath, allowed: bool) -> BoxFuture<'a, Result<()>>;

    /// Subscribe to the signal `member` of `interface` on the object at `path`.
    ///
    /// Signals are yielded in the order the bus delivers them.
    fn subscribe<'a>(&'a self, path: &'a DevicePath, interface: &'a str, member: &'a str)
        -> BoxFuture<'a, Result<SignalStream>>;
}
