//! Client side of the mconnect daemon: discovers the devices it knows about, mirrors their
//! properties, and relays their capability signals (battery, ping, ...) as typed events.
//!
//! The entry point is [`DeviceRegistry`]. It talks to the daemon through a [`Transport`]; use
//! [`DbusTransport`] for the real thing.

pub mod names;
pub mod plugin;
pub use plugin::{BatteryPlugin, BatteryState, PingPlugin, Plugin, PluginContext, PluginFactory, PluginTable, Subscription};
pub mod proxy;

mod dbus;
pub use dbus::*;

mod device;
pub use device::*;

mod error;
pub use error::*;

mod registry;
pub use registry::*;

mod transport;
pub use transport::*;

mod wrappers;
pub use wrappers::*;

#[cfg(test)]
mod testing;
