//! Proxies for the mconnect DBus interfaces, so we can call them.
//!
//! The interfaces are the ones mconnect exports on the session bus. Only the manager and device
//! interfaces are wrapped here; the per-capability interfaces (`org.mconnect.Device.Battery`, ...)
//! only carry signals, which are received through a generic [`zbus::Proxy`] (see
//! [`DbusTransport`][crate::DbusTransport]).
//!
//! For more information, see ["Writing a client proxy" in the zbus
//! tutorial](https://dbus2.github.io/zbus/).

mod dbus_mconnect_manager;
pub use dbus_mconnect_manager::*;

mod dbus_mconnect_device;
pub use dbus_mconnect_device::*;
