//! Well-known names and paths used by the mconnect daemon.

/// Bus name owned by the daemon.
pub const SERVICE: &str = "org.mconnect";

/// Object path of the device manager.
pub const MANAGER_OBJECT: &str = "/org/mconnect/manager";

pub const MANAGER_INTERFACE: &str = "org.mconnect.DeviceManager";
pub const DEVICE_INTERFACE: &str = "org.mconnect.Device";

pub const BATTERY_INTERFACE: &str = "org.mconnect.Device.Battery";
pub const BATTERY_SIGNAL: &str = "Battery";

pub const PING_INTERFACE: &str = "org.mconnect.Device.Ping";
pub const PING_SIGNAL: &str = "Ping";

/// Capability a device advertises when it reports its battery state.
pub const BATTERY_CAPABILITY: &str = "kdeconnect.battery";

/// Capability a device advertises when it can be pinged.
pub const PING_CAPABILITY: &str = "kdeconnect.ping";
