//! # DBus interface proxy for: `org.mconnect.DeviceManager`

use zbus::{proxy, zvariant::OwnedObjectPath};

#[proxy(interface = "org.mconnect.DeviceManager", default_service = "org.mconnect", default_path = "/org/mconnect/manager")]
pub trait DeviceManager {
    /// AllowDevice method
    fn allow_device(&self, path: &str) -> zbus::Result<()>;

    /// ListDevices method
    fn list_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}
