//! # DBus interface proxy for: `org.mconnect.Device`
//!
//! Devices live at per-device object paths, so there is no default path; build the proxy with
//! [`DeviceProxy::builder`] and set the path explicitly.

use zbus::proxy;

#[proxy(interface = "org.mconnect.Device", default_service = "org.mconnect")]
pub trait Device {
    /// Id property
    #[zbus(property)]
    fn id(&self) -> zbus::Result<String>;

    /// Name property
    #[zbus(property)]
    fn name(&self) -> zbus::Result<String>;

    /// DeviceType property
    #[zbus(property)]
    fn device_type(&self) -> zbus::Result<String>;

    /// ProtocolVersion property
    #[zbus(property)]
    fn protocol_version(&self) -> zbus::Result<u32>;

    /// Address property
    #[zbus(property)]
    fn address(&self) -> zbus::Result<String>;

    /// IsPaired property
    #[zbus(property)]
    fn is_paired(&self) -> zbus::Result<bool>;

    /// Allowed property
    #[zbus(property)]
    fn allowed(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn set_allowed(&self, value: bool) -> zbus::Result<()>;

    /// IsActive property
    #[zbus(property)]
    fn is_active(&self) -> zbus::Result<bool>;

    /// IncomingCapabilities property
    #[zbus(property)]
    fn incoming_capabilities(&self) -> zbus::Result<Vec<String>>;

    /// OutgoingCapabilities property
    #[zbus(property)]
    fn outgoing_capabilities(&self) -> zbus::Result<Vec<String>>;
}
