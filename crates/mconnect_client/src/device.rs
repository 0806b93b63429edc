use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{plugin::*, *};

/// Capacity of each device's event channel. Receivers that fall further behind than this lose the
/// oldest events.
const EVENT_CAPACITY: usize = 64;

/// Snapshot of the properties of an `org.mconnect.Device`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProperties {
    pub id: String,
    pub name: String,
    pub device_type: String,
    pub protocol_version: u32,
    pub address: String,
    /// Whether pairing with the device has completed.
    pub paired: bool,
    /// Whether the local user has authorized the device.
    pub allowed: bool,
    /// Whether the device is currently reachable.
    pub active: bool,
    pub incoming_capabilities: BTreeSet<CapabilityName>,
    pub outgoing_capabilities: BTreeSet<CapabilityName>,
}

/// Something that happened on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device: DevicePath,
    pub kind: DeviceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DeviceEventKind {
    /// The device reported a new battery state.
    Battery { level: u32, charging: bool },
    /// The device pinged us.
    Ping,
    /// A refresh found the device's properties changed.
    PropertiesChanged,
}

/// A remote device known to the mconnect daemon, together with the plugins attached for its
/// capabilities.
///
/// Dropping a `Device` drops its plugins, which releases all of their signal subscriptions.
pub struct Device {
    path: DevicePath,
    properties: DeviceProperties,
    plugins: HashMap<CapabilityName, Box<dyn Plugin>>,
    transport: Arc<dyn Transport>,
    events: tokio::sync::broadcast::Sender<DeviceEvent>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("path", &self.path)
            .field("properties", &self.properties)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Bind to the device at `path`: read its properties and attach a plugin for every outgoing
    /// capability that `table` knows about.
    pub async fn bind(path: DevicePath, transport: Arc<dyn Transport>, table: &PluginTable) -> Result<Self> {
        let properties = transport.device_properties(&path).await?;
        log::debug!("bound device {}: {:?}", path, properties);

        let (events, _) = tokio::sync::broadcast::channel(EVENT_CAPACITY);
        let mut device = Device { path, properties, plugins: HashMap::new(), transport, events };
        device.attach_plugins(table).await;
        Ok(device)
    }

    /// Attach plugins for every supported outgoing capability that does not have one yet.
    async fn attach_plugins(&mut self, table: &PluginTable) {
        let ctx = PluginContext { path: self.path.clone(), transport: self.transport.clone(), events: self.events.clone() };
        for capability in &self.properties.outgoing_capabilities {
            if self.plugins.contains_key(capability) {
                continue;
            }
            let Some(factory) = table.factory(capability.as_str()) else {
                log::debug!("{} advertises {}, which has no plugin", self.path, capability);
                continue;
            };
            match factory(&ctx).await {
                Ok(plugin) => {
                    log::debug!("{} support enabled for {}", plugin.capability(), self.path);
                    self.plugins.insert(capability.clone(), plugin);
                }
                Err(e) => log::warn!("Could not attach {} plugin to {}: {}", capability, self.path, e),
            }
        }
    }

    /// Re-read the properties of this device, and bring the attached plugins in line with the
    /// capabilities it now advertises.
    ///
    /// Emits [`DeviceEventKind::PropertiesChanged`] if anything changed.
    pub async fn refresh(&mut self, table: &PluginTable) -> Result<()> {
        let properties = self.transport.device_properties(&self.path).await?;
        if properties == self.properties {
            // plugins that failed to attach earlier get another try
            self.attach_plugins(table).await;
            return Ok(());
        }

        let outgoing = &properties.outgoing_capabilities;
        self.plugins.retain(|capability, _| {
            let keep = outgoing.contains(capability);
            if !keep {
                log::debug!("{} no longer advertises {}, dropping its plugin", self.path, capability);
            }
            keep
        });
        self.properties = properties;
        self.attach_plugins(table).await;

        let _ = self.events.send(DeviceEvent { device: self.path.clone(), kind: DeviceEventKind::PropertiesChanged });
        Ok(())
    }

    /// Listen to events of this device and all its plugins.
    ///
    /// Every receiver buffers up to 64 events. A receiver that falls further behind loses the
    /// oldest ones and gets [`RecvError::Lagged`](tokio::sync::broadcast::error::RecvError::Lagged)
    /// with the number it missed.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Authorize or revoke this device.
    ///
    /// This doesn't wait for the daemon; the new value shows up in [`Device::allowed`] after the
    /// next [`Device::refresh`]. Failures are logged.
    pub fn set_allowed(&self, allowed: bool) {
        let transport = self.transport.clone();
        let path = self.path.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.set_allowed(&path, allowed).await {
                log::warn!("Failed to set Allowed={} on {}: {}", allowed, path, e);
            }
        });
    }

    pub fn path(&self) -> &DevicePath {
        &self.path
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    pub fn id(&self) -> &str {
        &self.properties.id
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn device_type(&self) -> &str {
        &self.properties.device_type
    }

    pub fn protocol_version(&self) -> u32 {
        self.properties.protocol_version
    }

    pub fn address(&self) -> &str {
        &self.properties.address
    }

    pub fn paired(&self) -> bool {
        self.properties.paired
    }

    pub fn allowed(&self) -> bool {
        self.properties.allowed
    }

    pub fn active(&self) -> bool {
        self.properties.active
    }

    pub fn incoming_capabilities(&self) -> &BTreeSet<CapabilityName> {
        &self.properties.incoming_capabilities
    }

    pub fn outgoing_capabilities(&self) -> &BTreeSet<CapabilityName> {
        &self.properties.outgoing_capabilities
    }

    /// Capabilities that currently have a plugin attached.
    pub fn plugin_names(&self) -> BTreeSet<&CapabilityName> {
        self.plugins.keys().collect()
    }

    pub fn has_plugin(&self, capability: &str) -> bool {
        self.plugins.contains_key(capability)
    }

    /// Get the attached plugin of type `P`, if any.
    pub fn plugin<P: Plugin + 'static>(&self) -> Option<&P> {
        self.plugins.values().find_map(|plugin| plugin.as_any().downcast_ref::<P>())
    }

    /// Last battery reading, if the device has the battery plugin and has reported one.
    pub fn battery(&self) -> Option<BatteryState> {
        self.plugin::<BatteryPlugin>().and_then(BatteryPlugin::state)
    }
}
