use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{plugin::PluginTable, *};

const EVENT_CAPACITY: usize = 64;

/// Change in the set of known devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "device", rename_all = "kebab-case")]
pub enum RegistryEvent {
    /// A new device was bound; look it up with [`DeviceRegistry::device`].
    DeviceAdded(DevicePath),
    /// A device was dropped, together with all of its plugins.
    DeviceRemoved(DevicePath),
}

/// Tracks all devices the mconnect daemon knows about.
///
/// The registry is the only owner of its [`Device`]s. Every entry is keyed by the device's object
/// path, and a path never maps to more than one device.
pub struct DeviceRegistry {
    transport: Arc<dyn Transport>,
    plugins: PluginTable,
    devices: HashMap<DevicePath, Device>,
    events: tokio::sync::broadcast::Sender<RegistryEvent>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry").field("plugins", &self.plugins).field("devices", &self.devices).finish_non_exhaustive()
    }
}

impl DeviceRegistry {
    /// Create an empty registry that attaches the default set of plugins.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_plugins(transport, PluginTable::default())
    }

    pub fn with_plugins(transport: Arc<dyn Transport>, plugins: PluginTable) -> Self {
        let (events, _) = tokio::sync::broadcast::channel(EVENT_CAPACITY);
        Self { transport, plugins, devices: HashMap::new(), events }
    }

    /// Ask the daemon for all devices and bring the registry in line with its answer.
    ///
    /// Every listed path goes through [`DeviceRegistry::device_added`], so this can be called
    /// again at any time (e.g. after the daemon restarted): known devices get refreshed rather than
    /// created twice, and devices the daemon no longer lists are removed.
    ///
    /// If the daemon can't be reached, [`Error::DaemonUnavailable`] is returned and the registry is
    /// left untouched.
    pub async fn initialize(&mut self) -> Result<()> {
        log::debug!("initializing devices");
        let paths = self.transport.list_devices().await?;

        let listed: HashSet<&DevicePath> = paths.iter().collect();
        let gone: Vec<DevicePath> = self.devices.keys().filter(|path| !listed.contains(path)).cloned().collect();
        for path in gone {
            self.remove(&path);
        }

        for path in paths {
            self.device_added(path).await;
        }
        Ok(())
    }

    /// Handle a device appearing at `path`.
    ///
    /// A path we don't know yet gets a new [`Device`] and a [`RegistryEvent::DeviceAdded`]. A path
    /// we already track only gets refreshed. Failures are logged and only affect this one device.
    pub async fn device_added(&mut self, path: DevicePath) {
        if let Some(device) = self.devices.get_mut(&path) {
            log::debug!("device {} already known, refreshing", path);
            if let Err(e) = device.refresh(&self.plugins).await {
                log::warn!("Could not refresh device {}: {}", path, e);
            }
            return;
        }

        match Device::bind(path.clone(), self.transport.clone(), &self.plugins).await {
            Ok(device) => {
                log::info!("new device: {} ({})", device.name(), path);
                self.devices.insert(path.clone(), device);
                let _ = self.events.send(RegistryEvent::DeviceAdded(path));
            }
            Err(e) => log::warn!("Could not create device from path {:?}: {}", path, e),
        }
    }

    /// Drop the device at `path`, releasing all of its subscriptions.
    pub fn remove(&mut self, path: &DevicePath) -> Option<Device> {
        let device = self.devices.remove(path)?;
        log::info!("lost device: {} ({})", device.name(), path);
        let _ = self.events.send(RegistryEvent::DeviceRemoved(path.clone()));
        Some(device)
    }

    /// Ask the daemon to allow the device at `path`.
    ///
    /// Nothing changes locally; the new state is picked up by the next refresh.
    pub async fn request_allow(&self, path: &DevicePath) -> Result<()> {
        log::debug!("requesting allow for {}", path);
        self.transport.allow_device(path).await
    }

    /// Listen to devices being added and removed.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn device(&self, path: &DevicePath) -> Option<&Device> {
        self.devices.get(path)
    }

    pub fn device_mut(&mut self, path: &DevicePath) -> Option<&mut Device> {
        self.devices.get_mut(path)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn plugins(&self) -> &PluginTable {
        &self.plugins
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::*;
    use pretty_assertions::assert_eq;

    fn drain(events: &mut tokio::sync::broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_initialize_empty() {
        let bus = FakeTransport::new();
        let mut registry = DeviceRegistry::new(bus.handle());
        let mut events = registry.subscribe();

        registry.initialize().await.unwrap();

        assert!(registry.is_empty());
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_initialize_two_devices() {
        let bus = FakeTransport::new();
        let p1 = bus.add_device("/org/mconnect/device/0", device_props("one", &[names::BATTERY_CAPABILITY]));
        let p2 = bus.add_device("/org/mconnect/device/1", device_props("two", &[names::PING_CAPABILITY]));
        let mut registry = DeviceRegistry::new(bus.handle());
        let mut events = registry.subscribe();

        registry.initialize().await.unwrap();

        assert_eq!(drain(&mut events), vec![RegistryEvent::DeviceAdded(p1.clone()), RegistryEvent::DeviceAdded(p2.clone())]);
        assert_eq!(registry.len(), 2);
        for path in [&p1, &p2] {
            assert_eq!(registry.device(path).unwrap().path(), path);
        }
        assert_eq!(registry.device(&p1).unwrap().name(), "one");
        assert_eq!(registry.device(&p2).unwrap().name(), "two");
    }

    #[tokio::test]
    async fn test_rediscovery_is_idempotent() {
        let bus = FakeTransport::new();
        let path = bus.add_device("/dev/0", device_props("one", &[names::BATTERY_CAPABILITY, names::PING_CAPABILITY]));
        let mut registry = DeviceRegistry::new(bus.handle());
        let mut events = registry.subscribe();

        registry.initialize().await.unwrap();
        registry.initialize().await.unwrap();
        registry.device_added(path.clone()).await;
        settle().await;

        assert_eq!(drain(&mut events), vec![RegistryEvent::DeviceAdded(path.clone())]);
        assert_eq!(registry.len(), 1);
        assert_eq!(bus.live_subscriptions(&path), 2);
    }

    #[tokio::test]
    async fn test_rediscovery_refreshes_known_device() {
        let bus = FakeTransport::new();
        let path = bus.add_device("/dev/0", device_props("old name", &[]));
        let mut registry = DeviceRegistry::new(bus.handle());
        registry.initialize().await.unwrap();

        bus.update_device(&path, |props| props.name = "new name".to_string());
        registry.initialize().await.unwrap();

        assert_eq!(registry.device(&path).unwrap().name(), "new name");
    }

    #[tokio::test]
    async fn test_vanished_device_is_removed() {
        let bus = FakeTransport::new();
        let p1 = bus.add_device("/dev/0", device_props("one", &[names::PING_CAPABILITY]));
        let p2 = bus.add_device("/dev/1", device_props("two", &[]));
        let mut registry = DeviceRegistry::new(bus.handle());
        registry.initialize().await.unwrap();
        let mut events = registry.subscribe();

        bus.remove_device(&p1);
        registry.initialize().await.unwrap();
        settle().await;

        assert_eq!(drain(&mut events), vec![RegistryEvent::DeviceRemoved(p1.clone())]);
        assert!(registry.device(&p1).is_none());
        assert!(registry.device(&p2).is_some());
        assert_eq!(bus.live_subscriptions(&p1), 0);
    }

    #[tokio::test]
    async fn test_daemon_unavailable() {
        let bus = FakeTransport::new();
        let path = bus.add_device("/dev/0", device_props("one", &[]));
        let mut registry = DeviceRegistry::new(bus.handle());
        registry.initialize().await.unwrap();

        bus.set_available(false);
        let err = registry.initialize().await.unwrap_err();
        assert!(err.is_daemon_unavailable());
        // known devices survive a failed listing
        assert!(registry.device(&path).is_some());

        let err = registry.request_allow(&path).await.unwrap_err();
        assert!(err.is_daemon_unavailable());
    }

    #[tokio::test]
    async fn test_broken_device_does_not_affect_others() {
        let bus = FakeTransport::new();
        let good = bus.add_device("/dev/0", device_props("good", &[]));
        let broken = DevicePath::from("/dev/broken");
        bus.list_extra_path(broken.clone());
        let mut registry = DeviceRegistry::new(bus.handle());

        registry.initialize().await.unwrap();

        assert!(registry.device(&good).is_some());
        assert!(registry.device(&broken).is_none());
    }

    #[tokio::test]
    async fn test_request_allow() {
        let bus = FakeTransport::new();
        let path = bus.add_device("/dev/0", device_props("one", &[]));
        let mut registry = DeviceRegistry::new(bus.handle());
        registry.initialize().await.unwrap();

        registry.request_allow(&path).await.unwrap();

        assert_eq!(bus.allow_requests(), vec![path.clone()]);
        // nothing changes locally
        assert!(!registry.device(&path).unwrap().allowed());
    }

    #[tokio::test]
    async fn test_custom_plugin_table() {
        let bus = FakeTransport::new();
        let path = bus.add_device("/dev/0", device_props("one", &[names::BATTERY_CAPABILITY, names::PING_CAPABILITY]));
        let mut table = PluginTable::empty();
        table.register(names::PING_CAPABILITY, crate::plugin::ping::attach);
        let mut registry = DeviceRegistry::with_plugins(bus.handle(), table);

        registry.initialize().await.unwrap();

        let device = registry.device(&path).unwrap();
        assert!(device.has_plugin(names::PING_CAPABILITY));
        assert!(!device.has_plugin(names::BATTERY_CAPABILITY));
    }

    #[tokio::test]
    async fn test_drop_registry_releases_everything() {
        let bus = FakeTransport::new();
        let p1 = bus.add_device("/dev/0", device_props("one", &[names::BATTERY_CAPABILITY]));
        let p2 = bus.add_device("/dev/1", device_props("two", &[names::PING_CAPABILITY]));
        let mut registry = DeviceRegistry::new(bus.handle());
        registry.initialize().await.unwrap();
        assert_eq!(bus.live_subscriptions(&p1) + bus.live_subscriptions(&p2), 2);

        drop(registry);
        settle().await;

        assert_eq!(bus.live_subscriptions(&p1) + bus.live_subscriptions(&p2), 0);
    }
}
