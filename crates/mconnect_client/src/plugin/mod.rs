//! Capability plugins.
//!
//! A plugin is the client-side half of one capability a device advertises. Which plugins get
//! attached to a device is decided by a [`PluginTable`], which maps capability names to factories.
//! Adding a new kind of plugin means writing a factory and registering it in the table.

use std::{any::Any, collections::HashMap, sync::Arc};

use futures::{future::BoxFuture, StreamExt};

use crate::*;

pub mod battery;
pub mod ping;

pub use battery::{BatteryPlugin, BatteryState};
pub use ping::PingPlugin;

/// A capability attached to a device.
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// The capability this plugin implements.
    fn capability(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Everything a plugin factory gets to work with when attaching to a device.
#[derive(Clone)]
pub struct PluginContext {
    pub path: DevicePath,
    pub transport: Arc<dyn Transport>,
    pub(crate) events: tokio::sync::broadcast::Sender<DeviceEvent>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext").field("path", &self.path).finish_non_exhaustive()
    }
}

impl PluginContext {
    /// Subscribe to `interface.member` on this device and turn every signal into a device event
    /// using `decode`.
    ///
    /// `decode` runs on the relay task, which is the only place a plugin's state gets written.
    /// Signals it rejects are logged and dropped, and the relay keeps going.
    pub async fn relay<F>(&self, interface: &'static str, member: &'static str, mut decode: F) -> Result<Subscription>
    where
        F: FnMut(&Signal) -> Result<DeviceEventKind> + Send + 'static,
    {
        let mut signals = self.transport.subscribe(&self.path, interface, member).await?;
        let events = self.events.clone();
        let path = self.path.clone();

        let task = tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                match decode(&signal) {
                    Ok(kind) => {
                        log::debug!("{}.{} emitted on {}: {:?}", interface, member, path, kind);
                        // no receivers is fine, nobody is listening right now
                        let _ = events.send(DeviceEvent { device: path.clone(), kind });
                    }
                    Err(e) => log::warn!("Ignoring {}.{} from {}: {}", interface, member, path, e),
                }
            }
            log::debug!("Signal stream {}.{} for {} ended", interface, member, path);
        });

        Ok(Subscription { task })
    }
}

/// A live signal subscription. The subscription is released when this is dropped.
#[derive(Debug)]
pub struct Subscription {
    task: tokio::task::JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Creates the plugin for one capability on one device.
pub type PluginFactory = for<'a> fn(&'a PluginContext) -> BoxFuture<'a, Result<Box<dyn Plugin>>>;

/// Table mapping capability names to the factory that implements them.
#[derive(Clone)]
pub struct PluginTable {
    factories: HashMap<CapabilityName, PluginFactory>,
}

impl Default for PluginTable {
    /// The table with every plugin this crate ships.
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(names::BATTERY_CAPABILITY, battery::attach);
        table.register(names::PING_CAPABILITY, ping::attach);
        table
    }
}

impl std::fmt::Debug for PluginTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl PluginTable {
    /// A table with no plugins at all.
    pub fn empty() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Register `factory` for `capability`, replacing any previous factory for it.
    pub fn register(&mut self, capability: impl Into<CapabilityName>, factory: PluginFactory) -> &mut Self {
        self.factories.insert(capability.into(), factory);
        self
    }

    pub fn factory(&self, capability: &str) -> Option<PluginFactory> {
        self.factories.get(capability).copied()
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.factories.contains_key(capability)
    }
}
