//! In-memory [`Transport`] used by the tests.

use std::sync::{Arc, Mutex};

use futures::{channel::mpsc, future::BoxFuture, FutureExt, StreamExt};

use crate::*;

struct Subscriber {
    path: DevicePath,
    interface: String,
    member: String,
    sender: mpsc::UnboundedSender<Signal>,
}

struct FakeState {
    available: bool,
    devices: Vec<(DevicePath, DeviceProperties)>,
    /// Paths the manager lists without a device object behind them.
    extra_paths: Vec<DevicePath>,
    subscribers: Vec<Subscriber>,
    refuse_subscriptions: bool,
    allow_requests: Vec<DevicePath>,
    allowed_writes: Vec<(DevicePath, bool)>,
}

/// A fake daemon. Clones share the same state.
#[derive(Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let state = FakeState {
            available: true,
            devices: Vec::new(),
            extra_paths: Vec::new(),
            subscribers: Vec::new(),
            refuse_subscriptions: false,
            allow_requests: Vec::new(),
            allowed_writes: Vec::new(),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn handle(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap(); // unwrap: mutex poisoning is okay
        f(&mut state)
    }

    pub fn add_device(&self, path: &str, properties: DeviceProperties) -> DevicePath {
        let path = DevicePath::from(path);
        self.with_state(|s| s.devices.push((path.clone(), properties)));
        path
    }

    pub fn update_device(&self, path: &DevicePath, f: impl FnOnce(&mut DeviceProperties)) {
        self.with_state(|s| {
            let (_, props) = s.devices.iter_mut().find(|(p, _)| p == path).expect("no such device");
            f(props);
        })
    }

    pub fn remove_device(&self, path: &DevicePath) {
        self.with_state(|s| s.devices.retain(|(p, _)| p != path));
    }

    pub fn list_extra_path(&self, path: DevicePath) {
        self.with_state(|s| s.extra_paths.push(path));
    }

    pub fn set_available(&self, available: bool) {
        self.with_state(|s| s.available = available);
    }

    /// Deliver `signal` to every live subscription on `path` that matches it.
    /// Make signal subscriptions fail while everything else keeps working.
    pub fn set_refuse_subscriptions(&self, refuse: bool) {
        self.with_state(|s| s.refuse_subscriptions = refuse);
    }

    pub fn emit(&self, path: &DevicePath, signal: Signal) {
        self.with_state(|s| {
            s.subscribers.retain(|sub| !sub.sender.is_closed());
            for sub in &s.subscribers {
                if &sub.path == path && sub.interface == signal.interface && sub.member == signal.member {
                    let _ = sub.sender.unbounded_send(signal.clone());
                }
            }
        })
    }

    pub fn live_subscriptions(&self, path: &DevicePath) -> usize {
        self.with_state(|s| s.subscribers.iter().filter(|sub| &sub.path == path && !sub.sender.is_closed()).count())
    }

    pub fn allow_requests(&self) -> Vec<DevicePath> {
        self.with_state(|s| s.allow_requests.clone())
    }

    pub fn allowed_writes(&self) -> Vec<(DevicePath, bool)> {
        self.with_state(|s| s.allowed_writes.clone())
    }

    fn check_available(state: &FakeState) -> Result<()> {
        if state.available {
            Ok(())
        } else {
            Err(Error::DaemonUnavailable("The name org.mconnect was not provided by any .service files".to_string()))
        }
    }
}

impl Transport for FakeTransport {
    fn list_devices(&self) -> BoxFuture<'_, Result<Vec<DevicePath>>> {
        let result: Result<Vec<DevicePath>> = self.with_state(|s| {
            Self::check_available(s)?;
            Ok(s.devices.iter().map(|(p, _)| p.clone()).chain(s.extra_paths.iter().cloned()).collect())
        });
        futures::future::ready(result).boxed()
    }

    fn allow_device<'a>(&'a self, path: &'a DevicePath) -> BoxFuture<'a, Result<()>> {
        let result: Result<()> = self.with_state(|s| {
            Self::check_available(s)?;
            s.allow_requests.push(path.clone());
            Ok(())
        });
        futures::future::ready(result).boxed()
    }

    fn device_properties<'a>(&'a self, path: &'a DevicePath) -> BoxFuture<'a, Result<DeviceProperties>> {
        let result: Result<DeviceProperties> = self.with_state(|s| {
            Self::check_available(s)?;
            s.devices
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, props)| props.clone())
                .ok_or_else(|| Error::UnknownDevice(path.clone()))
        });
        futures::future::ready(result).boxed()
    }

    fn set_allowed<'a>(&'a self, path: &'a DevicePath, allowed: bool) -> BoxFuture<'a, Result<()>> {
        let result: Result<()> = self.with_state(|s| {
            Self::check_available(s)?;
            s.allowed_writes.push((path.clone(), allowed));
            if let Some((_, props)) = s.devices.iter_mut().find(|(p, _)| p == path) {
                props.allowed = allowed;
            }
            Ok(())
        });
        futures::future::ready(result).boxed()
    }

    fn subscribe<'a>(&'a self, path: &'a DevicePath, interface: &'a str, member: &'a str)
        -> BoxFuture<'a, Result<SignalStream>> {
        let result: Result<SignalStream> = self.with_state(|s| {
            Self::check_available(s)?;
            if s.refuse_subscriptions {
                return Err(Error::DaemonUnavailable(format!("match rule for {}.{} was rejected", interface, member)));
            }
            let (sender, receiver) = mpsc::unbounded();
            s.subscribers.push(Subscriber {
                path: path.clone(),
                interface: interface.to_owned(),
                member: member.to_owned(),
                sender,
            });
            Ok(receiver.boxed())
        });
        futures::future::ready(result).boxed()
    }
}

pub fn device_props(name: &str, outgoing: &[&str]) -> DeviceProperties {
    DeviceProperties {
        id: format!("{}-id", name),
        name: name.to_string(),
        device_type: "phone".to_string(),
        protocol_version: 7,
        outgoing_capabilities: outgoing.iter().map(|c| CapabilityName::from(*c)).collect(),
        ..Default::default()
    }
}

pub fn battery_signal(level: u32, charging: bool) -> Signal {
    Signal::new(names::BATTERY_INTERFACE, names::BATTERY_SIGNAL, vec![Arg::U32(level), Arg::Bool(charging)])
}

pub fn ping_signal() -> Signal {
    Signal::new(names::PING_INTERFACE, names::PING_SIGNAL, vec![])
}

/// Give spawned relay tasks a chance to run (or to be torn down after an abort).
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
