use std::{collections::BTreeSet, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use mconnect_client::{
    BatteryState, CapabilityName, DbusTransport, Device, DeviceEvent, DeviceEventKind, DevicePath, DeviceProperties,
    DeviceRegistry, RegistryEvent, Transport,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::opts::{Action, Opt};

/// How long `set-allowed` waits for the daemon to report the new value.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(3);
const CONFIRM_POLL: Duration = Duration::from_millis(200);

/// What `list --json` prints for every device.
#[derive(Debug, Serialize)]
struct DeviceSummary<'a> {
    path: &'a DevicePath,
    #[serde(flatten)]
    properties: &'a DeviceProperties,
    plugins: BTreeSet<&'a CapabilityName>,
    battery: Option<BatteryState>,
}

impl<'a> DeviceSummary<'a> {
    fn of(device: &'a Device) -> Self {
        Self { path: device.path(), properties: device.properties(), plugins: device.plugin_names(), battery: device.battery() }
    }
}

pub async fn run(opts: Opt) -> Result<()> {
    let transport = connect(opts.bus_address.as_deref()).await?;
    let mut registry = DeviceRegistry::new(transport);

    match opts.action {
        Action::ShellCompletions { .. } => unreachable!(),
        Action::List => {
            registry.initialize().await.context("Failed to list devices")?;
            let mut devices: Vec<&Device> = registry.devices().collect();
            devices.sort_by(|a, b| a.path().cmp(b.path()));
            for device in devices {
                if opts.json {
                    println!("{}", serde_json::to_string(&DeviceSummary::of(device))?);
                } else {
                    println!("{}", describe_device(device));
                }
            }
        }
        Action::Allow { device } => {
            registry.request_allow(&device).await.with_context(|| format!("Failed to allow {}", device))?;
            println!("Asked the daemon to allow {}", device);
        }
        Action::SetAllowed { device, allowed } => {
            registry.initialize().await.context("Failed to list devices")?;
            set_allowed(&mut registry, &device, allowed).await?;
            println!("{}: allowed={}", device, allowed);
        }
        Action::Monitor { rescan } => {
            let rescan = if rescan == 0 { None } else { Some(Duration::from_secs(rescan)) };
            monitor(registry, rescan, opts.json).await?;
        }
    }
    Ok(())
}

async fn connect(address: Option<&str>) -> Result<Arc<dyn Transport>> {
    let transport = match address {
        Some(address) => {
            log::debug!("Connecting to bus at {}", address);
            DbusTransport::with_address(address).await
        }
        None => DbusTransport::session().await,
    }
    .context("Failed to connect to the bus")?;
    Ok(Arc::new(transport))
}

/// Write `Allowed` and refresh the device until the daemon reports the new value.
async fn set_allowed(registry: &mut DeviceRegistry, path: &DevicePath, allowed: bool) -> Result<()> {
    let table = registry.plugins().clone();
    let device = registry.device_mut(path).ok_or_else(|| mconnect_client::Error::UnknownDevice(path.clone()))?;
    if device.allowed() == allowed {
        return Ok(());
    }
    device.set_allowed(allowed);

    tokio::time::timeout(CONFIRM_TIMEOUT, async {
        loop {
            tokio::time::sleep(CONFIRM_POLL).await;
            match device.refresh(&table).await {
                Ok(()) if device.allowed() == allowed => return Ok(()),
                Ok(()) => {}
                Err(e) => return Err(e),
            }
        }
    })
    .await
    .with_context(|| format!("mconnect did not confirm allowed={} for {}", allowed, path))?
    .context("Failed to read back device properties")?;
    Ok(())
}

async fn monitor(mut registry: DeviceRegistry, rescan: Option<Duration>, json: bool) -> Result<()> {
    let mut registry_events = registry.subscribe();
    let (device_events_tx, mut device_events) = mpsc::unbounded_channel();

    registry.initialize().await.context("Failed to list devices")?;

    let mut rescan_timer = rescan.map(|period| tokio::time::interval_at(tokio::time::Instant::now() + period, period));

    crate::loop_select! {
        Ok(event) = registry_events.recv() => {
            if let RegistryEvent::DeviceAdded(path) = &event {
                if let Some(device) = registry.device(path) {
                    forward_device_events(device.subscribe(), device_events_tx.clone());
                }
            }
            print_registry_event(&registry, &event, json)?;
        },
        Some(event) = device_events.recv() => {
            let name = registry.device(&event.device).map(Device::name).unwrap_or_default();
            if json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                println!("{}", describe_event(name, &event));
            }
        },
        _ = tick(&mut rescan_timer) => {
            crate::print_result_err!("while rescanning devices", registry.initialize().await);
        },
        _ = tokio::signal::ctrl_c() => break,
    }
    Ok(())
}

async fn tick(timer: &mut Option<tokio::time::Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Pass every event of one device on to `sink`, until the device goes away.
fn forward_device_events(mut events: broadcast::Receiver<DeviceEvent>, sink: mpsc::UnboundedSender<DeviceEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if sink.send(event).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => log::warn!("Missed {} device events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn print_registry_event(registry: &DeviceRegistry, event: &RegistryEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        RegistryEvent::DeviceAdded(path) => match registry.device(path) {
            Some(device) => println!("+ {}", describe_device(device)),
            None => println!("+ {}", path),
        },
        RegistryEvent::DeviceRemoved(path) => println!("- {}", path),
    }
    Ok(())
}

fn describe_device(device: &Device) -> String {
    let mut out = format!(
        "{}\t{} ({}, {})\tpaired={} allowed={} active={}",
        device.path(),
        device.name(),
        device.device_type(),
        device.address(),
        device.paired(),
        device.allowed(),
        device.active(),
    );
    if let Some(battery) = device.battery() {
        out.push_str(&format!("\t{}", describe_battery(battery.level, battery.charging)));
    }
    out
}

fn describe_battery(level: u32, charging: bool) -> String {
    if charging {
        format!("battery {}% (charging)", level)
    } else {
        format!("battery {}%", level)
    }
}

fn describe_event(name: &str, event: &DeviceEvent) -> String {
    let what = match &event.kind {
        DeviceEventKind::Battery { level, charging } => describe_battery(*level, *charging),
        DeviceEventKind::Ping => "ping".to_string(),
        DeviceEventKind::PropertiesChanged => "properties changed".to_string(),
    };
    if name.is_empty() {
        format!("{}: {}", event.device, what)
    } else {
        format!("{} ({}): {}", name, event.device, what)
    }
}
