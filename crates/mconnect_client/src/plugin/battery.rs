use std::any::Any;

use futures::{future::BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::{plugin::*, *};

/// Last battery reading a device reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryState {
    /// Charge in percent, as reported by the device.
    pub level: u32,
    pub charging: bool,
}

/// Plugin for the `kdeconnect.battery` capability.
///
/// Holds no reading until the device sends its first `Battery` signal. After that, it always holds
/// the most recent one.
#[derive(Debug)]
pub struct BatteryPlugin {
    state: tokio::sync::watch::Receiver<Option<BatteryState>>,
    _subscription: Subscription,
}

impl BatteryPlugin {
    pub fn state(&self) -> Option<BatteryState> {
        *self.state.borrow()
    }

    pub fn level(&self) -> Option<u32> {
        self.state().map(|s| s.level)
    }

    pub fn charging(&self) -> Option<bool> {
        self.state().map(|s| s.charging)
    }
}

impl Plugin for BatteryPlugin {
    fn capability(&self) -> &str {
        names::BATTERY_CAPABILITY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn attach(ctx: &PluginContext) -> BoxFuture<'_, Result<Box<dyn Plugin>>> {
    async move {
        let (state_tx, state) = tokio::sync::watch::channel(None);
        let subscription = ctx
            .relay(names::BATTERY_INTERFACE, names::BATTERY_SIGNAL, move |signal| {
                let reading = parse_battery(signal)?;
                state_tx.send_replace(Some(reading));
                Ok(DeviceEventKind::Battery { level: reading.level, charging: reading.charging })
            })
            .await?;
        Ok(Box::new(BatteryPlugin { state, _subscription: subscription }) as Box<dyn Plugin>)
    }
    .boxed()
}

fn parse_battery(signal: &Signal) -> Result<BatteryState> {
    match signal.args.as_slice() {
        [Arg::U32(level), Arg::Bool(charging)] => {
            if *level > 100 {
                log::debug!("Battery level {} is above 100%, keeping it as reported", level);
            }
            Ok(BatteryState { level: *level, charging: *charging })
        }
        args => Err(Error::malformed(names::BATTERY_SIGNAL, format!("expected (level: u32, charging: bool), got {:?}", args))),
    }
}
