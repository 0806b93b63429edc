use std::any::Any;

use futures::{future::BoxFuture, FutureExt};

use crate::{plugin::*, *};

/// Plugin for the `kdeconnect.ping` capability. Relays every `Ping` signal as a
/// [`DeviceEventKind::Ping`] and keeps no state.
#[derive(Debug)]
pub struct PingPlugin {
    _subscription: Subscription,
}

impl Plugin for PingPlugin {
    fn capability(&self) -> &str {
        names::PING_CAPABILITY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn attach(ctx: &PluginContext) -> BoxFuture<'_, Result<Box<dyn Plugin>>> {
    async move {
        let subscription = ctx
            .relay(names::PING_INTERFACE, names::PING_SIGNAL, |signal| {
                if signal.args.is_empty() {
                    Ok(DeviceEventKind::Ping)
                } else {
                    Err(Error::malformed(names::PING_SIGNAL, format!("expected no arguments, got {:?}", signal.args)))
                }
            })
            .await?;
        Ok(Box::new(PingPlugin { _subscription: subscription }) as Box<dyn Plugin>)
    }
    .boxed()
}
