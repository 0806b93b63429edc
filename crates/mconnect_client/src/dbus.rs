use futures::{future::BoxFuture, FutureExt, StreamExt};
use zbus::zvariant;

use crate::*;

/// [`Transport`] that talks to the mconnect daemon over DBus.
pub struct DbusTransport {
    con: zbus::Connection,
    manager: proxy::DeviceManagerProxy<'static>,
}

impl DbusTransport {
    /// Create a transport on an existing connection.
    pub async fn new(con: &zbus::Connection) -> Result<Self> {
        let manager = proxy::DeviceManagerProxy::new(con).await?;
        Ok(Self { con: con.clone(), manager })
    }

    /// Connect to the session bus, which is where mconnect registers itself.
    pub async fn session() -> Result<Self> {
        let con = zbus::Connection::session().await?;
        Self::new(&con).await
    }

    /// Connect to the bus at the given address (e.g. `unix:path=/run/user/1000/bus`).
    pub async fn with_address(address: &str) -> Result<Self> {
        let con = zbus::connection::Builder::address(address)?.build().await?;
        Self::new(&con).await
    }

    pub fn connection(&self) -> &zbus::Connection {
        &self.con
    }

    async fn device_proxy(&self, path: &DevicePath) -> zbus::Result<proxy::DeviceProxy<'static>> {
        proxy::DeviceProxy::builder(&self.con)
            .path(path.to_string())?
            .cache_properties(zbus::proxy::CacheProperties::No)
            .build()
            .await
    }

    async fn read_properties(&self, path: &DevicePath) -> zbus::Result<DeviceProperties> {
        let device = self.device_proxy(path).await?;
        Ok(DeviceProperties {
            id: device.id().await?,
            name: device.name().await?,
            device_type: device.device_type().await?,
            protocol_version: device.protocol_version().await?,
            address: device.address().await?,
            paired: device.is_paired().await?,
            allowed: device.allowed().await?,
            active: device.is_active().await?,
            incoming_capabilities: device.incoming_capabilities().await?.into_iter().map(CapabilityName).collect(),
            outgoing_capabilities: device.outgoing_capabilities().await?.into_iter().map(CapabilityName).collect(),
        })
    }

    async fn signal_stream(&self, path: &DevicePath, interface: &str, member: &str) -> zbus::Result<SignalStream> {
        let proxy = zbus::Proxy::new(&self.con, names::SERVICE, path.to_string(), interface.to_owned()).await?;
        let signals = proxy.receive_signal(member.to_owned()).await?;
        Ok(signals.map(decode_signal).boxed())
    }
}

impl Transport for DbusTransport {
    fn list_devices(&self) -> BoxFuture<'_, Result<Vec<DevicePath>>> {
        async move {
            let paths = self.manager.list_devices().await.map_err(unavailable)?;
            Ok(paths.iter().map(|path| DevicePath::from(path.as_str())).collect())
        }
        .boxed()
    }

    fn allow_device<'a>(&'a self, path: &'a DevicePath) -> BoxFuture<'a, Result<()>> {
        async move { self.manager.allow_device(path.as_str()).await.map_err(unavailable) }.boxed()
    }

    fn device_properties<'a>(&'a self, path: &'a DevicePath) -> BoxFuture<'a, Result<DeviceProperties>> {
        async move { self.read_properties(path).await.map_err(unavailable) }.boxed()
    }

    fn set_allowed<'a>(&'a self, path: &'a DevicePath, allowed: bool) -> BoxFuture<'a, Result<()>> {
        async move {
            let device = self.device_proxy(path).await.map_err(unavailable)?;
            device.set_allowed(allowed).await.map_err(unavailable)
        }
        .boxed()
    }

    fn subscribe<'a>(&'a self, path: &'a DevicePath, interface: &'a str, member: &'a str)
        -> BoxFuture<'a, Result<SignalStream>> {
        async move { self.signal_stream(path, interface, member).await.map_err(unavailable) }.boxed()
    }
}

fn unavailable(err: zbus::Error) -> Error {
    Error::DaemonUnavailable(err.to_string())
}

fn decode_signal(msg: zbus::Message) -> Signal {
    let header = msg.header();
    let interface = header.interface().map(|name| name.to_string()).unwrap_or_default();
    let member = header.member().map(|name| name.to_string()).unwrap_or_default();
    let signature = header.signature().map(|sig| sig.to_string()).unwrap_or_default();

    let args = if signature.is_empty() {
        Vec::new()
    } else {
        let body = msg.body();
        match body.deserialize::<zvariant::Structure<'_>>() {
            Ok(fields) => fields.into_fields().into_iter().map(Arg::from).collect(),
            Err(e) => {
                log::debug!("Could not decode body of {}.{} ({}): {}", interface, member, signature, e);
                vec![Arg::Other(signature)]
            }
        }
    };

    Signal { interface, member, args }
}

impl From<zvariant::Value<'_>> for Arg {
    fn from(value: zvariant::Value<'_>) -> Self {
        match value {
            zvariant::Value::U32(x) => Arg::U32(x),
            zvariant::Value::Bool(x) => Arg::Bool(x),
            zvariant::Value::Str(x) => Arg::Str(x.to_string()),
            other => Arg::Other(other.value_signature().to_string()),
        }
    }
}
