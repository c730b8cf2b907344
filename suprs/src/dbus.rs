//! The D-Bus backend of the abstract transport.
//!
//! `DbusTransport` maps the [`Transport`](crate::transport::Transport)
//! contract onto the real bus: requests go through the typed proxies in
//! [`crate::proxies`], snapshots through `org.freedesktop.DBus.Properties`,
//! and watches are pump tasks that forward the relevant signal streams to
//! the registered observer. Remote error names under the service prefix
//! are mapped back to [`RemoteError`]; everything else surfaces as a plain
//! D-Bus error.
//!
//! The transport is single-threaded like the rest of the crate: watches
//! spawn local tasks and must run inside a `LocalSet`.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, LocalBoxStream};
use log::{error, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use zbus::Connection;
use zbus::fdo::{DBusProxy, PropertiesChanged, PropertiesProxy};
use zbus::names::InterfaceName;
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value as Zv};

use crate::Result;
use crate::dict::{Dict, Value};
use crate::models::{Error, RemoteError};
use crate::proxies::{
    WpasInterfaceProxy, WpasInterfaceWpsProxy, WpasNetworkProxy, WpasProxy,
};
use crate::transport::{BusEvent, ObjectKind, Observer, Reply, Request, Transport, WatchId};

/// Well-known bus name of the supplicant service.
pub const SERVICE: &str = "fi.w1.wpa_supplicant1";

/// [`Transport`](crate::transport::Transport) implementation over a zbus
/// connection.
pub struct DbusTransport {
    conn: Connection,
    watches: RefCell<HashMap<u64, CancellationToken>>,
    next_watch: Cell<u64>,
}

impl DbusTransport {
    /// Connects to the system bus.
    pub async fn system() -> Result<Self> {
        let conn = Connection::system().await?;
        Ok(Self::new(conn))
    }

    /// Wraps an existing connection (e.g. a session bus in a test
    /// environment).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            watches: RefCell::new(HashMap::new()),
            next_watch: Cell::new(1),
        }
    }

    async fn dispatch(&self, path: &str, request: Request) -> Result<Reply> {
        let conn = &self.conn;
        let path = object_path(path)?;
        match request {
            Request::CreateInterface(args) => {
                let proxy = WpasProxy::new(conn).await?;
                let created = proxy.create_interface(zv_args(&args)).await?;
                Ok(Reply::Path(created.to_string()))
            }
            Request::RemoveInterface(target) => {
                let proxy = WpasProxy::new(conn).await?;
                proxy.remove_interface(owned_path(&target)?).await?;
                Ok(Reply::None)
            }
            Request::GetInterface(ifname) => {
                let proxy = WpasProxy::new(conn).await?;
                Ok(Reply::Path(proxy.get_interface(&ifname).await?.to_string()))
            }
            Request::Scan(args) => {
                let proxy = interface_proxy(conn, &path).await?;
                proxy.scan(zv_args(&args)).await?;
                Ok(Reply::None)
            }
            Request::Disconnect => {
                interface_proxy(conn, &path).await?.disconnect().await?;
                Ok(Reply::None)
            }
            Request::Reassociate => {
                interface_proxy(conn, &path).await?.reassociate().await?;
                Ok(Reply::None)
            }
            Request::Reconnect => {
                interface_proxy(conn, &path).await?.reconnect().await?;
                Ok(Reply::None)
            }
            Request::Reattach => {
                interface_proxy(conn, &path).await?.reattach().await?;
                Ok(Reply::None)
            }
            Request::AutoScan(arg) => {
                interface_proxy(conn, &path).await?.auto_scan(&arg).await?;
                Ok(Reply::None)
            }
            Request::FlushBss(age) => {
                interface_proxy(conn, &path).await?.flush_bss(age).await?;
                Ok(Reply::None)
            }
            Request::SignalPoll => {
                let map = interface_proxy(conn, &path).await?.signal_poll().await?;
                Ok(Reply::Dict(dict_from_map(&map)))
            }
            Request::AddNetwork(args) => {
                let proxy = interface_proxy(conn, &path).await?;
                let network = proxy.add_network(zv_args(&args)).await?;
                Ok(Reply::Path(network.to_string()))
            }
            Request::SelectNetwork(target) => {
                let proxy = interface_proxy(conn, &path).await?;
                proxy.select_network(owned_path(&target)?).await?;
                Ok(Reply::None)
            }
            Request::RemoveNetwork(target) => {
                let proxy = interface_proxy(conn, &path).await?;
                proxy.remove_network(owned_path(&target)?).await?;
                Ok(Reply::None)
            }
            Request::RemoveAllNetworks => {
                interface_proxy(conn, &path)
                    .await?
                    .remove_all_networks()
                    .await?;
                Ok(Reply::None)
            }
            Request::AddBlob(name, data) => {
                interface_proxy(conn, &path)
                    .await?
                    .add_blob(&name, data)
                    .await?;
                Ok(Reply::None)
            }
            Request::RemoveBlob(name) => {
                interface_proxy(conn, &path)
                    .await?
                    .remove_blob(&name)
                    .await?;
                Ok(Reply::None)
            }
            Request::SetApScan(value) => {
                interface_proxy(conn, &path)
                    .await?
                    .set_ap_scan(value)
                    .await?;
                Ok(Reply::None)
            }
            Request::SetCountry(value) => {
                interface_proxy(conn, &path)
                    .await?
                    .set_country(&value)
                    .await?;
                Ok(Reply::None)
            }
            Request::WpsStart(args) => {
                let proxy = wps_proxy(conn, &path).await?;
                let reply = proxy.start(zv_args(&args)).await?;
                Ok(Reply::Dict(dict_from_map(&reply)))
            }
            Request::WpsCancel => {
                wps_proxy(conn, &path).await?.cancel().await?;
                Ok(Reply::None)
            }
            Request::SetEnabled(value) => {
                let proxy = WpasNetworkProxy::builder(conn)
                    .path(path.clone())?
                    .build()
                    .await?;
                proxy.set_enabled(value).await?;
                Ok(Reply::None)
            }
        }
    }
}

#[async_trait(?Send)]
impl Transport for DbusTransport {
    async fn request(&self, path: &str, request: Request) -> Result<Reply> {
        self.dispatch(path, request).await.map_err(|e| match e {
            Error::Dbus(e) => remote_or_dbus(e),
            other => other,
        })
    }

    async fn load(&self, path: &str, kind: ObjectKind) -> Result<Dict> {
        let proxy = PropertiesProxy::builder(&self.conn)
            .destination(SERVICE)?
            .path(object_path(path)?)?
            .build()
            .await?;
        let name = InterfaceName::try_from(interface_name(kind)).map_err(zbus::Error::from)?;
        let map = proxy
            .get_all(name)
            .await
            .map_err(|e| remote_or_dbus(e.into()))?;
        Ok(dict_from_map(&map))
    }

    fn watch(&self, path: &str, kind: ObjectKind, observer: Observer) -> WatchId {
        let id = self.next_watch.get();
        self.next_watch.set(id + 1);
        let token = CancellationToken::new();
        self.watches.borrow_mut().insert(id, token.clone());
        let conn = self.conn.clone();
        let path = path.to_string();
        tokio::task::spawn_local(async move {
            if let Err(e) = pump(conn, &path, kind, observer, token).await {
                error!("[{path}] signal pump failed: {e}");
            }
        });
        WatchId(id)
    }

    fn unwatch(&self, id: WatchId) {
        if let Some(token) = self.watches.borrow_mut().remove(&id.0) {
            token.cancel();
        }
    }
}

async fn interface_proxy<'a>(
    conn: &Connection,
    path: &ObjectPath<'a>,
) -> zbus::Result<WpasInterfaceProxy<'a>> {
    WpasInterfaceProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await
}

async fn wps_proxy<'a>(
    conn: &Connection,
    path: &ObjectPath<'a>,
) -> zbus::Result<WpasInterfaceWpsProxy<'a>> {
    WpasInterfaceWpsProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await
}

fn object_path(path: &str) -> Result<ObjectPath<'static>> {
    ObjectPath::try_from(path.to_string())
        .map_err(|_| Error::InvalidPath(path.to_string()))
}

fn owned_path(path: &str) -> Result<OwnedObjectPath> {
    Ok(object_path(path)?.into())
}

fn interface_name(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Supplicant => "fi.w1.wpa_supplicant1",
        ObjectKind::Interface => "fi.w1.wpa_supplicant1.Interface",
        ObjectKind::Bss => "fi.w1.wpa_supplicant1.BSS",
        ObjectKind::Network => "fi.w1.wpa_supplicant1.Network",
    }
}

/// Turns a method error carrying one of the service's registered error
/// names into the matching domain error.
fn remote_or_dbus(e: zbus::Error) -> Error {
    if let zbus::Error::MethodError(name, _, _) = &e
        && let Some(code) = RemoteError::from_name(name.as_str())
    {
        return Error::Remote(code);
    }
    Error::Dbus(e)
}

/// Forwards the signal streams relevant for one watched object to its
/// observer until the watch is dropped.
async fn pump(
    conn: Connection,
    path: &str,
    kind: ObjectKind,
    observer: Observer,
    token: CancellationToken,
) -> zbus::Result<()> {
    let mut streams: Vec<LocalBoxStream<'static, BusEvent>> = Vec::new();

    let props = PropertiesProxy::builder(&conn)
        .destination(SERVICE)?
        .path(path.to_string())?
        .build()
        .await?;
    let changed = props.receive_properties_changed().await?;
    streams.push(
        changed
            .flat_map(|signal| stream::iter(properties_events(&signal)))
            .boxed_local(),
    );

    match kind {
        ObjectKind::Supplicant => {
            let root = WpasProxy::new(&conn).await?;
            streams.push(
                root.receive_interface_added()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args()
                                .ok()
                                .map(|a| BusEvent::InterfaceAdded(a.path.to_string())),
                        )
                    })
                    .boxed_local(),
            );
            streams.push(
                root.receive_interface_removed()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args()
                                .ok()
                                .map(|a| BusEvent::InterfaceRemoved(a.path.to_string())),
                        )
                    })
                    .boxed_local(),
            );
            let bus = DBusProxy::new(&conn).await?;
            streams.push(
                bus.receive_name_owner_changed()
                    .await?
                    .filter_map(|s| {
                        let event = s.args().ok().and_then(|a| {
                            (a.name == SERVICE)
                                .then(|| BusEvent::OwnerChanged(a.new_owner.is_some()))
                        });
                        futures::future::ready(event)
                    })
                    .boxed_local(),
            );
        }
        ObjectKind::Interface => {
            let iface = WpasInterfaceProxy::builder(&conn)
                .path(path.to_string())?
                .build()
                .await?;
            streams.push(
                iface
                    .receive_bss_added()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args().ok().map(|a| BusEvent::BssAdded(a.path.to_string())),
                        )
                    })
                    .boxed_local(),
            );
            streams.push(
                iface
                    .receive_bss_removed()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args()
                                .ok()
                                .map(|a| BusEvent::BssRemoved(a.path.to_string())),
                        )
                    })
                    .boxed_local(),
            );
            streams.push(
                iface
                    .receive_network_added()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args()
                                .ok()
                                .map(|a| BusEvent::NetworkAdded(a.path.to_string())),
                        )
                    })
                    .boxed_local(),
            );
            streams.push(
                iface
                    .receive_network_removed()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args()
                                .ok()
                                .map(|a| BusEvent::NetworkRemoved(a.path.to_string())),
                        )
                    })
                    .boxed_local(),
            );
            streams.push(
                iface
                    .receive_network_selected()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args()
                                .ok()
                                .map(|a| BusEvent::NetworkSelected(a.path.to_string())),
                        )
                    })
                    .boxed_local(),
            );
            streams.push(
                iface
                    .receive_sta_authorized()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args().ok().map(|a| BusEvent::StaAuthorized(a.name)),
                        )
                    })
                    .boxed_local(),
            );
            streams.push(
                iface
                    .receive_sta_deauthorized()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args().ok().map(|a| BusEvent::StaDeauthorized(a.name)),
                        )
                    })
                    .boxed_local(),
            );
            let wps = WpasInterfaceWpsProxy::builder(&conn)
                .path(path.to_string())?
                .build()
                .await?;
            streams.push(
                wps.receive_event()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(s.args().ok().map(|a| {
                            BusEvent::WpsEvent(a.event_type, dict_from_map(&a.args))
                        }))
                    })
                    .boxed_local(),
            );
            streams.push(
                wps.receive_credentials()
                    .await?
                    .filter_map(|s| {
                        futures::future::ready(
                            s.args()
                                .ok()
                                .map(|a| BusEvent::WpsCredentials(dict_from_map(&a.args))),
                        )
                    })
                    .boxed_local(),
            );
        }
        ObjectKind::Bss | ObjectKind::Network => {}
    }

    let mut events = stream::select_all(streams);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            event = events.next() => match event {
                Some(event) => observer(&event),
                None => return Ok(()),
            }
        }
    }
}

fn properties_events(signal: &PropertiesChanged) -> Vec<BusEvent> {
    let mut events = Vec::new();
    match signal.args() {
        Ok(args) => {
            let changed: Dict = args
                .changed_properties
                .iter()
                .filter_map(|(key, value)| {
                    value_from_zv(value).map(|value| (key.to_string(), value))
                })
                .collect();
            if !changed.is_empty() {
                events.push(BusEvent::PropertiesChanged(changed));
            }
            if !args.invalidated_properties.is_empty() {
                events.push(BusEvent::PropertiesInvalidated(
                    args.invalidated_properties
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ));
            }
        }
        Err(e) => warn!("Failed to parse PropertiesChanged args: {e}"),
    }
    events
}

/// Converts a property snapshot coming off the bus.
pub(crate) fn dict_from_map(map: &HashMap<String, OwnedValue>) -> Dict {
    map.iter()
        .filter_map(|(key, value)| value_from_zv(value).map(|value| (key.clone(), value)))
        .collect()
}

/// Converts one zvariant value into the transport-neutral form. Types the
/// model has no use for are dropped with a warning.
fn value_from_zv(value: &Zv<'_>) -> Option<Value> {
    match value {
        Zv::Bool(b) => Some(Value::Bool(*b)),
        Zv::U16(n) => Some(Value::U16(*n)),
        Zv::I16(n) => Some(Value::I16(*n)),
        Zv::U32(n) => Some(Value::U32(*n)),
        Zv::I32(n) => Some(Value::I32(*n)),
        Zv::Str(s) => Some(Value::Str(s.to_string())),
        Zv::ObjectPath(p) => Some(Value::Str(p.to_string())),
        Zv::Value(inner) => value_from_zv(inner),
        Zv::Array(array) => array_from_zv(array),
        Zv::Dict(dict) => {
            let map: HashMap<String, OwnedValue> = dict.try_clone().ok()?.try_into().ok()?;
            Some(Value::Dict(dict_from_map(&map)))
        }
        other => {
            warn!("Unexpected value type {other:?}");
            None
        }
    }
}

fn array_from_zv(array: &zvariant::Array<'_>) -> Option<Value> {
    match array.element_signature().to_string().as_str() {
        "y" => Some(Value::Bytes(
            array
                .iter()
                .filter_map(|v| match v {
                    Zv::U8(b) => Some(*b),
                    _ => None,
                })
                .collect(),
        )),
        "s" => Some(Value::StrList(
            array
                .iter()
                .filter_map(|v| match v {
                    Zv::Str(s) => Some(s.to_string()),
                    _ => None,
                })
                .collect(),
        )),
        "o" => Some(Value::StrList(
            array
                .iter()
                .filter_map(|v| match v {
                    Zv::ObjectPath(p) => Some(p.to_string()),
                    _ => None,
                })
                .collect(),
        )),
        "u" => Some(Value::U32List(
            array
                .iter()
                .filter_map(|v| match v {
                    Zv::U32(n) => Some(*n),
                    _ => None,
                })
                .collect(),
        )),
        "ay" => Some(Value::ByteArrays(
            array
                .iter()
                .filter_map(|v| match value_from_zv(v) {
                    Some(Value::Bytes(bytes)) => Some(bytes),
                    _ => None,
                })
                .collect(),
        )),
        other => {
            warn!("Unexpected array element type {other}");
            None
        }
    }
}

/// Converts an argument dictionary into the borrowed form the proxy
/// methods take.
fn zv_args(dict: &Dict) -> HashMap<&str, Zv<'_>> {
    dict.iter()
        .map(|(key, value)| (key.as_str(), zv_from_value(value)))
        .collect()
}

fn zv_from_value(value: &Value) -> Zv<'static> {
    match value {
        Value::Bool(b) => Zv::from(*b),
        Value::U16(n) => Zv::from(*n),
        Value::I16(n) => Zv::from(*n),
        Value::U32(n) => Zv::from(*n),
        Value::I32(n) => Zv::from(*n),
        Value::Str(s) => Zv::from(s.clone()),
        Value::Bytes(bytes) => Zv::from(bytes.clone()),
        Value::StrList(list) => Zv::from(list.clone()),
        Value::ByteArrays(list) => Zv::from(list.clone()),
        Value::U32List(list) => Zv::from(list.clone()),
        Value::U32Pairs(list) => Zv::from(list.clone()),
        Value::Dict(dict) => {
            let map: HashMap<String, Zv<'static>> = dict
                .iter()
                .map(|(key, value)| (key.clone(), zv_from_value(value)))
                .collect();
            Zv::from(map)
        }
    }
}
