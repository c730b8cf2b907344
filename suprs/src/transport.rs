//! The abstract RPC bus boundary.
//!
//! The supplicant is modeled as a tree of remote objects addressed by
//! hierarchical path strings, reachable through three primitives: a
//! request/response call, a full property snapshot, and a signal watch.
//! [`Transport`] captures exactly that surface so the object model and the
//! orchestrators can be driven by the real D-Bus backend ([`crate::dbus`])
//! or by a scripted double in tests. Events are dispatched synchronously;
//! per-object change notification ordering relies on that.

use async_trait::async_trait;
use std::rc::Rc;

use crate::Result;
use crate::dict::Dict;

/// The kind of remote object living at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Supplicant,
    Interface,
    Bss,
    Network,
}

/// One request addressed to a remote object.
#[derive(Debug, Clone)]
pub enum Request {
    // Root object
    CreateInterface(Dict),
    RemoveInterface(String),
    GetInterface(String),
    // Interface object
    Scan(Dict),
    Disconnect,
    Reassociate,
    Reconnect,
    Reattach,
    AutoScan(String),
    FlushBss(u32),
    SignalPoll,
    AddNetwork(Dict),
    SelectNetwork(String),
    RemoveNetwork(String),
    RemoveAllNetworks,
    AddBlob(String, Vec<u8>),
    RemoveBlob(String),
    SetApScan(u32),
    SetCountry(String),
    // WPS sub-object of an interface
    WpsStart(Dict),
    WpsCancel,
    // Network object
    SetEnabled(bool),
}

impl Request {
    /// Method name, for logging and request matching.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateInterface(_) => "CreateInterface",
            Self::RemoveInterface(_) => "RemoveInterface",
            Self::GetInterface(_) => "GetInterface",
            Self::Scan(_) => "Scan",
            Self::Disconnect => "Disconnect",
            Self::Reassociate => "Reassociate",
            Self::Reconnect => "Reconnect",
            Self::Reattach => "Reattach",
            Self::AutoScan(_) => "AutoScan",
            Self::FlushBss(_) => "FlushBSS",
            Self::SignalPoll => "SignalPoll",
            Self::AddNetwork(_) => "AddNetwork",
            Self::SelectNetwork(_) => "SelectNetwork",
            Self::RemoveNetwork(_) => "RemoveNetwork",
            Self::RemoveAllNetworks => "RemoveAllNetworks",
            Self::AddBlob(..) => "AddBlob",
            Self::RemoveBlob(_) => "RemoveBlob",
            Self::SetApScan(_) => "SetApScan",
            Self::SetCountry(_) => "SetCountry",
            Self::WpsStart(_) => "WPS.Start",
            Self::WpsCancel => "WPS.Cancel",
            Self::SetEnabled(_) => "SetEnabled",
        }
    }
}

/// Response to a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    None,
    Path(String),
    Dict(Dict),
}

impl Reply {
    pub fn into_path(self) -> Option<String> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_dict(self) -> Option<Dict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }
}

/// A signal delivered for a watched path.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// The remote service gained or lost its bus owner (root path only).
    OwnerChanged(bool),
    /// A batch of changed property values.
    PropertiesChanged(Dict),
    /// Properties whose cached value is no longer valid.
    PropertiesInvalidated(Vec<String>),
    InterfaceAdded(String),
    InterfaceRemoved(String),
    BssAdded(String),
    BssRemoved(String),
    NetworkAdded(String),
    NetworkRemoved(String),
    NetworkSelected(String),
    StaAuthorized(String),
    StaDeauthorized(String),
    /// WPS session event: type string plus arguments.
    WpsEvent(String, Dict),
    /// WPS credentials delivery.
    WpsCredentials(Dict),
}

/// Signal observer registered for one path. Dispatch is synchronous and
/// re-entrant observer code must tolerate being called while it holds no
/// other references to the object it watches.
pub type Observer = Rc<dyn Fn(&BusEvent)>;

/// Identifies one watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchId(pub u64);

/// The remote service seen as an opaque request/response/signal transport.
#[async_trait(?Send)]
pub trait Transport: 'static {
    /// Issues one request to the object at `path`.
    async fn request(&self, path: &str, request: Request) -> Result<Reply>;

    /// Fetches the full property snapshot of the object at `path`.
    async fn load(&self, path: &str, kind: ObjectKind) -> Result<Dict>;

    /// Starts delivering signals for `path` to `observer`.
    fn watch(&self, path: &str, kind: ObjectKind, observer: Observer) -> WatchId;

    /// Stops a watch. Unknown ids are ignored.
    fn unwatch(&self, id: WatchId);
}

/// Removes a watch registration when dropped.
pub(crate) struct WatchGuard {
    transport: Rc<dyn Transport>,
    id: WatchId,
}

impl WatchGuard {
    pub(crate) fn new(transport: Rc<dyn Transport>, id: WatchId) -> Self {
        Self { transport, id }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.transport.unwatch(self.id);
    }
}

/// Checks the shape of an object path: absolute, no empty segments, only
/// `[A-Za-z0-9_]` in each segment.
pub(crate) fn is_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    !rest.is_empty()
        && rest.split('/').all(|seg| {
            !seg.is_empty()
                && seg
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        })
}

/// Derives a child object's parent path by stripping the two trailing path
/// segments (the collection name and the child id).
pub(crate) fn parent_path(path: &str) -> Option<&str> {
    let mut idx = path.len();
    for _ in 0..2 {
        idx = path[..idx].rfind('/')?;
    }
    (idx > 0).then(|| &path[..idx])
}
