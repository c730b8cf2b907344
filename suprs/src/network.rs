//! The configured-network proxy.
//!
//! Mirrors one `Networks/<n>` object below an interface: the opaque
//! string/string property dictionary and the `Enabled` flag. Validity and
//! presence cascade from the owning interface.

use log::{debug, error, trace};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::dict::Dict;
use crate::envelope;
use crate::interface::{Interface, InterfaceProperty};
use crate::models::Error;
use crate::notify::{HandlerId, HandlerList, flush_pending, properties};
use crate::transport::{BusEvent, ObjectKind, Request, Transport, WatchGuard};

properties! {
    /// Observable properties of a network proxy.
    pub enum NetworkProperty {
        Valid,
        Present,
        Properties,
        Enabled,
    }
}

pub(crate) struct NetworkInner {
    path: String,
    iface: Interface,
    transport: Rc<dyn Transport>,
    resolved: Cell<bool>,
    valid: Cell<bool>,
    present: Cell<bool>,
    properties: RefCell<HashMap<String, String>>,
    enabled: Cell<bool>,
    pending: Cell<u32>,
    handlers: HandlerList<Network, NetworkProperty>,
    watch: RefCell<Option<WatchGuard>>,
    iface_handlers: RefCell<Vec<HandlerId>>,
}

impl NetworkInner {
    pub(crate) fn new(iface: Interface, path: &str) -> Rc<Self> {
        let transport = Rc::clone(iface.supplicant().transport());
        Rc::new(Self {
            path: path.to_string(),
            iface,
            transport,
            resolved: Cell::new(false),
            valid: Cell::new(false),
            present: Cell::new(false),
            properties: RefCell::new(HashMap::new()),
            enabled: Cell::new(false),
            pending: Cell::new(0),
            handlers: HandlerList::new(),
            watch: RefCell::new(None),
            iface_handlers: RefCell::new(Vec::new()),
        })
    }
}

impl Drop for NetworkInner {
    fn drop(&mut self) {
        for id in self.iface_handlers.borrow_mut().drain(..) {
            self.iface.remove_handler(id);
        }
    }
}

/// Proxy for one configured network below an interface.
#[derive(Clone)]
pub struct Network {
    pub(crate) inner: Rc<NetworkInner>,
}

impl Network {
    pub(crate) fn start(&self) {
        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.transport.watch(
            &self.inner.path,
            ObjectKind::Network,
            Rc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    Network { inner }.handle_event(event);
                }
            }),
        );
        *self.inner.watch.borrow_mut() =
            Some(WatchGuard::new(Rc::clone(&self.inner.transport), id));

        let weak = Rc::downgrade(&self.inner);
        let valid_id = self.inner.iface.add_property_handler(
            Some(InterfaceProperty::Valid),
            move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    let network = Network { inner };
                    network.update_valid();
                    network.update_present();
                    network.flush();
                }
            },
        );
        let weak = Rc::downgrade(&self.inner);
        let list_id = self.inner.iface.add_property_handler(
            Some(InterfaceProperty::Networks),
            move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    let network = Network { inner };
                    network.update_present();
                    network.flush();
                }
            },
        );
        *self.inner.iface_handlers.borrow_mut() = vec![valid_id, list_id];

        let this = self.clone();
        tokio::task::spawn_local(async move {
            this.resolve().await;
        });
    }

    async fn resolve(self) {
        match self
            .inner
            .transport
            .load(&self.inner.path, ObjectKind::Network)
            .await
        {
            Ok(props) => {
                self.inner.resolved.set(true);
                self.update_valid();
                self.update_present();
                self.apply_properties(&props);
                self.flush();
            }
            Err(e) => error!("[{}] {e}", self.inner.path),
        }
    }

    fn handle_event(&self, event: &BusEvent) {
        match event {
            BusEvent::PropertiesChanged(props) => {
                self.apply_properties(props);
                self.flush();
            }
            BusEvent::PropertiesInvalidated(names) => {
                for name in names {
                    match name.as_str() {
                        "Properties" => {
                            if !self.inner.properties.borrow().is_empty() {
                                self.inner.properties.borrow_mut().clear();
                                self.mark(NetworkProperty::Properties);
                            }
                        }
                        "Enabled" => {
                            if self.inner.enabled.get() {
                                self.inner.enabled.set(false);
                                self.mark(NetworkProperty::Enabled);
                            }
                        }
                        _ => {}
                    }
                }
                self.flush();
            }
            _ => {}
        }
    }

    fn apply_properties(&self, props: &Dict) {
        if let Some(dict) = props.dict_value("Properties") {
            self.update_properties(dict.to_string_map());
        }
        if let Some(enabled) = props.bool_value("Enabled") {
            self.update_enabled(enabled);
        }
    }

    fn mark(&self, prop: NetworkProperty) {
        use crate::notify::Property;
        self.inner.pending.set(self.inner.pending.get() | prop.bit());
    }

    fn update_valid(&self) {
        let valid = self.inner.resolved.get() && self.inner.iface.valid();
        if self.inner.valid.get() != valid {
            self.inner.valid.set(valid);
            debug!(
                "Network {} is {}valid",
                self.inner.path,
                if valid { "" } else { "in" }
            );
            self.mark(NetworkProperty::Valid);
        }
    }

    fn update_present(&self) {
        let present = self.inner.resolved.get()
            && self.inner.iface.valid()
            && self.inner.iface.networks_contain(&self.inner.path);
        if self.inner.present.get() != present {
            self.inner.present.set(present);
            debug!(
                "Network {} is {}present",
                self.inner.path,
                if present { "" } else { "not " }
            );
            self.mark(NetworkProperty::Present);
        }
    }

    fn update_properties(&self, props: HashMap<String, String>) {
        let changed = *self.inner.properties.borrow() != props;
        if changed {
            *self.inner.properties.borrow_mut() = props;
            self.mark(NetworkProperty::Properties);
        }
    }

    fn update_enabled(&self, enabled: bool) {
        if self.inner.enabled.get() != enabled {
            self.inner.enabled.set(enabled);
            trace!("[{}] Enabled: {enabled}", self.inner.path);
            self.mark(NetworkProperty::Enabled);
        }
    }

    pub(crate) fn flush(&self) {
        flush_pending(
            self,
            &self.inner.pending,
            self.inner.valid.get(),
            &self.inner.handlers,
        );
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn interface(&self) -> &Interface {
        &self.inner.iface
    }

    /// True while the remote handle resolved and the owning interface is
    /// valid.
    pub fn valid(&self) -> bool {
        self.inner.valid.get()
    }

    /// True while this network's path is listed in the owning interface's
    /// network collection.
    pub fn present(&self) -> bool {
        self.inner.present.get()
    }

    /// The network's configuration dictionary (string values only).
    pub fn properties(&self) -> HashMap<String, String> {
        self.inner.properties.borrow().clone()
    }

    pub fn enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    /// Subscribes to property changes. With a filter the handler fires for
    /// that property only; without one it fires for every change.
    pub fn add_property_handler(
        &self,
        filter: Option<NetworkProperty>,
        handler: impl Fn(&Network, NetworkProperty) + 'static,
    ) -> HandlerId {
        self.inner.handlers.add(filter, handler)
    }

    pub fn remove_handler(&self, id: HandlerId) {
        self.inner.handlers.remove(id);
    }

    /// Enables or disables this network configuration.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.set_enabled_full(enabled, &CancellationToken::new())
            .await
    }

    pub async fn set_enabled_full(&self, enabled: bool, cancel: &CancellationToken) -> Result<()> {
        if !self.valid() {
            return Err(Error::NotValid);
        }
        let transport = Rc::clone(&self.inner.transport);
        let path = self.inner.path.clone();
        envelope::issue(self, cancel, async move {
            transport.request(&path, Request::SetEnabled(enabled)).await
        })
        .await
        .map(|_| ())
    }
}
