//! The root supplicant proxy.
//!
//! One `Supplicant` mirrors the remote service's root object: global
//! capabilities, the supported EAP methods and the list of interface paths.
//! It also owns the interning registries for every other proxy kind, so
//! object identity is scoped to the root handle rather than to the process.
//!
//! Validity of the root object tracks whether the remote service currently
//! has an owner on the bus; everything below it cascades from here.

use log::{debug, error};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::bss::{Bss, BssInner};
use crate::dict::Dict;
use crate::envelope;
use crate::interface::{Interface, InterfaceInner};
use crate::models::{
    CAP_NAMES, Caps, CreateInterfaceParams, EAP_METHOD_NAMES, EapMethods, Error, RemoteError,
    bits_from_names,
};
use crate::network::{Network, NetworkInner};
use crate::notify::{HandlerId, HandlerList, flush_pending, properties};
use crate::registry::Registry;
use crate::transport::{
    BusEvent, ObjectKind, Request, Transport, WatchGuard, is_object_path, parent_path,
};

/// Path of the root object.
pub const SUPPLICANT_PATH: &str = "/fi/w1/wpa_supplicant1";

properties! {
    /// Observable properties of the root supplicant object.
    pub enum SupplicantProperty {
        Valid,
        Capabilities,
        EapMethods,
        Interfaces,
    }
}

pub(crate) struct SupplicantInner {
    transport: Rc<dyn Transport>,
    resolved: Cell<bool>,
    owned: Cell<bool>,
    valid: Cell<bool>,
    caps: Cell<Caps>,
    eap_methods: Cell<EapMethods>,
    interfaces: RefCell<Vec<String>>,
    pending: Cell<u32>,
    handlers: HandlerList<Supplicant, SupplicantProperty>,
    watch: RefCell<Option<WatchGuard>>,
    pub(crate) interface_registry: Registry<InterfaceInner>,
    pub(crate) bss_registry: Registry<BssInner>,
    pub(crate) network_registry: Registry<NetworkInner>,
}

/// Client-side model of the remote supplicant service.
///
/// Handles are cheap to clone and all clones share one cached state. The
/// crate is single-threaded: create the handle on a current-thread Tokio
/// runtime inside a `LocalSet` (background resolution runs on local tasks).
#[derive(Clone)]
pub struct Supplicant {
    pub(crate) inner: Rc<SupplicantInner>,
}

impl Supplicant {
    /// Creates a root proxy on top of an abstract transport. The proxy
    /// starts invalid and becomes valid once the remote state has been
    /// fetched.
    pub fn with_transport(transport: Rc<dyn Transport>) -> Self {
        let this = Supplicant {
            inner: Rc::new(SupplicantInner {
                transport,
                resolved: Cell::new(false),
                owned: Cell::new(false),
                valid: Cell::new(false),
                caps: Cell::new(Caps::empty()),
                eap_methods: Cell::new(EapMethods::empty()),
                interfaces: RefCell::new(Vec::new()),
                pending: Cell::new(0),
                handlers: HandlerList::new(),
                watch: RefCell::new(None),
                interface_registry: Registry::new(),
                bss_registry: Registry::new(),
                network_registry: Registry::new(),
            }),
        };
        this.start();
        this
    }

    /// Connects to the system bus and returns a root proxy backed by it.
    pub async fn system() -> Result<Self> {
        let transport = crate::dbus::DbusTransport::system().await?;
        Ok(Self::with_transport(Rc::new(transport)))
    }

    fn start(&self) {
        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.transport.watch(
            SUPPLICANT_PATH,
            ObjectKind::Supplicant,
            Rc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    Supplicant { inner }.handle_event(event);
                }
            }),
        );
        *self.inner.watch.borrow_mut() =
            Some(WatchGuard::new(Rc::clone(&self.inner.transport), id));

        let this = self.clone();
        tokio::task::spawn_local(async move {
            this.resolve().await;
        });
    }

    async fn resolve(self) {
        match self
            .inner
            .transport
            .load(SUPPLICANT_PATH, ObjectKind::Supplicant)
            .await
        {
            Ok(props) => {
                self.inner.resolved.set(true);
                self.inner.owned.set(true);
                self.update_valid();
                self.apply_properties(&props);
                self.flush();
            }
            Err(e) => error!("Failed to attach to the supplicant service: {e}"),
        }
    }

    fn handle_event(&self, event: &BusEvent) {
        match event {
            BusEvent::OwnerChanged(true) => {
                self.inner.owned.set(true);
                let this = self.clone();
                tokio::task::spawn_local(async move {
                    match this
                        .inner
                        .transport
                        .load(SUPPLICANT_PATH, ObjectKind::Supplicant)
                        .await
                    {
                        Ok(props) => {
                            this.inner.resolved.set(true);
                            this.update_valid();
                            this.apply_properties(&props);
                            this.flush();
                        }
                        Err(e) => error!("Failed to refresh the supplicant service: {e}"),
                    }
                });
            }
            BusEvent::OwnerChanged(false) => {
                self.inner.owned.set(false);
                self.update_valid();
                self.update_caps(Caps::empty());
                self.update_eap_methods(EapMethods::empty());
                self.update_interfaces(&[]);
                self.flush();
            }
            BusEvent::PropertiesChanged(props) => {
                self.apply_properties(props);
                self.flush();
            }
            BusEvent::InterfaceAdded(path) => {
                debug!("Interface added: {path}");
                let mut interfaces = self.inner.interfaces.borrow_mut();
                if !interfaces.iter().any(|p| p == path) {
                    interfaces.push(path.clone());
                    drop(interfaces);
                    self.mark(SupplicantProperty::Interfaces);
                    self.flush();
                }
            }
            BusEvent::InterfaceRemoved(path) => {
                debug!("Interface removed: {path}");
                let mut interfaces = self.inner.interfaces.borrow_mut();
                if let Some(pos) = interfaces.iter().position(|p| p == path) {
                    interfaces.remove(pos);
                    drop(interfaces);
                    self.mark(SupplicantProperty::Interfaces);
                    self.flush();
                }
            }
            _ => {}
        }
    }

    fn apply_properties(&self, props: &Dict) {
        if let Some(names) = props.str_list_value("Capabilities") {
            self.update_caps(bits_from_names("Capabilities", names, CAP_NAMES));
        }
        if let Some(names) = props.str_list_value("EapMethods") {
            self.update_eap_methods(bits_from_names("EapMethods", names, EAP_METHOD_NAMES));
        }
        if let Some(paths) = props.str_list_value("Interfaces") {
            self.update_interfaces(paths);
        }
    }

    fn mark(&self, prop: SupplicantProperty) {
        use crate::notify::Property;
        self.inner.pending.set(self.inner.pending.get() | prop.bit());
    }

    fn update_valid(&self) {
        let valid = self.inner.resolved.get() && self.inner.owned.get();
        if self.inner.valid.get() != valid {
            self.inner.valid.set(valid);
            debug!(
                "Supplicant is {}valid",
                if valid { "" } else { "in" }
            );
            self.mark(SupplicantProperty::Valid);
        }
    }

    fn update_caps(&self, caps: Caps) {
        if self.inner.caps.get() != caps {
            self.inner.caps.set(caps);
            self.mark(SupplicantProperty::Capabilities);
        }
    }

    fn update_eap_methods(&self, methods: EapMethods) {
        if self.inner.eap_methods.get() != methods {
            self.inner.eap_methods.set(methods);
            self.mark(SupplicantProperty::EapMethods);
        }
    }

    fn update_interfaces(&self, paths: &[String]) {
        let changed = *self.inner.interfaces.borrow() != paths;
        if changed {
            *self.inner.interfaces.borrow_mut() = paths.to_vec();
            self.mark(SupplicantProperty::Interfaces);
        }
    }

    fn flush(&self) {
        flush_pending(
            self,
            &self.inner.pending,
            self.inner.valid.get(),
            &self.inner.handlers,
        );
    }

    /// True while the remote service is reachable and its state has been
    /// mirrored locally.
    pub fn valid(&self) -> bool {
        self.inner.valid.get()
    }

    pub fn caps(&self) -> Caps {
        self.inner.caps.get()
    }

    pub fn eap_methods(&self) -> EapMethods {
        self.inner.eap_methods.get()
    }

    /// Paths of the interfaces currently managed by the service.
    pub fn interfaces(&self) -> Vec<String> {
        self.inner.interfaces.borrow().clone()
    }

    pub(crate) fn transport(&self) -> &Rc<dyn Transport> {
        &self.inner.transport
    }

    pub(crate) fn interfaces_contain(&self, path: &str) -> bool {
        self.inner.interfaces.borrow().iter().any(|p| p == path)
    }

    /// Subscribes to property changes. With a filter the handler fires for
    /// that property only; without one it fires for every change.
    pub fn add_property_handler(
        &self,
        filter: Option<SupplicantProperty>,
        handler: impl Fn(&Supplicant, SupplicantProperty) + 'static,
    ) -> HandlerId {
        self.inner.handlers.add(filter, handler)
    }

    pub fn remove_handler(&self, id: HandlerId) {
        self.inner.handlers.remove(id);
    }

    async fn call(&self, cancel: &CancellationToken, request: Request) -> Result<crate::transport::Reply> {
        if !self.valid() {
            return Err(Error::NotValid);
        }
        let transport = Rc::clone(&self.inner.transport);
        envelope::issue(self, cancel, async move {
            transport.request(SUPPLICANT_PATH, request).await
        })
        .await
    }

    /// Asks the service to start managing a new interface and returns the
    /// path of the created object.
    pub async fn create_interface(&self, params: &CreateInterfaceParams) -> Result<String> {
        self.create_interface_full(params, &CancellationToken::new())
            .await
    }

    pub async fn create_interface_full(
        &self,
        params: &CreateInterfaceParams,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut args = Dict::new();
        args.add_str("Ifname", &params.ifname);
        args.add_str0("BridgeIfname", params.bridge_ifname.as_deref());
        args.add_str0("Driver", params.driver.as_deref());
        args.add_str0("ConfigFile", params.config_file.as_deref());
        self.call(cancel, Request::CreateInterface(args))
            .await?
            .into_path()
            .ok_or(Error::Remote(RemoteError::UnknownError))
    }

    /// Asks the service to stop managing the interface at `path`.
    pub async fn remove_interface(&self, path: &str) -> Result<()> {
        self.remove_interface_full(path, &CancellationToken::new())
            .await
    }

    pub async fn remove_interface_full(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !is_object_path(path) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        self.call(cancel, Request::RemoveInterface(path.to_string()))
            .await
            .map(|_| ())
    }

    /// Resolves an interface name (e.g. "wlan0") to its object path.
    pub async fn get_interface(&self, ifname: &str) -> Result<String> {
        self.get_interface_full(ifname, &CancellationToken::new())
            .await
    }

    pub async fn get_interface_full(
        &self,
        ifname: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.call(cancel, Request::GetInterface(ifname.to_string()))
            .await?
            .into_path()
            .ok_or(Error::Remote(RemoteError::InterfaceUnknown))
    }

    /// Returns the canonical interface proxy for `path`, creating and
    /// resolving it if this is the first lookup. The proxy starts invalid.
    pub fn interface(&self, path: &str) -> Interface {
        let (inner, created) = self
            .inner
            .interface_registry
            .get_or_create(path, || InterfaceInner::new(self.clone(), path));
        let iface = Interface { inner };
        if created {
            iface.start();
        }
        iface
    }

    /// Returns the canonical network proxy for `path`. The owning
    /// interface is derived by stripping the two trailing path segments.
    pub fn network(&self, path: &str) -> Result<Network> {
        let parent = parent_path(path)
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?
            .to_string();
        let iface = self.interface(&parent);
        let (inner, created) = self
            .inner
            .network_registry
            .get_or_create(path, || NetworkInner::new(iface.clone(), path));
        let network = Network { inner };
        if created {
            network.start();
        }
        Ok(network)
    }

    /// Returns the canonical BSS proxy for `path`, analogous to
    /// [`Supplicant::network`].
    pub fn bss(&self, path: &str) -> Result<Bss> {
        let parent = parent_path(path)
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?
            .to_string();
        let iface = self.interface(&parent);
        let (inner, created) = self
            .inner
            .bss_registry
            .get_or_create(path, || BssInner::new(iface.clone(), path));
        let bss = Bss { inner };
        if created {
            bss.start();
        }
        Ok(bss)
    }
}
