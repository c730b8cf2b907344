//! The per-radio interface proxy.
//!
//! Mirrors one `Interfaces/<n>` object: connection state, scan state,
//! identification strings, the current association, the BSS and network
//! collections and the station list. An interface is valid while its own
//! remote handle resolved and the root supplicant is valid; it is present
//! while its path is still listed in the root's interface collection.

use log::{debug, error, trace, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::bss::Bss;
use crate::dict::Dict;
use crate::envelope;
use crate::models::{
    AUTH_ALG_NAMES, CIPHER_NAMES, Error, InterfaceCaps, InterfaceState, KEYMGMT_NAMES,
    MODE_CAP_NAMES, PROTOCOL_NAMES, SCAN_CAP_NAMES, ScanParams, ScanType, SignalPoll,
    WpsCredentials, bits_from_names,
};
use crate::network::Network;
use crate::notify::{HandlerId, HandlerList, flush_pending, properties};
use crate::supplicant::{Supplicant, SupplicantProperty};
use crate::transport::{
    BusEvent, ObjectKind, Reply, Request, Transport, WatchGuard, is_object_path,
};

properties! {
    /// Observable properties of an interface proxy.
    pub enum InterfaceProperty {
        Valid,
        Present,
        Caps,
        State,
        WpsCredentials,
        Scanning,
        ApScan,
        Country,
        Driver,
        Ifname,
        BridgeIfname,
        CurrentBss,
        CurrentNetwork,
        Bsss,
        Networks,
        ScanInterval,
        Stations,
    }
}

pub(crate) struct InterfaceInner {
    path: String,
    supplicant: Supplicant,
    transport: Rc<dyn Transport>,
    resolved: Cell<bool>,
    valid: Cell<bool>,
    present: Cell<bool>,
    caps: Cell<InterfaceCaps>,
    state: Cell<InterfaceState>,
    scanning: Cell<bool>,
    ap_scan: Cell<u32>,
    scan_interval: Cell<i32>,
    country: RefCell<Option<String>>,
    driver: RefCell<Option<String>>,
    ifname: RefCell<Option<String>>,
    bridge_ifname: RefCell<Option<String>>,
    current_bss: RefCell<Option<String>>,
    current_network: RefCell<Option<String>>,
    bsss: RefCell<Vec<String>>,
    networks: RefCell<Vec<String>>,
    stations: RefCell<Vec<String>>,
    wps_credentials: RefCell<Option<WpsCredentials>>,
    pending: Cell<u32>,
    handlers: HandlerList<Interface, InterfaceProperty>,
    watch: RefCell<Option<WatchGuard>>,
    supplicant_handlers: RefCell<Vec<HandlerId>>,
}

impl InterfaceInner {
    pub(crate) fn new(supplicant: Supplicant, path: &str) -> Rc<Self> {
        let transport = Rc::clone(supplicant.transport());
        Rc::new(Self {
            path: path.to_string(),
            supplicant,
            transport,
            resolved: Cell::new(false),
            valid: Cell::new(false),
            present: Cell::new(false),
            caps: Cell::new(InterfaceCaps::default()),
            state: Cell::new(InterfaceState::Unknown),
            scanning: Cell::new(false),
            ap_scan: Cell::new(0),
            scan_interval: Cell::new(0),
            country: RefCell::new(None),
            driver: RefCell::new(None),
            ifname: RefCell::new(None),
            bridge_ifname: RefCell::new(None),
            current_bss: RefCell::new(None),
            current_network: RefCell::new(None),
            bsss: RefCell::new(Vec::new()),
            networks: RefCell::new(Vec::new()),
            stations: RefCell::new(Vec::new()),
            wps_credentials: RefCell::new(None),
            pending: Cell::new(0),
            handlers: HandlerList::new(),
            watch: RefCell::new(None),
            supplicant_handlers: RefCell::new(Vec::new()),
        })
    }
}

impl Drop for InterfaceInner {
    fn drop(&mut self) {
        for id in self.supplicant_handlers.borrow_mut().drain(..) {
            self.supplicant.remove_handler(id);
        }
    }
}

/// Proxy for one managed radio interface.
#[derive(Clone)]
pub struct Interface {
    pub(crate) inner: Rc<InterfaceInner>,
}

/// "/" on the bus means that there is no association at all.
fn association_path_filter(path: &str) -> Option<&str> {
    (path != "/").then_some(path)
}

impl Interface {
    pub(crate) fn start(&self) {
        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.transport.watch(
            &self.inner.path,
            ObjectKind::Interface,
            Rc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    Interface { inner }.handle_event(event);
                }
            }),
        );
        *self.inner.watch.borrow_mut() =
            Some(WatchGuard::new(Rc::clone(&self.inner.transport), id));

        let weak = Rc::downgrade(&self.inner);
        let valid_id = self.inner.supplicant.add_property_handler(
            Some(SupplicantProperty::Valid),
            move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    let iface = Interface { inner };
                    iface.update_valid();
                    iface.update_present();
                    iface.flush();
                }
            },
        );
        let weak = Rc::downgrade(&self.inner);
        let list_id = self.inner.supplicant.add_property_handler(
            Some(SupplicantProperty::Interfaces),
            move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    let iface = Interface { inner };
                    iface.update_present();
                    iface.flush();
                }
            },
        );
        *self.inner.supplicant_handlers.borrow_mut() = vec![valid_id, list_id];

        let this = self.clone();
        tokio::task::spawn_local(async move {
            this.resolve().await;
        });
    }

    async fn resolve(self) {
        match self
            .inner
            .transport
            .load(&self.inner.path, ObjectKind::Interface)
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
            BusEvent::BssAdded(path) => {
                if self.add_to_list(&self.inner.bsss, path) {
                    self.mark(InterfaceProperty::Bsss);
                    self.flush();
                }
            }
            BusEvent::BssRemoved(path) => {
                if self.remove_from_list(&self.inner.bsss, path) {
                    self.mark(InterfaceProperty::Bsss);
                    self.flush();
                }
            }
            BusEvent::NetworkAdded(path) => {
                if self.add_to_list(&self.inner.networks, path) {
                    self.mark(InterfaceProperty::Networks);
                    self.flush();
                }
            }
            BusEvent::NetworkRemoved(path) => {
                if self.remove_from_list(&self.inner.networks, path) {
                    self.mark(InterfaceProperty::Networks);
                    self.flush();
                }
            }
            BusEvent::NetworkSelected(path) => {
                debug!("[{}] Network selected: {path}", self.inner.path);
                self.update_current_network(association_path_filter(path));
                self.flush();
            }
            BusEvent::StaAuthorized(mac) => {
                debug!("Station authorized: {mac}");
                if self.add_to_list(&self.inner.stations, mac) {
                    self.mark(InterfaceProperty::Stations);
                    self.flush();
                }
            }
            BusEvent::StaDeauthorized(mac) => {
                debug!("Station deauthorized: {mac}");
                if self.remove_from_list(&self.inner.stations, mac) {
                    self.mark(InterfaceProperty::Stations);
                    self.flush();
                }
            }
            BusEvent::WpsCredentials(args) => {
                debug!("[{}] WPS credentials received", self.inner.path);
                self.store_wps_credentials(Some(crate::wps::parse_credentials(args)));
                self.flush();
            }
            _ => {}
        }
    }

    fn add_to_list(&self, list: &RefCell<Vec<String>>, value: &str) -> bool {
        let mut list = list.borrow_mut();
        if list.iter().any(|v| v == value) {
            false
        } else {
            list.push(value.to_string());
            true
        }
    }

    fn remove_from_list(&self, list: &RefCell<Vec<String>>, value: &str) -> bool {
        let mut list = list.borrow_mut();
        match list.iter().position(|v| v == value) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    fn apply_properties(&self, props: &Dict) {
        if let Some(caps) = props.dict_value("Capabilities") {
            self.update_caps(parse_interface_caps(caps));
        }
        if let Some(name) = props.str_value("State") {
            self.update_state(InterfaceState::from_name(name));
        }
        if let Some(b) = props.bool_value("Scanning") {
            self.update_scanning(b);
        }
        if let Some(n) = props.u32_value("ApScan") {
            self.update_ap_scan(n);
        }
        if let Some(n) = props.i32_value("ScanInterval") {
            self.update_scan_interval(n);
        }
        if let Some(s) = props.str_value("Country") {
            self.update_string(&self.inner.country, Some(s), InterfaceProperty::Country);
        }
        if let Some(s) = props.str_value("Driver") {
            self.update_string(&self.inner.driver, Some(s), InterfaceProperty::Driver);
        }
        if let Some(s) = props.str_value("Ifname") {
            self.update_string(&self.inner.ifname, Some(s), InterfaceProperty::Ifname);
        }
        if let Some(s) = props.str_value("BridgeIfname") {
            self.update_string(
                &self.inner.bridge_ifname,
                Some(s),
                InterfaceProperty::BridgeIfname,
            );
        }
        if let Some(s) = props.str_value("CurrentBSS") {
            self.update_string(
                &self.inner.current_bss,
                association_path_filter(s),
                InterfaceProperty::CurrentBss,
            );
        }
        if let Some(s) = props.str_value("CurrentNetwork") {
            self.update_current_network(association_path_filter(s));
        }
        if let Some(paths) = props.str_list_value("BSSs") {
            self.update_list(&self.inner.bsss, paths, InterfaceProperty::Bsss);
        }
        if let Some(paths) = props.str_list_value("Networks") {
            self.update_list(&self.inner.networks, paths, InterfaceProperty::Networks);
        }
    }

    fn mark(&self, prop: InterfaceProperty) {
        use crate::notify::Property;
        self.inner.pending.set(self.inner.pending.get() | prop.bit());
    }

    fn update_valid(&self) {
        let valid = self.inner.resolved.get() && self.inner.supplicant.valid();
        if self.inner.valid.get() != valid {
            self.inner.valid.set(valid);
            debug!(
                "Interface {} is {}valid",
                self.inner.path,
                if valid { "" } else { "in" }
            );
            self.mark(InterfaceProperty::Valid);
        }
    }

    fn update_present(&self) {
        let present = self.inner.resolved.get()
            && self.inner.supplicant.valid()
            && self.inner.supplicant.interfaces_contain(&self.inner.path);
        if self.inner.present.get() != present {
            self.inner.present.set(present);
            debug!(
                "Interface {} is {}present",
                self.inner.path,
                if present { "" } else { "not " }
            );
            self.mark(InterfaceProperty::Present);
        }
    }

    fn update_caps(&self, caps: InterfaceCaps) {
        if self.inner.caps.get() != caps {
            self.inner.caps.set(caps);
            self.mark(InterfaceProperty::Caps);
        }
    }

    fn update_state(&self, state: InterfaceState) {
        if self.inner.state.get() != state {
            self.inner.state.set(state);
            trace!("[{}] State: {state}", self.inner.path);
            self.mark(InterfaceProperty::State);
        }
    }

    fn update_scanning(&self, scanning: bool) {
        if self.inner.scanning.get() != scanning {
            self.inner.scanning.set(scanning);
            trace!("[{}] Scanning: {scanning}", self.inner.path);
            self.mark(InterfaceProperty::Scanning);
        }
    }

    fn update_ap_scan(&self, ap_scan: u32) {
        if self.inner.ap_scan.get() != ap_scan {
            self.inner.ap_scan.set(ap_scan);
            trace!("[{}] ApScan: {ap_scan}", self.inner.path);
            self.mark(InterfaceProperty::ApScan);
        }
    }

    fn update_scan_interval(&self, interval: i32) {
        if self.inner.scan_interval.get() != interval {
            self.inner.scan_interval.set(interval);
            trace!("[{}] ScanInterval: {interval}", self.inner.path);
            self.mark(InterfaceProperty::ScanInterval);
        }
    }

    fn update_string(
        &self,
        slot: &RefCell<Option<String>>,
        value: Option<&str>,
        prop: InterfaceProperty,
    ) {
        let changed = slot.borrow().as_deref() != value;
        if changed {
            *slot.borrow_mut() = value.map(str::to_string);
            trace!("[{}] {prop:?}: {value:?}", self.inner.path);
            self.mark(prop);
        }
    }

    fn update_current_network(&self, value: Option<&str>) {
        self.update_string(
            &self.inner.current_network,
            value,
            InterfaceProperty::CurrentNetwork,
        );
    }

    fn update_list(&self, slot: &RefCell<Vec<String>>, paths: &[String], prop: InterfaceProperty) {
        let changed = *slot.borrow() != paths;
        if changed {
            *slot.borrow_mut() = paths.to_vec();
            self.mark(prop);
        }
    }

    pub(crate) fn store_wps_credentials(&self, creds: Option<WpsCredentials>) {
        let changed = *self.inner.wps_credentials.borrow() != creds;
        if changed {
            *self.inner.wps_credentials.borrow_mut() = creds;
            self.mark(InterfaceProperty::WpsCredentials);
        }
    }

    /// Clears any cached WPS credentials, queueing a change notification
    /// if there were any. Does not flush.
    pub(crate) fn clear_wps_credentials(&self) {
        self.store_wps_credentials(None);
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

    pub fn supplicant(&self) -> &Supplicant {
        &self.inner.supplicant
    }

    /// True while the remote handle resolved and the root supplicant is
    /// valid.
    pub fn valid(&self) -> bool {
        self.inner.valid.get()
    }

    /// True while this interface's path is listed in the root's interface
    /// collection. An interface can be valid yet no longer present for a
    /// short window after removal.
    pub fn present(&self) -> bool {
        self.inner.present.get()
    }

    pub fn caps(&self) -> InterfaceCaps {
        self.inner.caps.get()
    }

    pub fn state(&self) -> InterfaceState {
        self.inner.state.get()
    }

    pub fn scanning(&self) -> bool {
        self.inner.scanning.get()
    }

    pub fn ap_scan(&self) -> u32 {
        self.inner.ap_scan.get()
    }

    pub fn scan_interval(&self) -> i32 {
        self.inner.scan_interval.get()
    }

    pub fn country(&self) -> Option<String> {
        self.inner.country.borrow().clone()
    }

    pub fn driver(&self) -> Option<String> {
        self.inner.driver.borrow().clone()
    }

    pub fn ifname(&self) -> Option<String> {
        self.inner.ifname.borrow().clone()
    }

    pub fn bridge_ifname(&self) -> Option<String> {
        self.inner.bridge_ifname.borrow().clone()
    }

    /// Path of the associated BSS, or `None` when not associated.
    pub fn current_bss(&self) -> Option<String> {
        self.inner.current_bss.borrow().clone()
    }

    /// Path of the selected network, or `None` when not associated.
    pub fn current_network(&self) -> Option<String> {
        self.inner.current_network.borrow().clone()
    }

    pub fn bsss(&self) -> Vec<String> {
        self.inner.bsss.borrow().clone()
    }

    pub fn networks(&self) -> Vec<String> {
        self.inner.networks.borrow().clone()
    }

    pub(crate) fn networks_contain(&self, path: &str) -> bool {
        self.inner.networks.borrow().iter().any(|p| p == path)
    }

    pub(crate) fn bsss_contain(&self, path: &str) -> bool {
        self.inner.bsss.borrow().iter().any(|p| p == path)
    }

    /// MAC addresses of the stations currently authorized on this
    /// interface (AP mode).
    pub fn stations(&self) -> Vec<String> {
        self.inner.stations.borrow().clone()
    }

    /// The most recent WPS credentials received on this interface, if any.
    pub fn wps_credentials(&self) -> Option<WpsCredentials> {
        self.inner.wps_credentials.borrow().clone()
    }

    /// Subscribes to property changes. With a filter the handler fires for
    /// that property only; without one it fires for every change.
    pub fn add_property_handler(
        &self,
        filter: Option<InterfaceProperty>,
        handler: impl Fn(&Interface, InterfaceProperty) + 'static,
    ) -> HandlerId {
        self.inner.handlers.add(filter, handler)
    }

    pub fn remove_handler(&self, id: HandlerId) {
        self.inner.handlers.remove(id);
    }

    /// The canonical network proxy for a child path of this interface.
    pub fn network(&self, path: &str) -> Result<Network> {
        self.inner.supplicant.network(path)
    }

    /// The canonical BSS proxy for a child path of this interface.
    pub fn bss(&self, path: &str) -> Result<Bss> {
        self.inner.supplicant.bss(path)
    }

    pub(crate) async fn call(
        &self,
        cancel: &CancellationToken,
        request: Request,
    ) -> Result<Reply> {
        if !self.valid() {
            return Err(Error::NotValid);
        }
        let transport = Rc::clone(&self.inner.transport);
        let path = self.inner.path.clone();
        envelope::issue(self, cancel, async move {
            transport.request(&path, request).await
        })
        .await
    }

    /// Requests a scan. Without parameters a passive scan is performed.
    pub async fn scan(&self, params: Option<&ScanParams>) -> Result<()> {
        self.scan_full(params, &CancellationToken::new()).await
    }

    pub async fn scan_full(
        &self,
        params: Option<&ScanParams>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let default_params = ScanParams::default();
        let params = params.unwrap_or(&default_params);
        let mut args = Dict::new();
        args.add_str(
            "Type",
            match params.scan_type {
                ScanType::Active => "active",
                ScanType::Passive => "passive",
            },
        );
        if !params.ssids.is_empty() {
            args.add_byte_arrays("SSIDs", &params.ssids);
        }
        if !params.ies.is_empty() {
            args.add_byte_arrays("IEs", &params.ies);
        }
        if !params.channels.is_empty() {
            args.add_u32_pairs("Channels", &params.channels);
        }
        if let Some(allow_roam) = params.allow_roam {
            args.add_bool("AllowRoam", allow_roam);
        }
        self.call(cancel, Request::Scan(args)).await.map(|_| ())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.call(&CancellationToken::new(), Request::Disconnect)
            .await
            .map(|_| ())
    }

    pub async fn reassociate(&self) -> Result<()> {
        self.call(&CancellationToken::new(), Request::Reassociate)
            .await
            .map(|_| ())
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.call(&CancellationToken::new(), Request::Reconnect)
            .await
            .map(|_| ())
    }

    pub async fn reattach(&self) -> Result<()> {
        self.call(&CancellationToken::new(), Request::Reattach)
            .await
            .map(|_| ())
    }

    pub async fn auto_scan(&self, param: &str) -> Result<()> {
        self.call(
            &CancellationToken::new(),
            Request::AutoScan(param.to_string()),
        )
        .await
        .map(|_| ())
    }

    /// Flushes the BSS cache of entries older than `age` seconds.
    pub async fn flush_bss(&self, age: u32) -> Result<()> {
        self.call(&CancellationToken::new(), Request::FlushBss(age))
            .await
            .map(|_| ())
    }

    /// Polls the driver for per-connection signal quality data.
    pub async fn signal_poll(&self) -> Result<SignalPoll> {
        let reply = self
            .call(&CancellationToken::new(), Request::SignalPoll)
            .await?;
        let dict = reply.into_dict().unwrap_or_default();
        Ok(SignalPoll {
            linkspeed: dict.i32_value("linkspeed"),
            noise: dict.i32_value("noise"),
            frequency: dict.u32_value("frequency"),
            rssi: dict.i32_value("rssi"),
            avg_rssi: dict.i32_value("avg-rssi"),
            center_frq1: dict.i32_value("center-frq1"),
            center_frq2: dict.i32_value("center-frq2"),
        })
    }

    /// Uploads a named credential blob.
    pub async fn add_blob(&self, name: &str, blob: &[u8]) -> Result<()> {
        self.add_blob_full(name, blob, &CancellationToken::new())
            .await
    }

    pub async fn add_blob_full(
        &self,
        name: &str,
        blob: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.call(cancel, Request::AddBlob(name.to_string(), blob.to_vec()))
            .await
            .map(|_| ())
    }

    /// Removes a named credential blob.
    pub async fn remove_blob(&self, name: &str) -> Result<()> {
        self.remove_blob_full(name, &CancellationToken::new()).await
    }

    pub async fn remove_blob_full(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        self.call(cancel, Request::RemoveBlob(name.to_string()))
            .await
            .map(|_| ())
    }

    /// Makes the network at `path` the active one.
    pub async fn select_network(&self, path: &str) -> Result<()> {
        self.select_network_full(path, &CancellationToken::new())
            .await
    }

    pub async fn select_network_full(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        if !is_object_path(path) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        self.call(cancel, Request::SelectNetwork(path.to_string()))
            .await
            .map(|_| ())
    }

    /// Removes the network configuration at `path`.
    pub async fn remove_network(&self, path: &str) -> Result<()> {
        self.remove_network_full(path, &CancellationToken::new())
            .await
    }

    pub async fn remove_network_full(&self, path: &str, cancel: &CancellationToken) -> Result<()> {
        if !is_object_path(path) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        self.call(cancel, Request::RemoveNetwork(path.to_string()))
            .await
            .map(|_| ())
    }

    /// Removes every configured network.
    pub async fn remove_all_networks(&self) -> Result<()> {
        self.remove_all_networks_full(&CancellationToken::new())
            .await
    }

    pub async fn remove_all_networks_full(&self, cancel: &CancellationToken) -> Result<()> {
        self.call(cancel, Request::RemoveAllNetworks)
            .await
            .map(|_| ())
    }

    pub async fn set_ap_scan(&self, ap_scan: u32) -> Result<()> {
        self.call(&CancellationToken::new(), Request::SetApScan(ap_scan))
            .await
            .map(|_| ())
    }

    pub async fn set_country(&self, country: &str) -> Result<()> {
        self.call(
            &CancellationToken::new(),
            Request::SetCountry(country.to_string()),
        )
        .await
        .map(|_| ())
    }
}

/// Parses the interface `Capabilities` dictionary.
fn parse_interface_caps(dict: &Dict) -> InterfaceCaps {
    let mut caps = InterfaceCaps::default();
    for (key, _) in dict.iter() {
        match key.as_str() {
            "Pairwise" | "Group" | "KeyMgmt" | "Protocol" | "AuthAlg" | "Scan" | "Modes"
            | "MaxScanSSID" => {}
            other => warn!("Unexpected interface capability key {other}"),
        }
    }
    if let Some(names) = dict.str_list_value("Pairwise") {
        caps.pairwise = bits_from_names("Pairwise", names, CIPHER_NAMES);
    }
    if let Some(names) = dict.str_list_value("Group") {
        caps.group = bits_from_names("Group", names, CIPHER_NAMES);
    }
    if let Some(names) = dict.str_list_value("KeyMgmt") {
        caps.keymgmt = bits_from_names("KeyMgmt", names, KEYMGMT_NAMES);
    }
    if let Some(names) = dict.str_list_value("Protocol") {
        caps.protocol = bits_from_names("Protocol", names, PROTOCOL_NAMES);
    }
    if let Some(names) = dict.str_list_value("AuthAlg") {
        caps.auth_alg = bits_from_names("AuthAlg", names, AUTH_ALG_NAMES);
    }
    if let Some(names) = dict.str_list_value("Scan") {
        caps.scan = bits_from_names("Scan", names, SCAN_CAP_NAMES);
    }
    if let Some(names) = dict.str_list_value("Modes") {
        caps.modes = bits_from_names("Modes", names, MODE_CAP_NAMES);
    }
    if let Some(n) = dict.i32_value("MaxScanSSID") {
        caps.max_scan_ssid = n;
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Caps, KeyMgmts, ScanCaps};
    use crate::supplicant::SUPPLICANT_PATH;
    use crate::testutil::{MockTransport, settle};
    use crate::transport::Transport;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    const IFACE_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/1";

    fn root_props_with(interfaces: &[&str]) -> Dict {
        let mut d = Dict::new();
        d.add_str_list("Capabilities", &["ap".to_string()]);
        d.add_str_list("EapMethods", &["TLS".to_string()]);
        d.add_str_list(
            "Interfaces",
            &interfaces.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        );
        d
    }

    fn iface_props() -> Dict {
        let mut caps = Dict::new();
        caps.add_str_list("KeyMgmt", &["wpa-psk".to_string(), "wpa-eap".to_string()]);
        caps.add_str_list("Scan", &["active".to_string(), "ssid".to_string()]);
        caps.insert("MaxScanSSID", crate::dict::Value::I32(16));

        let mut d = Dict::new();
        d.add_dict("Capabilities", caps);
        d.add_str("State", "disconnected");
        d.add_bool("Scanning", false);
        d.add_u32("ApScan", 1);
        d.add_i32("ScanInterval", 5);
        d.add_str("Country", "DE");
        d.add_str("Driver", "nl80211");
        d.add_str("Ifname", "wlan0");
        d.add_str("BridgeIfname", "");
        d.add_str("CurrentBSS", "/");
        d.add_str("CurrentNetwork", "/");
        d.add_str_list("BSSs", &[]);
        d.add_str_list("Networks", &[]);
        d
    }

    async fn valid_interface(mock: &Rc<MockTransport>) -> (Supplicant, Interface) {
        mock.put_object(SUPPLICANT_PATH, root_props_with(&[IFACE_PATH]));
        mock.put_object(IFACE_PATH, iface_props());
        let supplicant = Supplicant::with_transport(Rc::clone(mock) as Rc<dyn Transport>);
        let iface = supplicant.interface(IFACE_PATH);
        settle().await;
        (supplicant, iface)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolves_and_seeds_properties() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (supplicant, iface) = valid_interface(&mock).await;
                assert!(supplicant.valid());
                assert!(iface.valid());
                assert!(iface.present());
                assert_eq!(iface.state(), InterfaceState::Disconnected);
                assert_eq!(iface.ifname().as_deref(), Some("wlan0"));
                assert_eq!(iface.ap_scan(), 1);
                assert_eq!(iface.scan_interval(), 5);
                // "/" maps to no association
                assert_eq!(iface.current_bss(), None);
                assert_eq!(iface.current_network(), None);
                let caps = iface.caps();
                assert_eq!(caps.keymgmt, KeyMgmts::WPA_PSK | KeyMgmts::WPA_EAP);
                assert_eq!(caps.scan, ScanCaps::ACTIVE | ScanCaps::SSID);
                assert_eq!(caps.max_scan_ssid, 16);
                assert_eq!(supplicant.caps(), Caps::AP);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn valid_is_emitted_last_on_resolution() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                mock.put_object(SUPPLICANT_PATH, root_props_with(&[IFACE_PATH]));
                mock.put_object(IFACE_PATH, iface_props());
                let supplicant =
                    Supplicant::with_transport(Rc::clone(&mock) as Rc<dyn Transport>);
                let iface = supplicant.interface(IFACE_PATH);
                let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
                let seen2 = Rc::clone(&seen);
                iface.add_property_handler(None, move |_, p| seen2.borrow_mut().push(p));
                settle().await;
                let seen = seen.borrow();
                assert!(!seen.is_empty());
                assert_eq!(seen.last(), Some(&InterfaceProperty::Valid));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn state_change_notification() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                let seen = Rc::new(std::cell::Cell::new(0));
                let seen2 = Rc::clone(&seen);
                iface.add_property_handler(Some(InterfaceProperty::State), move |i, _| {
                    assert_eq!(i.state(), InterfaceState::Completed);
                    seen2.set(seen2.get() + 1);
                });
                let mut change = Dict::new();
                change.add_str("State", "completed");
                mock.emit(IFACE_PATH, &BusEvent::PropertiesChanged(change.clone()));
                assert_eq!(seen.get(), 1);
                // Same value again: idempotent, no second notification
                mock.emit(IFACE_PATH, &BusEvent::PropertiesChanged(change));
                assert_eq!(seen.get(), 1);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn presence_follows_root_collection() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                assert!(iface.present());
                assert!(iface.valid());

                // Removed upstream: no longer present, still valid
                mock.emit(SUPPLICANT_PATH, &BusEvent::InterfaceRemoved(IFACE_PATH.into()));
                assert!(!iface.present());
                assert!(iface.valid());

                // Re-added: present again
                mock.emit(SUPPLICANT_PATH, &BusEvent::InterfaceAdded(IFACE_PATH.into()));
                assert!(iface.present());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn root_invalidity_cascades_with_valid_first() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
                let seen2 = Rc::clone(&seen);
                iface.add_property_handler(None, move |_, p| seen2.borrow_mut().push(p));

                mock.emit(SUPPLICANT_PATH, &BusEvent::OwnerChanged(false));
                assert!(!iface.valid());
                assert!(!iface.present());
                let seen = seen.borrow();
                assert_eq!(seen.first(), Some(&InterfaceProperty::Valid));
                assert!(seen.contains(&InterfaceProperty::Present));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn collection_signals_update_lists() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                let bss = format!("{IFACE_PATH}/BSSs/0");
                let net = format!("{IFACE_PATH}/Networks/0");
                mock.emit(IFACE_PATH, &BusEvent::BssAdded(bss.clone()));
                mock.emit(IFACE_PATH, &BusEvent::NetworkAdded(net.clone()));
                assert_eq!(iface.bsss(), vec![bss.clone()]);
                assert_eq!(iface.networks(), vec![net.clone()]);
                mock.emit(IFACE_PATH, &BusEvent::BssRemoved(bss));
                mock.emit(IFACE_PATH, &BusEvent::NetworkRemoved(net));
                assert!(iface.bsss().is_empty());
                assert!(iface.networks().is_empty());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn station_list_tracks_authorization() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                mock.emit(IFACE_PATH, &BusEvent::StaAuthorized("02:00:00:00:00:01".into()));
                mock.emit(IFACE_PATH, &BusEvent::StaAuthorized("02:00:00:00:00:02".into()));
                assert_eq!(iface.stations().len(), 2);
                mock.emit(
                    IFACE_PATH,
                    &BusEvent::StaDeauthorized("02:00:00:00:00:01".into()),
                );
                assert_eq!(iface.stations(), vec!["02:00:00:00:00:02".to_string()]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn simple_calls_are_routed() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                iface.disconnect().await.unwrap();
                iface.scan(None).await.unwrap();
                iface.flush_bss(0).await.unwrap();
                assert_eq!(
                    mock.methods(IFACE_PATH),
                    vec!["Disconnect", "Scan", "FlushBSS"]
                );
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn select_network_validates_path() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                let err = iface.select_network("not a path").await.unwrap_err();
                assert!(matches!(err, Error::InvalidPath(_)));
                assert!(mock.methods(IFACE_PATH).is_empty());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn signal_poll_parses_reply() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                let mut dict = Dict::new();
                dict.add_i32("linkspeed", 300);
                dict.add_i32("rssi", -42);
                dict.add_u32("frequency", 5180);
                mock.script(
                    IFACE_PATH,
                    "SignalPoll",
                    crate::testutil::MockReply::Ok(Reply::Dict(dict)),
                );
                let poll = iface.signal_poll().await.unwrap();
                assert_eq!(poll.linkspeed, Some(300));
                assert_eq!(poll.rssi, Some(-42));
                assert_eq!(poll.frequency, Some(5180));
                assert_eq!(poll.noise, None);
            })
            .await;
    }
}
