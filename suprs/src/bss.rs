//! The BSS (access point) proxy.
//!
//! Mirrors one `BSSs/<n>` object below an interface. All properties are
//! read-only: identification, security dictionaries, radio parameters and
//! the raw information elements, which are additionally parsed for the WPS
//! vendor element to derive the advertised WPS capabilities.

use log::{debug, error, trace};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::dict::Dict;
use crate::interface::{Interface, InterfaceProperty};
use crate::models::{
    AddNetworkFlags, BssConnectParams, BssMode, CIPHER_NAMES, Ciphers, KEYMGMT_NAMES, KeyMgmts,
    NetworkParams, OpMode, Security, WpsCaps, bits_from_names,
};
use crate::notify::{HandlerId, HandlerList, flush_pending, properties};
use crate::transport::{BusEvent, ObjectKind, Transport, WatchGuard};

properties! {
    /// Observable properties of a BSS proxy.
    pub enum BssProperty {
        Valid,
        Present,
        Ssid,
        Bssid,
        Wpa,
        Rsn,
        Mode,
        WpsCaps,
        Ies,
        Privacy,
        Frequency,
        Rates,
        Maxrate,
        Signal,
    }
}

/// The WPA security dictionary of a BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BssWpa {
    pub keymgmt: KeyMgmts,
    pub pairwise: Ciphers,
    pub group: Ciphers,
}

/// The RSN (WPA2) security dictionary of a BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BssRsn {
    pub keymgmt: KeyMgmts,
    pub pairwise: Ciphers,
    pub group: Ciphers,
    pub mgmt_group: Ciphers,
}

pub(crate) struct BssInner {
    path: String,
    iface: Interface,
    transport: Rc<dyn Transport>,
    resolved: Cell<bool>,
    valid: Cell<bool>,
    present: Cell<bool>,
    ssid: RefCell<Vec<u8>>,
    bssid: RefCell<Vec<u8>>,
    wpa: Cell<Option<BssWpa>>,
    rsn: Cell<Option<BssRsn>>,
    mode: Cell<BssMode>,
    wps_caps: Cell<WpsCaps>,
    ies: RefCell<Vec<u8>>,
    privacy: Cell<bool>,
    frequency: Cell<u16>,
    rates: RefCell<Vec<u32>>,
    maxrate: Cell<u32>,
    signal: Cell<i16>,
    pending: Cell<u32>,
    handlers: HandlerList<Bss, BssProperty>,
    watch: RefCell<Option<WatchGuard>>,
    iface_handlers: RefCell<Vec<HandlerId>>,
}

impl BssInner {
    pub(crate) fn new(iface: Interface, path: &str) -> Rc<Self> {
        let transport = Rc::clone(iface.supplicant().transport());
        Rc::new(Self {
            path: path.to_string(),
            iface,
            transport,
            resolved: Cell::new(false),
            valid: Cell::new(false),
            present: Cell::new(false),
            ssid: RefCell::new(Vec::new()),
            bssid: RefCell::new(Vec::new()),
            wpa: Cell::new(None),
            rsn: Cell::new(None),
            mode: Cell::new(BssMode::Unknown),
            wps_caps: Cell::new(WpsCaps::empty()),
            ies: RefCell::new(Vec::new()),
            privacy: Cell::new(false),
            frequency: Cell::new(0),
            rates: RefCell::new(Vec::new()),
            maxrate: Cell::new(0),
            signal: Cell::new(0),
            pending: Cell::new(0),
            handlers: HandlerList::new(),
            watch: RefCell::new(None),
            iface_handlers: RefCell::new(Vec::new()),
        })
    }
}

impl Drop for BssInner {
    fn drop(&mut self) {
        for id in self.iface_handlers.borrow_mut().drain(..) {
            self.iface.remove_handler(id);
        }
    }
}

/// Proxy for one visible access point.
#[derive(Clone)]
pub struct Bss {
    pub(crate) inner: Rc<BssInner>,
}

impl Bss {
    pub(crate) fn start(&self) {
        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.transport.watch(
            &self.inner.path,
            ObjectKind::Bss,
            Rc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    Bss { inner }.handle_event(event);
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
                    let bss = Bss { inner };
                    bss.update_valid();
                    bss.update_present();
                    bss.flush();
                }
            },
        );
        let weak = Rc::downgrade(&self.inner);
        let list_id = self.inner.iface.add_property_handler(
            Some(InterfaceProperty::Bsss),
            move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    let bss = Bss { inner };
                    bss.update_present();
                    bss.flush();
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
            .load(&self.inner.path, ObjectKind::Bss)
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
        if let BusEvent::PropertiesChanged(props) = event {
            self.apply_properties(props);
            self.flush();
        }
    }

    fn apply_properties(&self, props: &Dict) {
        if let Some(bytes) = props.bytes_value("SSID") {
            self.update_bytes(&self.inner.ssid, bytes, BssProperty::Ssid);
        }
        if let Some(bytes) = props.bytes_value("BSSID") {
            self.update_bytes(&self.inner.bssid, bytes, BssProperty::Bssid);
        }
        if let Some(dict) = props.dict_value("WPA") {
            let wpa = parse_wpa(dict);
            if self.inner.wpa.get() != Some(wpa) {
                self.inner.wpa.set(Some(wpa));
                self.mark(BssProperty::Wpa);
            }
        }
        if let Some(dict) = props.dict_value("RSN") {
            let rsn = parse_rsn(dict);
            if self.inner.rsn.get() != Some(rsn) {
                self.inner.rsn.set(Some(rsn));
                self.mark(BssProperty::Rsn);
            }
        }
        if let Some(name) = props.str_value("Mode") {
            let mode = BssMode::from_name(name);
            if self.inner.mode.get() != mode {
                self.inner.mode.set(mode);
                trace!("[{}] Mode: {name}", self.inner.path);
                self.mark(BssProperty::Mode);
            }
        }
        if let Some(bytes) = props.bytes_value("IEs") {
            let changed = *self.inner.ies.borrow() != bytes;
            if changed {
                let wps_caps = parse_ies(bytes);
                *self.inner.ies.borrow_mut() = bytes.to_vec();
                self.mark(BssProperty::Ies);
                if self.inner.wps_caps.get() != wps_caps {
                    self.inner.wps_caps.set(wps_caps);
                    debug!("[{}] WPS caps {wps_caps:?}", self.inner.path);
                    self.mark(BssProperty::WpsCaps);
                }
            }
        }
        if let Some(privacy) = props.bool_value("Privacy") {
            if self.inner.privacy.get() != privacy {
                self.inner.privacy.set(privacy);
                trace!("[{}] Privacy: {privacy}", self.inner.path);
                self.mark(BssProperty::Privacy);
            }
        }
        if let Some(frequency) = props.u16_value("Frequency") {
            if self.inner.frequency.get() != frequency {
                self.inner.frequency.set(frequency);
                trace!("[{}] Frequency: {frequency}", self.inner.path);
                self.mark(BssProperty::Frequency);
            }
        }
        if let Some(rates) = props.u32_list_value("Rates") {
            let changed = *self.inner.rates.borrow() != rates;
            if changed {
                *self.inner.rates.borrow_mut() = rates.to_vec();
                self.mark(BssProperty::Rates);
                let maxrate = rates.iter().copied().max().unwrap_or(0);
                if self.inner.maxrate.get() != maxrate {
                    self.inner.maxrate.set(maxrate);
                    self.mark(BssProperty::Maxrate);
                }
            }
        }
        if let Some(signal) = props.i16_value("Signal") {
            if self.inner.signal.get() != signal {
                self.inner.signal.set(signal);
                trace!("[{}] Signal: {signal}", self.inner.path);
                self.mark(BssProperty::Signal);
            }
        }
    }

    fn update_bytes(&self, slot: &RefCell<Vec<u8>>, value: &[u8], prop: BssProperty) {
        let changed = *slot.borrow() != value;
        if changed {
            *slot.borrow_mut() = value.to_vec();
            self.mark(prop);
        }
    }

    fn mark(&self, prop: BssProperty) {
        use crate::notify::Property;
        self.inner.pending.set(self.inner.pending.get() | prop.bit());
    }

    fn update_valid(&self) {
        let valid = self.inner.resolved.get() && self.inner.iface.valid();
        if self.inner.valid.get() != valid {
            self.inner.valid.set(valid);
            debug!(
                "BSS {} is {}valid",
                self.inner.path,
                if valid { "" } else { "in" }
            );
            self.mark(BssProperty::Valid);
        }
    }

    fn update_present(&self) {
        let present = self.inner.resolved.get()
            && self.inner.iface.valid()
            && self.inner.iface.bsss_contain(&self.inner.path);
        if self.inner.present.get() != present {
            self.inner.present.set(present);
            debug!(
                "BSS {} is {}present",
                self.inner.path,
                if present { "" } else { "not " }
            );
            self.mark(BssProperty::Present);
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

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn interface(&self) -> &Interface {
        &self.inner.iface
    }

    pub fn valid(&self) -> bool {
        self.inner.valid.get()
    }

    pub fn present(&self) -> bool {
        self.inner.present.get()
    }

    /// SSID as raw bytes (may not be valid UTF-8).
    pub fn ssid(&self) -> Vec<u8> {
        self.inner.ssid.borrow().clone()
    }

    /// SSID decoded for display; invalid UTF-8 is replaced.
    pub fn ssid_str(&self) -> String {
        String::from_utf8_lossy(&self.inner.ssid.borrow()).into_owned()
    }

    /// BSSID as raw bytes.
    pub fn bssid(&self) -> Vec<u8> {
        self.inner.bssid.borrow().clone()
    }

    pub fn wpa(&self) -> Option<BssWpa> {
        self.inner.wpa.get()
    }

    pub fn rsn(&self) -> Option<BssRsn> {
        self.inner.rsn.get()
    }

    pub fn mode(&self) -> BssMode {
        self.inner.mode.get()
    }

    /// WPS capabilities advertised in the vendor information elements.
    pub fn wps_caps(&self) -> WpsCaps {
        self.inner.wps_caps.get()
    }

    pub fn ies(&self) -> Vec<u8> {
        self.inner.ies.borrow().clone()
    }

    pub fn privacy(&self) -> bool {
        self.inner.privacy.get()
    }

    /// Operating frequency in MHz.
    pub fn frequency(&self) -> u16 {
        self.inner.frequency.get()
    }

    /// Supported rates in bit/s, as advertised.
    pub fn rates(&self) -> Vec<u32> {
        self.inner.rates.borrow().clone()
    }

    pub fn maxrate(&self) -> u32 {
        self.inner.maxrate.get()
    }

    /// Signal strength in dBm.
    pub fn signal(&self) -> i16 {
        self.inner.signal.get()
    }

    /// Combined key management suites from the RSN and WPA dictionaries.
    pub fn keymgmt(&self) -> KeyMgmts {
        let mut keymgmt = KeyMgmts::empty();
        if let Some(wpa) = self.inner.wpa.get() {
            keymgmt |= wpa.keymgmt;
        }
        if let Some(rsn) = self.inner.rsn.get() {
            keymgmt |= rsn.keymgmt;
        }
        keymgmt
    }

    /// Combined pairwise cipher suites from the RSN and WPA dictionaries.
    pub fn pairwise(&self) -> Ciphers {
        let mut pairwise = Ciphers::empty();
        if let Some(wpa) = self.inner.wpa.get() {
            pairwise |= wpa.pairwise;
        }
        if let Some(rsn) = self.inner.rsn.get() {
            pairwise |= rsn.pairwise;
        }
        pairwise
    }

    /// Security level derived from the advertised key management suites,
    /// falling back to WEP when only privacy is flagged. Only meaningful
    /// while the BSS is valid and present.
    pub fn security(&self) -> Security {
        if self.valid() && self.present() {
            let keymgmt = self.keymgmt();
            if keymgmt.intersects(
                KeyMgmts::WPA_EAP
                    | KeyMgmts::WPA_FT_EAP
                    | KeyMgmts::WPA_EAP_SHA256
                    | KeyMgmts::IEEE8021X,
            ) {
                return Security::Eap;
            }
            if keymgmt
                .intersects(KeyMgmts::WPA_PSK | KeyMgmts::WPA_FT_PSK | KeyMgmts::WPA_PSK_SHA256)
            {
                return Security::Psk;
            }
            if self.privacy() {
                return Security::Wep;
            }
        }
        Security::None
    }

    /// Subscribes to property changes. With a filter the handler fires for
    /// that property only; without one it fires for every change.
    pub fn add_property_handler(
        &self,
        filter: Option<BssProperty>,
        handler: impl Fn(&Bss, BssProperty) + 'static,
    ) -> HandlerId {
        self.inner.handlers.add(filter, handler)
    }

    pub fn remove_handler(&self, id: HandlerId) {
        self.inner.handlers.remove(id);
    }

    /// Provisions a network configuration matching this BSS and, per
    /// `flags`, selects and enables it. Returns the new network's path.
    pub async fn connect(
        &self,
        params: &BssConnectParams,
        flags: AddNetworkFlags,
    ) -> Result<String> {
        self.connect_full(params, flags, &CancellationToken::new())
            .await
    }

    pub async fn connect_full(
        &self,
        params: &BssConnectParams,
        flags: AddNetworkFlags,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let np = self.network_params(params);
        self.inner
            .iface
            .add_network_full(&np, flags, &Default::default(), cancel)
            .await
    }

    /// Fills network parameters from this BSS plus the caller's
    /// credentials. The BSS frequency is deliberately not copied: it only
    /// matters for the station creating an IBSS, and for an existing IBSS
    /// the network's own frequency wins anyway.
    fn network_params(&self, cp: &BssConnectParams) -> NetworkParams {
        NetworkParams {
            ssid: self.ssid(),
            mode: if self.mode() == BssMode::AdHoc {
                OpMode::Ibss
            } else {
                OpMode::Infra
            },
            security: self.security(),
            scan_ssid: 1,
            auth_flags: cp.auth_flags,
            eap: cp.eap,
            bgscan: cp.bgscan.clone(),
            passphrase: cp.passphrase.clone(),
            identity: cp.identity.clone(),
            anonymous_identity: cp.anonymous_identity.clone(),
            ca_cert_file: cp.ca_cert_file.clone(),
            client_cert_file: cp.client_cert_file.clone(),
            private_key_file: cp.private_key_file.clone(),
            private_key_passphrase: cp.private_key_passphrase.clone(),
            subject_match: cp.subject_match.clone(),
            altsubject_match: cp.altsubject_match.clone(),
            domain_suffix_match: cp.domain_suffix_match.clone(),
            domain_match: cp.domain_match.clone(),
            phase2: cp.phase2,
            ca_cert_file2: cp.ca_cert_file2.clone(),
            client_cert_file2: cp.client_cert_file2.clone(),
            private_key_file2: cp.private_key_file2.clone(),
            private_key_passphrase2: cp.private_key_passphrase2.clone(),
            subject_match2: cp.subject_match2.clone(),
            altsubject_match2: cp.altsubject_match2.clone(),
            domain_suffix_match2: cp.domain_suffix_match2.clone(),
            ..Default::default()
        }
    }
}

fn parse_wpa(dict: &Dict) -> BssWpa {
    let mut wpa = BssWpa::default();
    if let Some(names) = dict.str_list_value("KeyMgmt") {
        wpa.keymgmt = bits_from_names("KeyMgmt", names, KEYMGMT_NAMES);
    }
    if let Some(names) = dict.str_list_value("Pairwise") {
        wpa.pairwise = bits_from_names("Pairwise", names, CIPHER_NAMES);
    }
    if let Some(names) = dict.str_list_value("Group") {
        wpa.group = bits_from_names("Group", names, CIPHER_NAMES);
    }
    wpa
}

fn parse_rsn(dict: &Dict) -> BssRsn {
    let mut rsn = BssRsn::default();
    if let Some(names) = dict.str_list_value("KeyMgmt") {
        rsn.keymgmt = bits_from_names("KeyMgmt", names, KEYMGMT_NAMES);
    }
    if let Some(names) = dict.str_list_value("Pairwise") {
        rsn.pairwise = bits_from_names("Pairwise", names, CIPHER_NAMES);
    }
    if let Some(names) = dict.str_list_value("Group") {
        rsn.group = bits_from_names("Group", names, CIPHER_NAMES);
    }
    if let Some(names) = dict.str_list_value("MgmtGroup") {
        rsn.mgmt_group = bits_from_names("MgmtGroup", names, CIPHER_NAMES);
    }
    rsn
}

const WPS_IE_ID: u8 = 0xdd;
const WPS_OUI: [u8; 4] = [0x00, 0x50, 0xf2, 0x04];
const WPS_TLV_VERSION: u16 = 0x104a;
const WPS_TLV_STATE: u16 = 0x1044;
const WPS_TLV_METHOD: u16 = 0x1012;
const WPS_TLV_REGISTRAR: u16 = 0x1041;
const WPS_VERSION: u32 = 0x10;
const WPS_STATE_CONFIGURED: u32 = 0x02;
const WPS_METHOD_PIN: u32 = 0x00;
const WPS_METHOD_PUSH_BUTTON: u32 = 0x04;

#[derive(Default)]
struct WpsInfo {
    version: Option<u32>,
    state: Option<u32>,
    registrar: Option<u32>,
    pin: bool,
    button: bool,
    saw_methods: bool,
}

/// Parses the TLV payload of one WPS vendor element. Returns `None` when
/// the element is truncated.
fn parse_wps_element(mut data: &[u8]) -> Option<WpsInfo> {
    let mut wps = WpsInfo::default();
    while data.len() >= 4 {
        let v_type = u16::from_be_bytes([data[0], data[1]]);
        let v_len = u16::from_be_bytes([data[2], data[3]]) as usize;
        data = &data[4..];
        if v_len > data.len() {
            return None;
        }
        if v_len <= 4 {
            let mut value: u32 = 0;
            for &b in &data[..v_len] {
                value = (value << 8) | u32::from(b);
            }
            match v_type {
                WPS_TLV_VERSION => wps.version = Some(value),
                WPS_TLV_STATE => wps.state = Some(value),
                WPS_TLV_REGISTRAR => wps.registrar = Some(value),
                WPS_TLV_METHOD => {
                    wps.saw_methods = true;
                    match value {
                        WPS_METHOD_PIN => wps.pin = true,
                        WPS_METHOD_PUSH_BUTTON => wps.button = true,
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        data = &data[v_len..];
    }
    data.is_empty().then_some(wps)
}

/// Scans raw information elements for the WPS vendor element and derives
/// the advertised WPS capabilities.
fn parse_ies(mut ies: &[u8]) -> WpsCaps {
    let mut caps = WpsCaps::empty();
    while ies.len() >= 2 {
        let len = ies[1] as usize;
        if ies.len() < 2 + len {
            break;
        }
        let body = &ies[2..2 + len];
        if ies[0] == WPS_IE_ID && body.len() >= WPS_OUI.len() && body[..4] == WPS_OUI {
            // Version and state fields are mandatory
            if let Some(wps) = parse_wps_element(&body[4..]) {
                if wps.version == Some(WPS_VERSION) && wps.state.is_some() {
                    caps |= WpsCaps::SUPPORTED;
                    if wps.state == Some(WPS_STATE_CONFIGURED) {
                        caps |= WpsCaps::CONFIGURED;
                    }
                    if wps.registrar.unwrap_or(0) != 0 {
                        caps |= WpsCaps::REGISTRAR;
                    }
                    if wps.saw_methods {
                        if wps.pin {
                            caps |= WpsCaps::PIN;
                        }
                        if wps.button {
                            caps |= WpsCaps::PUSH_BUTTON;
                        }
                    } else {
                        // No methods advertised; assume pin and push-button
                        caps |= WpsCaps::PIN | WpsCaps::PUSH_BUTTON;
                    }
                }
            }
        }
        ies = &ies[2 + len..];
    }
    caps
}
