use bitflags::{Flags, bitflags};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Errors reported by the remote supplicant service.
///
/// These correspond to the error names the service registers under its
/// own D-Bus prefix and are surfaced to callers verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteError {
    UnknownError,
    InvalidArgs,
    NoMemory,
    NotConnected,
    NetworkUnknown,
    InterfaceUnknown,
    InterfaceDisabled,
    BlobUnknown,
    BlobExists,
    NoSubscription,
    SubscriptionInUse,
    SubscriptionNotYou,
}

impl RemoteError {
    /// The error name as it appears on the bus, without the service prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UnknownError",
            Self::InvalidArgs => "InvalidArgs",
            Self::NoMemory => "NoMemory",
            Self::NotConnected => "NotConnected",
            Self::NetworkUnknown => "NetworkUnknown",
            Self::InterfaceUnknown => "InterfaceUnknown",
            Self::InterfaceDisabled => "InterfaceDisabled",
            Self::BlobUnknown => "BlobUnknown",
            Self::BlobExists => "BlobExists",
            Self::NoSubscription => "NoSubscription",
            Self::SubscriptionInUse => "SubscriptionInUse",
            Self::SubscriptionNotYou => "SubscriptionNotYou",
        }
    }

    /// Maps a (possibly fully qualified) bus error name back to a variant.
    pub fn from_name(name: &str) -> Option<Self> {
        let short = name
            .strip_prefix("fi.w1.wpa_supplicant1.")
            .unwrap_or(name);
        match short {
            "UnknownError" => Some(Self::UnknownError),
            "InvalidArgs" => Some(Self::InvalidArgs),
            "NoMemory" => Some(Self::NoMemory),
            "NotConnected" => Some(Self::NotConnected),
            "NetworkUnknown" => Some(Self::NetworkUnknown),
            "InterfaceUnknown" => Some(Self::InterfaceUnknown),
            "InterfaceDisabled" => Some(Self::InterfaceDisabled),
            "BlobUnknown" => Some(Self::BlobUnknown),
            "BlobExists" => Some(Self::BlobExists),
            "NoSubscription" => Some(Self::NoSubscription),
            "SubscriptionInUse" => Some(Self::SubscriptionInUse),
            "SubscriptionNotYou" => Some(Self::SubscriptionNotYou),
            _ => None,
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal outcomes of a WPS session as reported by the event signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WpsOutcome {
    Success,
    Fail,
    M2d,
    PbcOverlap,
}

impl WpsOutcome {
    /// Maps an event type string to an outcome. Unrecognized event names
    /// count as failures.
    pub(crate) fn from_event(name: &str) -> Self {
        match name {
            "success" => Self::Success,
            "fail" => Self::Fail,
            "m2d" => Self::M2d,
            "pbc-overlap" => Self::PbcOverlap,
            _ => Self::Fail,
        }
    }
}

impl Display for WpsOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Fail => write!(f, "fail"),
            Self::M2d => write!(f, "m2d"),
            Self::PbcOverlap => write!(f, "pbc-overlap"),
        }
    }
}

/// Errors that can occur during supplicant operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A D-Bus communication error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// A domain error reported by the supplicant service.
    #[error("supplicant error: {0}")]
    Remote(RemoteError),

    /// The operation was cancelled. A cancelled operation guarantees that
    /// nothing user-visible happens on its behalf after the token was
    /// marked.
    #[error("operation cancelled")]
    Cancelled,

    /// The proxy (or one of its ancestors) is not valid.
    #[error("object is not valid")]
    NotValid,

    /// A malformed object path was passed to an operation.
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    /// A freshly added network lost validity or refused to come up while
    /// the add-network sequence was waiting for it.
    #[error("failed to enable network {0}")]
    EnableFailed(String),

    /// WPS session ended with a failure outcome.
    #[error("WPS connect failed ({0})")]
    WpsFailed(WpsOutcome),

    /// WPS session did not produce an outcome within the timeout.
    #[error("WPS connect timed out")]
    Timeout,
}

impl Error {
    /// Whether this is a specific remote-reported error.
    pub fn is_remote(&self, code: RemoteError) -> bool {
        matches!(self, Error::Remote(c) if *c == code)
    }
}

/// Connection states of an interface, as named by the `State` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceState {
    Disconnected,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
    #[default]
    Unknown,
}

impl InterfaceState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Inactive => "inactive",
            Self::Scanning => "scanning",
            Self::Authenticating => "authenticating",
            Self::Associating => "associating",
            Self::Associated => "associated",
            Self::FourWayHandshake => "4way_handshake",
            Self::GroupHandshake => "group_handshake",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "disconnected" => Self::Disconnected,
            "inactive" => Self::Inactive,
            "scanning" => Self::Scanning,
            "authenticating" => Self::Authenticating,
            "associating" => Self::Associating,
            "associated" => Self::Associated,
            "4way_handshake" => Self::FourWayHandshake,
            "group_handshake" => Self::GroupHandshake,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }
}

impl Display for InterfaceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Security level of a network or BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    #[default]
    None,
    Wep,
    Psk,
    Eap,
}

/// Operating mode for a configured network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpMode {
    #[default]
    Infra,
    Ibss,
    Ap,
}

impl OpMode {
    pub(crate) fn code(self) -> u32 {
        match self {
            Self::Infra => 0,
            Self::Ibss => 1,
            Self::Ap => 2,
        }
    }
}

/// Operating mode reported by a BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BssMode {
    #[default]
    Unknown,
    Infra,
    AdHoc,
}

impl BssMode {
    pub(crate) fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("infrastructure") {
            Self::Infra
        } else if name.eq_ignore_ascii_case("ad-hoc") {
            Self::AdHoc
        } else {
            Self::Unknown
        }
    }
}

/// Scan type for an interface scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanType {
    #[default]
    Passive,
    Active,
}

/// Role this station plays in a WPS exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WpsRole {
    #[default]
    Enrollee,
    Registrar,
}

/// Authentication method for a WPS exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WpsAuth {
    #[default]
    PushButton,
    Pin,
}

/// A single EAP method, used as the outer authentication of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EapMethod {
    Md5,
    Tls,
    Mschapv2,
    Peap,
    Ttls,
    Gtc,
    Otp,
    Sim,
    Leap,
    Psk,
    Aka,
    Fast,
    Pax,
    Sake,
    Gpsk,
    Wsc,
    Ikev2,
    Tnc,
    Pwd,
}

impl EapMethod {
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Tls => "TLS",
            Self::Mschapv2 => "MSCHAPV2",
            Self::Peap => "PEAP",
            Self::Ttls => "TTLS",
            Self::Gtc => "GTC",
            Self::Otp => "OTP",
            Self::Sim => "SIM",
            Self::Leap => "LEAP",
            Self::Psk => "PSK",
            Self::Aka => "AKA",
            Self::Fast => "FAST",
            Self::Pax => "PAX",
            Self::Sake => "SAKE",
            Self::Gpsk => "GPSK",
            Self::Wsc => "WSC",
            Self::Ikev2 => "IKEV2",
            Self::Tnc => "TNC",
            Self::Pwd => "PWD",
        }
    }
}

impl Display for EapMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Global capabilities advertised by the root supplicant object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Caps: u32 {
        const AP           = 0x0001;
        const IBSS_RSN     = 0x0002;
        const P2P          = 0x0004;
        const INTERWORKING = 0x0008;
    }

    /// EAP methods supported by the supplicant build.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EapMethods: u32 {
        const MD5      = 0x00001;
        const TLS      = 0x00002;
        const MSCHAPV2 = 0x00004;
        const PEAP     = 0x00008;
        const TTLS     = 0x00010;
        const GTC      = 0x00020;
        const OTP      = 0x00040;
        const SIM      = 0x00080;
        const LEAP     = 0x00100;
        const PSK      = 0x00200;
        const AKA      = 0x00400;
        const FAST     = 0x00800;
        const PAX      = 0x01000;
        const SAKE     = 0x02000;
        const GPSK     = 0x04000;
        const WSC      = 0x08000;
        const IKEV2    = 0x10000;
        const TNC      = 0x20000;
        const PWD      = 0x40000;
    }

    /// Key management suites.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyMgmts: u32 {
        const NONE            = 0x0001;
        const WPA_PSK         = 0x0002;
        const WPA_FT_PSK      = 0x0004;
        const WPA_PSK_SHA256  = 0x0008;
        const WPA_EAP         = 0x0010;
        const WPA_FT_EAP      = 0x0020;
        const WPA_EAP_SHA256  = 0x0040;
        const IEEE8021X       = 0x0080;
        const WPA_NONE        = 0x0100;
        const WPS             = 0x0200;
    }

    /// Cipher suites.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ciphers: u32 {
        const NONE        = 0x0001;
        const CCMP        = 0x0002;
        const TKIP        = 0x0004;
        const WEP104      = 0x0008;
        const WEP40       = 0x0010;
        const AES128_CMAC = 0x0020;
    }

    /// WPA protocol versions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Protocols: u32 {
        const RSN = 0x0001;
        const WPA = 0x0002;
    }

    /// 802.11 authentication algorithms.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AuthAlgs: u32 {
        const OPEN   = 0x0001;
        const SHARED = 0x0002;
        const LEAP   = 0x0004;
    }

    /// Scan capabilities of an interface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScanCaps: u32 {
        const ACTIVE  = 0x0001;
        const PASSIVE = 0x0002;
        const SSID    = 0x0004;
    }

    /// Operating modes supported by an interface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModeCaps: u32 {
        const INFRA  = 0x0001;
        const AD_HOC = 0x0002;
        const AP     = 0x0004;
        const P2P    = 0x0008;
    }

    /// WPS support advertised by a BSS in its vendor information elements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WpsCaps: u32 {
        const SUPPORTED   = 0x0001;
        const CONFIGURED  = 0x0002;
        const PUSH_BUTTON = 0x0004;
        const PIN         = 0x0008;
        const REGISTRAR   = 0x0010;
    }

    /// Authentication types carried by WPS credentials.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AuthTypes: u32 {
        const OPEN     = 0x0001;
        const SHARED   = 0x0002;
        const LEAP     = 0x0004;
        const WPA_PSK  = 0x0010;
        const WPA_EAP  = 0x0020;
        const WPA2_EAP = 0x0040;
        const WPA2_PSK = 0x0080;
    }

    /// Encryption types carried by WPS credentials.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WpsEncrTypes: u32 {
        const NONE = 0x0001;
        const WEP  = 0x0002;
        const TKIP = 0x0004;
        const AES  = 0x0008;
    }

    /// Tweaks for the EAP phase 1 / phase 2 argument assembly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AuthFlags: u32 {
        const PHASE2_AUTHEAP = 0x0001;
        const PHASE1_PEAPV0  = 0x0002;
        const PHASE1_PEAPV1  = 0x0004;
    }

    /// Options for the add-network sequence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AddNetworkFlags: u32 {
        /// Purge previously configured networks (and the caller's credential
        /// blobs) before adding the new one.
        const DELETE_OTHER = 0x0001;
        /// Make the new network the selected one.
        const SELECT       = 0x0002;
        /// Make sure the new network ends up enabled, waiting for it to
        /// initialize first if necessary.
        const ENABLE       = 0x0004;
    }
}

pub(crate) const CAP_NAMES: &[(&str, Caps)] = &[
    ("ap", Caps::AP),
    ("ibss-rsn", Caps::IBSS_RSN),
    ("p2p", Caps::P2P),
    ("interworking", Caps::INTERWORKING),
];

pub(crate) const EAP_METHOD_NAMES: &[(&str, EapMethods)] = &[
    ("MD5", EapMethods::MD5),
    ("TLS", EapMethods::TLS),
    ("MSCHAPV2", EapMethods::MSCHAPV2),
    ("PEAP", EapMethods::PEAP),
    ("TTLS", EapMethods::TTLS),
    ("GTC", EapMethods::GTC),
    ("OTP", EapMethods::OTP),
    ("SIM", EapMethods::SIM),
    ("LEAP", EapMethods::LEAP),
    ("PSK", EapMethods::PSK),
    ("AKA", EapMethods::AKA),
    ("FAST", EapMethods::FAST),
    ("PAX", EapMethods::PAX),
    ("SAKE", EapMethods::SAKE),
    ("GPSK", EapMethods::GPSK),
    ("WSC", EapMethods::WSC),
    ("IKEV2", EapMethods::IKEV2),
    ("TNC", EapMethods::TNC),
    ("PWD", EapMethods::PWD),
];

pub(crate) const KEYMGMT_NAMES: &[(&str, KeyMgmts)] = &[
    ("none", KeyMgmts::NONE),
    ("wpa-psk", KeyMgmts::WPA_PSK),
    ("wpa-ft-psk", KeyMgmts::WPA_FT_PSK),
    ("wpa-psk-sha256", KeyMgmts::WPA_PSK_SHA256),
    ("wpa-eap", KeyMgmts::WPA_EAP),
    ("wpa-ft-eap", KeyMgmts::WPA_FT_EAP),
    ("wpa-eap-sha256", KeyMgmts::WPA_EAP_SHA256),
    ("ieee8021x", KeyMgmts::IEEE8021X),
    ("wpa-none", KeyMgmts::WPA_NONE),
    ("wps", KeyMgmts::WPS),
];

pub(crate) const CIPHER_NAMES: &[(&str, Ciphers)] = &[
    ("none", Ciphers::NONE),
    ("ccmp", Ciphers::CCMP),
    ("tkip", Ciphers::TKIP),
    ("wep104", Ciphers::WEP104),
    ("wep40", Ciphers::WEP40),
    ("aes128cmac", Ciphers::AES128_CMAC),
];

pub(crate) const PROTOCOL_NAMES: &[(&str, Protocols)] =
    &[("rsn", Protocols::RSN), ("wpa", Protocols::WPA)];

pub(crate) const AUTH_ALG_NAMES: &[(&str, AuthAlgs)] = &[
    ("open", AuthAlgs::OPEN),
    ("shared", AuthAlgs::SHARED),
    ("leap", AuthAlgs::LEAP),
];

pub(crate) const SCAN_CAP_NAMES: &[(&str, ScanCaps)] = &[
    ("active", ScanCaps::ACTIVE),
    ("passive", ScanCaps::PASSIVE),
    ("ssid", ScanCaps::SSID),
];

pub(crate) const MODE_CAP_NAMES: &[(&str, ModeCaps)] = &[
    ("infrastructure", ModeCaps::INFRA),
    ("ad-hoc", ModeCaps::AD_HOC),
    ("ap", ModeCaps::AP),
    ("p2p", ModeCaps::P2P),
];

pub(crate) const AUTH_TYPE_NAMES: &[(&str, AuthTypes)] = &[
    ("open", AuthTypes::OPEN),
    ("shared", AuthTypes::SHARED),
    ("wpa-psk", AuthTypes::WPA_PSK),
    ("wpa-eap", AuthTypes::WPA_EAP),
    ("wpa2-eap", AuthTypes::WPA2_EAP),
    ("wpa2-psk", AuthTypes::WPA2_PSK),
];

pub(crate) const WPS_ENCR_NAMES: &[(&str, WpsEncrTypes)] = &[
    ("none", WpsEncrTypes::NONE),
    ("wep", WpsEncrTypes::WEP),
    ("tkip", WpsEncrTypes::TKIP),
    ("aes", WpsEncrTypes::AES),
];

/// Accumulates a bitmask from a list of value names.
///
/// Unknown names are logged and skipped. The one exception is the `sae`
/// key management suite, which newer supplicants advertise but this client
/// does not negotiate; it is skipped silently.
pub(crate) fn bits_from_names<F>(key: &str, names: &[String], table: &[(&str, F)]) -> F
where
    F: Flags + Copy,
{
    let mut mask = F::empty();
    for name in names {
        match table.iter().find(|(n, _)| *n == name.as_str()) {
            Some((_, flag)) => mask = mask.union(*flag),
            None if key == "KeyMgmt" && name == "sae" => {}
            None => warn!("Unexpected {key} value {name}"),
        }
    }
    mask
}

/// Joins the names of the set bits with a separator, in table order.
pub(crate) fn names_from_bits<F>(value: F, separator: char, table: &[(&str, F)]) -> Option<String>
where
    F: Flags + Copy,
{
    let mut buf = String::new();
    for (name, flag) in table {
        if value.contains(*flag) {
            if !buf.is_empty() {
                buf.push(separator);
            }
            buf.push_str(name);
        }
    }
    (!buf.is_empty()).then_some(buf)
}

/// Capability dictionary of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceCaps {
    pub keymgmt: KeyMgmts,
    pub pairwise: Ciphers,
    pub group: Ciphers,
    pub protocol: Protocols,
    pub auth_alg: AuthAlgs,
    pub scan: ScanCaps,
    pub modes: ModeCaps,
    pub max_scan_ssid: i32,
}

/// Parameters for creating a new interface on the root object.
#[derive(Debug, Clone, Default)]
pub struct CreateInterfaceParams {
    pub ifname: String,
    pub bridge_ifname: Option<String>,
    pub driver: Option<String>,
    pub config_file: Option<String>,
}

/// Parameters for an interface scan.
#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    pub scan_type: ScanType,
    pub ssids: Vec<Vec<u8>>,
    pub ies: Vec<Vec<u8>>,
    /// (center frequency, width) pairs in MHz.
    pub channels: Vec<(u32, u32)>,
    pub allow_roam: Option<bool>,
}

/// Parameters describing a network configuration to be added.
///
/// Only the fields relevant for the chosen [`Security`] are consulted when
/// the argument dictionary is assembled.
#[derive(Debug, Clone, Default)]
pub struct NetworkParams {
    pub ssid: Vec<u8>,
    pub mode: OpMode,
    pub security: Security,
    pub auth_flags: AuthFlags,
    pub eap: Option<EapMethod>,
    pub scan_ssid: u32,
    pub frequency: u32,
    pub protocol: Protocols,
    pub pairwise: Ciphers,
    pub group: Ciphers,
    pub bgscan: Option<String>,
    pub passphrase: Option<String>,
    // EAP
    pub identity: Option<String>,
    pub anonymous_identity: Option<String>,
    pub ca_cert_file: Option<String>,
    pub client_cert_file: Option<String>,
    pub private_key_file: Option<String>,
    pub private_key_passphrase: Option<String>,
    pub subject_match: Option<String>,
    pub altsubject_match: Option<String>,
    pub domain_suffix_match: Option<String>,
    pub domain_match: Option<String>,
    pub phase2: EapMethods,
    pub ca_cert_file2: Option<String>,
    pub client_cert_file2: Option<String>,
    pub private_key_file2: Option<String>,
    pub private_key_passphrase2: Option<String>,
    pub subject_match2: Option<String>,
    pub altsubject_match2: Option<String>,
    pub domain_suffix_match2: Option<String>,
}

/// Named credential blobs uploaded ahead of network creation, in a stable
/// order.
pub type BlobSet = BTreeMap<String, Vec<u8>>;

/// Parameters for a WPS connect attempt.
#[derive(Debug, Clone, Default)]
pub struct WpsParams {
    pub role: WpsRole,
    pub auth: WpsAuth,
    pub pin: Option<String>,
    pub bssid: Option<Vec<u8>>,
    pub p2p_address: Option<Vec<u8>>,
}

/// Credentials delivered by the supplicant during a WPS exchange.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WpsCredentials {
    pub bssid: Option<Vec<u8>>,
    pub ssid: Option<Vec<u8>>,
    pub auth_types: AuthTypes,
    pub encr_types: WpsEncrTypes,
    pub key: Option<Vec<u8>>,
    pub key_index: u32,
}

/// Result of a signal poll on an interface.
///
/// Fields the driver did not report are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalPoll {
    /// Link speed (Mbps).
    pub linkspeed: Option<i32>,
    /// Noise (dBm).
    pub noise: Option<i32>,
    /// Frequency (MHz).
    pub frequency: Option<u32>,
    /// RSSI (dBm).
    pub rssi: Option<i32>,
    /// Average RSSI (dBm).
    pub avg_rssi: Option<i32>,
    /// VHT segment 1 frequency (MHz).
    pub center_frq1: Option<i32>,
    /// VHT segment 2 frequency (MHz).
    pub center_frq2: Option<i32>,
}

/// Credentials used when provisioning a network from a visible BSS.
///
/// The security level itself comes from the BSS; these supply whatever
/// secrets that level needs.
#[derive(Debug, Clone, Default)]
pub struct BssConnectParams {
    pub auth_flags: AuthFlags,
    pub eap: Option<EapMethod>,
    pub bgscan: Option<String>,
    pub passphrase: Option<String>,
    pub identity: Option<String>,
    pub anonymous_identity: Option<String>,
    pub ca_cert_file: Option<String>,
    pub client_cert_file: Option<String>,
    pub private_key_file: Option<String>,
    pub private_key_passphrase: Option<String>,
    pub subject_match: Option<String>,
    pub altsubject_match: Option<String>,
    pub domain_suffix_match: Option<String>,
    pub domain_match: Option<String>,
    pub phase2: EapMethods,
    pub ca_cert_file2: Option<String>,
    pub client_cert_file2: Option<String>,
    pub private_key_file2: Option<String>,
    pub private_key_passphrase2: Option<String>,
    pub subject_match2: Option<String>,
    pub altsubject_match2: Option<String>,
    pub domain_suffix_match2: Option<String>,
}
