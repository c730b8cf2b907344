//! D-Bus proxy traits for the wpa_supplicant interfaces.
//!
//! These traits define the `fi.w1.wpa_supplicant1` D-Bus API surface used
//! by this crate. The `zbus::proxy` macro generates proxy implementations
//! that handle D-Bus communication automatically.
//!
//! # wpa_supplicant D-Bus structure
//!
//! - `/fi/w1/wpa_supplicant1` - root object
//! - `/fi/w1/wpa_supplicant1/Interfaces/*` - per-radio interfaces, each
//!   also exposing the WPS sub-interface
//! - `.../Interfaces/*/BSSs/*` - visible access points
//! - `.../Interfaces/*/Networks/*` - configured networks

use std::collections::HashMap;
use zbus::proxy;
use zvariant::{OwnedObjectPath, OwnedValue, Value};

/// Proxy for the root supplicant interface.
#[proxy(
    interface = "fi.w1.wpa_supplicant1",
    default_service = "fi.w1.wpa_supplicant1",
    default_path = "/fi/w1/wpa_supplicant1"
)]
pub trait Wpas {
    /// Starts managing an interface; returns the new object's path.
    fn create_interface(
        &self,
        args: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<OwnedObjectPath>;

    /// Stops managing the interface at `path`.
    fn remove_interface(&self, path: OwnedObjectPath) -> zbus::Result<()>;

    /// Resolves an interface name to its object path.
    fn get_interface(&self, ifname: &str) -> zbus::Result<OwnedObjectPath>;

    /// Signal emitted when an interface is added.
    #[zbus(signal)]
    fn interface_added(
        &self,
        path: OwnedObjectPath,
        properties: HashMap<String, OwnedValue>,
    );

    /// Signal emitted when an interface is removed.
    #[zbus(signal)]
    fn interface_removed(&self, path: OwnedObjectPath);

    /// Global capability strings.
    #[zbus(property)]
    fn capabilities(&self) -> zbus::Result<Vec<String>>;

    /// Names of the supported EAP methods.
    #[zbus(property)]
    fn eap_methods(&self) -> zbus::Result<Vec<String>>;

    /// Paths of the managed interfaces.
    #[zbus(property)]
    fn interfaces(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

/// Proxy for one managed interface.
#[proxy(
    interface = "fi.w1.wpa_supplicant1.Interface",
    default_service = "fi.w1.wpa_supplicant1"
)]
pub trait WpasInterface {
    /// Triggers a scan. `args` carries at least the scan `Type`.
    fn scan(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    fn disconnect(&self) -> zbus::Result<()>;

    fn reassociate(&self) -> zbus::Result<()>;

    fn reconnect(&self) -> zbus::Result<()>;

    fn reattach(&self) -> zbus::Result<()>;

    /// Configures automatic scanning ("" disables it).
    fn auto_scan(&self, arg: &str) -> zbus::Result<()>;

    /// Flushes BSS cache entries older than `age` seconds.
    #[zbus(name = "FlushBSS")]
    fn flush_bss(&self, age: u32) -> zbus::Result<()>;

    /// Per-connection signal quality data.
    fn signal_poll(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Adds a network configuration; returns the new object's path.
    fn add_network(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<OwnedObjectPath>;

    /// Selects the network at `path`, deselecting all others.
    fn select_network(&self, path: OwnedObjectPath) -> zbus::Result<()>;

    /// Removes the network at `path`.
    fn remove_network(&self, path: OwnedObjectPath) -> zbus::Result<()>;

    fn remove_all_networks(&self) -> zbus::Result<()>;

    /// Uploads a named credential blob.
    fn add_blob(&self, name: &str, data: Vec<u8>) -> zbus::Result<()>;

    /// Removes a named credential blob.
    fn remove_blob(&self, name: &str) -> zbus::Result<()>;

    /// Signal emitted when a BSS becomes visible.
    #[zbus(signal, name = "BSSAdded")]
    fn bss_added(&self, path: OwnedObjectPath, properties: HashMap<String, OwnedValue>);

    /// Signal emitted when a BSS disappears.
    #[zbus(signal, name = "BSSRemoved")]
    fn bss_removed(&self, path: OwnedObjectPath);

    /// Signal emitted when a network is added.
    #[zbus(signal)]
    fn network_added(&self, path: OwnedObjectPath, properties: HashMap<String, OwnedValue>);

    /// Signal emitted when a network is removed.
    #[zbus(signal)]
    fn network_removed(&self, path: OwnedObjectPath);

    /// Signal emitted when the selected network changes.
    #[zbus(signal)]
    fn network_selected(&self, path: OwnedObjectPath);

    /// Signal emitted when a station authorizes (AP mode).
    #[zbus(signal)]
    fn sta_authorized(&self, name: String);

    /// Signal emitted when a station deauthorizes (AP mode).
    #[zbus(signal)]
    fn sta_deauthorized(&self, name: String);

    /// Connection state name.
    #[zbus(property)]
    fn state(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn scanning(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn ap_scan(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn set_ap_scan(&self, value: u32) -> zbus::Result<()>;

    #[zbus(property)]
    fn country(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn set_country(&self, value: &str) -> zbus::Result<()>;
}

/// Proxy for the WPS sub-interface of a managed interface.
#[proxy(
    interface = "fi.w1.wpa_supplicant1.Interface.WPS",
    default_service = "fi.w1.wpa_supplicant1"
)]
pub trait WpasInterfaceWps {
    /// Starts a WPS session; the reply may carry a `Pin` to display.
    fn start(
        &self,
        args: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Cancels the ongoing WPS session.
    fn cancel(&self) -> zbus::Result<()>;

    /// Session outcome events ("success", "fail", "m2d", "pbc-overlap").
    #[zbus(signal)]
    fn event(&self, event_type: String, args: HashMap<String, OwnedValue>);

    /// Credentials delivered during the exchange.
    #[zbus(signal)]
    fn credentials(&self, args: HashMap<String, OwnedValue>);
}

/// Proxy for one visible BSS. Read-only.
#[proxy(
    interface = "fi.w1.wpa_supplicant1.BSS",
    default_service = "fi.w1.wpa_supplicant1"
)]
pub trait WpasBss {
    /// SSID as raw bytes (may not be valid UTF-8).
    #[zbus(property, name = "SSID")]
    fn ssid(&self) -> zbus::Result<Vec<u8>>;

    /// BSSID as raw bytes.
    #[zbus(property, name = "BSSID")]
    fn bssid(&self) -> zbus::Result<Vec<u8>>;

    /// WPA security dictionary.
    #[zbus(property, name = "WPA")]
    fn wpa(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// RSN (WPA2) security dictionary.
    #[zbus(property, name = "RSN")]
    fn rsn(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Raw information elements.
    #[zbus(property, name = "IEs")]
    fn ies(&self) -> zbus::Result<Vec<u8>>;

    #[zbus(property)]
    fn privacy(&self) -> zbus::Result<bool>;

    /// "infrastructure" or "ad-hoc".
    #[zbus(property)]
    fn mode(&self) -> zbus::Result<String>;

    /// Operating frequency in MHz.
    #[zbus(property)]
    fn frequency(&self) -> zbus::Result<u16>;

    /// Supported rates in bit/s.
    #[zbus(property)]
    fn rates(&self) -> zbus::Result<Vec<u32>>;

    /// Signal strength in dBm.
    #[zbus(property)]
    fn signal(&self) -> zbus::Result<i16>;
}

/// Proxy for one configured network.
#[proxy(
    interface = "fi.w1.wpa_supplicant1.Network",
    default_service = "fi.w1.wpa_supplicant1"
)]
pub trait WpasNetwork {
    /// The network's configuration dictionary.
    #[zbus(property)]
    fn properties(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn enabled(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_enabled(&self, value: bool) -> zbus::Result<()>;
}
