//! Tests for the public parameter and error surface.
//!
//! These exercise the pieces a caller interacts with before any D-Bus
//! traffic happens: parameter defaults, flag combinations, and the error
//! taxonomy.

use suprs::{
    AddNetworkFlags, BlobSet, Error, NetworkParams, RemoteError, ScanParams, ScanType, Security,
    WpsAuth, WpsOutcome, WpsParams, WpsRole,
};

#[test]
fn network_params_default_is_open_infrastructure() {
    let np = NetworkParams::default();
    assert_eq!(np.security, Security::None);
    assert!(np.ssid.is_empty());
    assert!(np.passphrase.is_none());
    assert!(np.eap.is_none());
    assert!(np.phase2.is_empty());
}

#[test]
fn scan_params_default_is_passive() {
    let params = ScanParams::default();
    assert_eq!(params.scan_type, ScanType::Passive);
    assert!(params.ssids.is_empty());
    assert!(params.channels.is_empty());
    assert!(params.allow_roam.is_none());
}

#[test]
fn wps_params_default_is_push_button_enrollee() {
    let params = WpsParams::default();
    assert_eq!(params.role, WpsRole::Enrollee);
    assert_eq!(params.auth, WpsAuth::PushButton);
    assert!(params.pin.is_none());
}

#[test]
fn add_network_flag_combinations() {
    let flags = AddNetworkFlags::DELETE_OTHER | AddNetworkFlags::ENABLE;
    assert!(flags.contains(AddNetworkFlags::DELETE_OTHER));
    assert!(flags.contains(AddNetworkFlags::ENABLE));
    assert!(!flags.contains(AddNetworkFlags::SELECT));
    assert!(AddNetworkFlags::default().is_empty());
}

#[test]
fn blob_set_iterates_in_name_order() {
    let mut blobs = BlobSet::new();
    blobs.insert("z-key".to_string(), vec![3]);
    blobs.insert("a-cert".to_string(), vec![1]);
    blobs.insert("m-chain".to_string(), vec![2]);
    let names: Vec<&str> = blobs.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["a-cert", "m-chain", "z-key"]);
}

#[test]
fn remote_errors_map_from_bus_names() {
    assert_eq!(
        RemoteError::from_name("fi.w1.wpa_supplicant1.NetworkUnknown"),
        Some(RemoteError::NetworkUnknown)
    );
    assert_eq!(RemoteError::from_name("InterfaceDisabled").map(|e| e.name()),
        Some("InterfaceDisabled"));
    assert_eq!(RemoteError::from_name("org.freedesktop.DBus.Error.Failed"), None);
}

#[test]
fn error_taxonomy_display() {
    assert_eq!(Error::Cancelled.to_string(), "operation cancelled");
    assert_eq!(Error::NotValid.to_string(), "object is not valid");
    assert_eq!(Error::Timeout.to_string(), "WPS connect timed out");
    assert_eq!(
        Error::WpsFailed(WpsOutcome::M2d).to_string(),
        "WPS connect failed (m2d)"
    );
    assert_eq!(
        Error::Remote(RemoteError::BlobExists).to_string(),
        "supplicant error: BlobExists"
    );
}

#[test]
fn cancellation_is_not_a_remote_error() {
    assert!(!Error::Cancelled.is_remote(RemoteError::UnknownError));
    assert!(Error::Remote(RemoteError::BlobUnknown).is_remote(RemoteError::BlobUnknown));
}
