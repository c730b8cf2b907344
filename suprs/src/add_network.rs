//! The add-network provisioning sequence.
//!
//! Provisioning a network is a multi-step protocol, not a single call:
//! optionally purge the previously configured networks together with the
//! caller's credential blobs, upload the new blobs one at a time, create
//! the network object, optionally select it, and optionally make sure it
//! ends up enabled, waiting for the freshly created proxy to initialize
//! first. The sequence reports back exactly once, with the new network's
//! path or the first error; a created network is never rolled back on a
//! later failure.

use log::{debug, error, warn};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::dict::{Dict, Value, hex_to_bin};
use crate::interface::Interface;
use crate::models::{
    AddNetworkFlags, AuthFlags, BlobSet, EAP_METHOD_NAMES, EapMethod, Error, NetworkParams,
    RemoteError, Security, names_from_bits,
};
use crate::models::{Ciphers, Protocols};
use crate::network::{Network, NetworkProperty};
use crate::transport::Request;
use crate::wait::NetworkSubscription;

// The args tables use the capitalized spellings wpa_supplicant expects in
// a network block, unlike the lowercase property values.
const ARG_CIPHER_NAMES: &[(&str, Ciphers)] = &[
    ("CCMP", Ciphers::CCMP),
    ("TKIP", Ciphers::TKIP),
    ("WEP104", Ciphers::WEP104),
    ("WEP40", Ciphers::WEP40),
];

const ARG_PROTO_NAMES: &[(&str, Protocols)] =
    &[("RSN", Protocols::RSN), ("WPA", Protocols::WPA)];

impl Interface {
    /// Adds a network configuration and returns its object path. See
    /// [`Interface::add_network_full`] for the whole story.
    pub async fn add_network(
        &self,
        params: &NetworkParams,
        flags: AddNetworkFlags,
    ) -> Result<String> {
        self.add_network_full(params, flags, &BlobSet::new(), &CancellationToken::new())
            .await
    }

    /// Adds a network configuration, with credential blobs and external
    /// cancellation.
    ///
    /// With `DELETE_OTHER`, the named blobs are first removed one at a
    /// time (a blob the service does not know is as good as removed) and
    /// every configured network is purged. The blobs are then uploaded,
    /// strictly before the network is created. With `SELECT` the new
    /// network is made the active one. With `ENABLE` the sequence waits
    /// for the new network proxy to become valid, requests enable, and
    /// waits for the service to confirm it; losing the network's validity
    /// during either wait fails the operation instead of hanging it.
    ///
    /// Errors reported by the service are passed through verbatim; there
    /// are no retries. A partial failure (network added, select or enable
    /// failed) leaves the network configured.
    pub async fn add_network_full(
        &self,
        params: &NetworkParams,
        flags: AddNetworkFlags,
        blobs: &BlobSet,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if !self.valid() {
            return Err(Error::NotValid);
        }
        let args = network_args(params, blobs);

        if flags.contains(AddNetworkFlags::DELETE_OTHER) {
            for name in blobs.keys() {
                debug!("[{}] removing blob {name}", self.path());
                match self.call(cancel, Request::RemoveBlob(name.clone())).await {
                    Ok(_) => {}
                    Err(e) if e.is_remote(RemoteError::BlobUnknown) => {}
                    Err(e) => return Err(e),
                }
            }
            self.call(cancel, Request::RemoveAllNetworks).await?;
            debug!("[{}] removed all networks", self.path());
        }

        for (name, blob) in blobs {
            debug!("[{}] uploading blob {name}", self.path());
            self.call(cancel, Request::AddBlob(name.clone(), blob.clone()))
                .await?;
        }

        let path = self
            .call(cancel, Request::AddNetwork(args))
            .await?
            .into_path()
            .ok_or(Error::Remote(RemoteError::UnknownError))?;
        debug!("[{}] added {path}", self.path());

        // Obtain the proxy right away: it resolves while the network is
        // being selected.
        let network = if flags.contains(AddNetworkFlags::ENABLE) {
            Some(self.network(&path)?)
        } else {
            None
        };

        if flags.contains(AddNetworkFlags::SELECT) {
            self.call(cancel, Request::SelectNetwork(path.clone()))
                .await?;
            debug!("[{}] selected {path}", self.path());
        }

        if let Some(network) = network {
            wait_network_valid(&network, cancel).await?;
            ensure_network_enabled(&network, cancel).await?;
        }

        Ok(path)
    }
}

/// Waits for a freshly created network proxy to finish initializing. A
/// validity change that is not a validity gain means the network went away
/// underneath us.
async fn wait_network_valid(network: &Network, cancel: &CancellationToken) -> Result<()> {
    if network.valid() {
        return Ok(());
    }
    debug!("waiting for {} to initialize", network.path());
    let mut sub = NetworkSubscription::new(network, &[NetworkProperty::Valid]);
    sub.changed(cancel).await?;
    if network.valid() {
        Ok(())
    } else {
        Err(Error::EnableFailed(network.path().to_string()))
    }
}

/// Requests enable on a valid network and waits for the service to confirm
/// it, watching validity the whole time.
async fn ensure_network_enabled(network: &Network, cancel: &CancellationToken) -> Result<()> {
    if network.enabled() {
        debug!("{} already enabled", network.path());
        return Ok(());
    }
    let mut sub = NetworkSubscription::new(
        network,
        &[NetworkProperty::Enabled, NetworkProperty::Valid],
    );
    match network.set_enabled_full(true, cancel).await {
        Ok(()) => {}
        Err(Error::NotValid) => {
            return Err(Error::EnableFailed(network.path().to_string()));
        }
        Err(e) => return Err(e),
    }
    debug!("waiting for {} to become enabled", network.path());
    loop {
        if network.enabled() {
            return Ok(());
        }
        if !network.valid() {
            return Err(Error::EnableFailed(network.path().to_string()));
        }
        sub.changed(cancel).await?;
    }
}

/// Assembles the argument dictionary for the AddNetwork call.
pub(crate) fn network_args(np: &NetworkParams, blobs: &BlobSet) -> Dict {
    let mut args = Dict::new();
    if !np.ssid.is_empty() {
        args.add_bytes("ssid", &np.ssid);
    }
    if np.frequency != 0 {
        args.add_u32("frequency", np.frequency);
    }
    args.add_str_ne("bgscan", np.bgscan.as_deref());
    args.add_u32("scan_ssid", np.scan_ssid);
    args.add_u32("mode", np.mode.code());
    let key_mgmt;
    let mut auth_alg = None;
    match np.security {
        Security::None => {
            debug!("no security");
            key_mgmt = "NONE";
            auth_alg = Some("OPEN");
        }
        Security::Wep => {
            debug!("WEP security");
            key_mgmt = "NONE";
            auth_alg = Some("OPEN SHARED");
            wep_args(&mut args, np);
            cipher_args(&mut args, np);
        }
        Security::Psk => {
            debug!("PSK security");
            key_mgmt = "WPA-PSK";
            psk_args(&mut args, np);
            proto_args(&mut args, np);
            cipher_args(&mut args, np);
        }
        Security::Eap => {
            debug!("EAP security");
            key_mgmt = "WPA-EAP";
            eap_args(&mut args, np, blobs);
            proto_args(&mut args, np);
            cipher_args(&mut args, np);
        }
    }
    args.add_str0("auth_alg", auth_alg);
    args.add_str("key_mgmt", key_mgmt);
    args
}

fn wep_args(args: &mut Dict, np: &NetworkParams) {
    if let Some(passphrase) = np.passphrase.as_deref()
        && !passphrase.is_empty()
    {
        let key = "wep_key0";
        // 10 or 26 hex digits is the binary form of a 40/104-bit WEP key
        let bin = if passphrase.len() == 10 || passphrase.len() == 26 {
            hex_to_bin(passphrase)
        } else {
            None
        };
        match bin {
            Some(bin) => args.insert(key, Value::Bytes(bin)),
            None => args.add_str(key, passphrase),
        }
        args.add_u32("wep_tx_keyidx", 0);
    }
}

fn psk_args(args: &mut Dict, np: &NetworkParams) {
    if let Some(passphrase) = np.passphrase.as_deref()
        && !passphrase.is_empty()
    {
        // 64 hex digits is the binary form of the 256-bit pre-shared key
        let bin = if passphrase.len() == 64 {
            hex_to_bin(passphrase)
        } else {
            None
        };
        match bin {
            Some(bin) => args.insert("psk", Value::Bytes(bin)),
            None => args.add_str("psk", passphrase),
        }
    }
}

fn cipher_args(args: &mut Dict, np: &NetworkParams) {
    if let Some(pairwise) = names_from_bits(np.pairwise, ' ', ARG_CIPHER_NAMES) {
        args.add_str("pairwise", &pairwise);
    }
    if let Some(group) = names_from_bits(np.group, ' ', ARG_CIPHER_NAMES) {
        args.add_str("group", &group);
    }
}

fn proto_args(args: &mut Dict, np: &NetworkParams) {
    if let Some(proto) = names_from_bits(np.protocol, ' ', ARG_PROTO_NAMES) {
        args.add_str("proto", &proto);
    }
}

fn eap_args(args: &mut Dict, np: &NetworkParams, blobs: &BlobSet) {
    let ca_cert = check_blob_or_abs_path(np.ca_cert_file.as_deref(), blobs);
    let client_cert = check_blob_or_abs_path(np.client_cert_file.as_deref(), blobs);
    let Some(method) = np.eap else {
        error!("No EAP method specified!");
        return;
    };
    args.add_str("eap", method.name());
    match method {
        EapMethod::Peap | EapMethod::Ttls => phase_args(args, np, blobs),
        EapMethod::Tls => {}
        other => warn!("Unsupported EAP method {other}"),
    }
    args.add_str_ne("identity", np.identity.as_deref());
    args.add_str_ne("anonymous_identity", np.anonymous_identity.as_deref());
    args.add_str_ne("password", np.passphrase.as_deref());
    args.add_str0("ca_cert", ca_cert);
    if let Some(client_cert) = client_cert {
        if let Some(key_file) = np
            .private_key_file
            .as_deref()
            .filter(|f| !f.is_empty())
        {
            if let Some(private_key) = check_blob_or_abs_path(Some(key_file), blobs) {
                args.add_str("client_cert", client_cert);
                args.add_str("private_key", private_key);
                args.add_str_ne(
                    "private_key_passwd",
                    np.private_key_passphrase.as_deref(),
                );
            }
        } else {
            warn!("Missing private key");
        }
    }
    args.add_str_ne("domain_match", np.domain_match.as_deref());
    args.add_str_ne("subject_match", np.subject_match.as_deref());
    args.add_str_ne("altsubject_match", np.altsubject_match.as_deref());
    args.add_str_ne("domain_suffix_match", np.domain_suffix_match.as_deref());
}

fn phase_args(args: &mut Dict, np: &NetworkParams, blobs: &BlobSet) {
    if np.eap == Some(EapMethod::Peap) {
        let phase1 = np.auth_flags & (AuthFlags::PHASE1_PEAPV0 | AuthFlags::PHASE1_PEAPV1);
        if phase1 == AuthFlags::PHASE1_PEAPV0 {
            args.add_str("phase1", "peapver=0");
        } else if phase1 == AuthFlags::PHASE1_PEAPV1 {
            args.add_str("phase1", "peapver=1");
        } else if !phase1.is_empty() {
            warn!("Trying to force PEAPv0 and v1, ignoring");
        }
    }
    // Multiple protocols in phase2 are allowed, e.g.
    // "autheap=MSCHAPV2 autheap=MD5" for EAP-TTLS
    if !np.phase2.is_empty() {
        let ca_cert2 = check_blob_or_abs_path(np.ca_cert_file2.as_deref(), blobs);
        let client_cert2 = check_blob_or_abs_path(np.client_cert_file2.as_deref(), blobs);
        let auth = if np.auth_flags.contains(AuthFlags::PHASE2_AUTHEAP) {
            "autheap"
        } else {
            "auth"
        };
        let mut buf = String::new();
        for (name, flag) in EAP_METHOD_NAMES {
            if np.phase2.contains(*flag) {
                if !buf.is_empty() {
                    buf.push(' ');
                }
                buf.push_str(auth);
                buf.push('=');
                buf.push_str(name);
            }
        }
        if !buf.is_empty() {
            args.add_str("phase2", &buf);
        }
        args.add_str0("ca_cert2", ca_cert2);
        if let Some(client_cert2) = client_cert2 {
            if let Some(key_file2) = np
                .private_key_file2
                .as_deref()
                .filter(|f| !f.is_empty())
            {
                if check_blob_or_abs_path(Some(key_file2), blobs).is_some() {
                    args.add_str("client_cert2", client_cert2);
                    args.add_str("private_key2", key_file2);
                    args.add_str_ne(
                        "private_key_passwd2",
                        np.private_key_passphrase2.as_deref(),
                    );
                }
            } else {
                warn!("Missing private key for phase2");
            }
        }
        args.add_str_ne("subject_match2", np.subject_match2.as_deref());
        args.add_str_ne("altsubject_match2", np.altsubject_match2.as_deref());
        args.add_str_ne("domain_suffix_match2", np.domain_suffix_match2.as_deref());
    }
}

/// Accepts either a `blob://` reference into the uploaded blob set or an
/// absolute path to an existing file; anything else is dropped with a
/// warning.
fn check_blob_or_abs_path<'a>(path: Option<&'a str>, blobs: &BlobSet) -> Option<&'a str> {
    let path = path.filter(|p| !p.is_empty())?;
    if let Some(name) = path.strip_prefix("blob://") {
        if blobs.contains_key(name) {
            Some(path)
        } else {
            warn!("No such blob: {path}");
            None
        }
    } else if !Path::new(path).is_absolute() {
        warn!("Not an absolute path: {path}");
        None
    } else if !Path::new(path).is_file() {
        warn!("No such file: {path}");
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EapMethods, OpMode};
    use crate::supplicant::{SUPPLICANT_PATH, Supplicant};
    use crate::testutil::{MockReply, MockTransport, settle};
    use crate::transport::{BusEvent, Reply, Transport};
    use std::rc::Rc;
    use tokio::task::LocalSet;

    const IFACE_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/1";
    const NET_PATH: &str = "/fi/w1/wpa_supplicant1/Interfaces/1/Networks/0";

    #[test]
    fn args_open_network() {
        let np = NetworkParams {
            ssid: b"cafe".to_vec(),
            security: Security::None,
            scan_ssid: 1,
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        assert_eq!(args.bytes_value("ssid"), Some(&b"cafe"[..]));
        assert_eq!(args.str_value("key_mgmt"), Some("NONE"));
        assert_eq!(args.str_value("auth_alg"), Some("OPEN"));
        assert_eq!(args.u32_value("scan_ssid"), Some(1));
        assert_eq!(args.u32_value("mode"), Some(0));
        assert!(!args.contains_key("psk"));
        assert!(!args.contains_key("frequency"));
    }

    #[test]
    fn args_psk_plaintext_and_hex() {
        let mut np = NetworkParams {
            ssid: b"home".to_vec(),
            security: Security::Psk,
            passphrase: Some("hunter2hunter2".into()),
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        assert_eq!(args.str_value("psk"), Some("hunter2hunter2"));
        assert_eq!(args.str_value("key_mgmt"), Some("WPA-PSK"));
        assert!(!args.contains_key("auth_alg"));

        // 64 hex digits goes over the wire as the raw 256-bit key
        np.passphrase = Some("ab".repeat(32));
        let args = network_args(&np, &BlobSet::new());
        assert_eq!(args.bytes_value("psk"), Some(&[0xabu8; 32][..]));
    }

    #[test]
    fn args_wep_hex_key_detection() {
        let np = NetworkParams {
            ssid: b"old".to_vec(),
            security: Security::Wep,
            passphrase: Some("0102030405".into()),
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        assert_eq!(
            args.bytes_value("wep_key0"),
            Some(&[1u8, 2, 3, 4, 5][..])
        );
        assert_eq!(args.u32_value("wep_tx_keyidx"), Some(0));
        assert_eq!(args.str_value("auth_alg"), Some("OPEN SHARED"));
        assert_eq!(args.str_value("key_mgmt"), Some("NONE"));
    }

    #[test]
    fn args_cipher_and_proto_tables() {
        let np = NetworkParams {
            ssid: b"x".to_vec(),
            security: Security::Psk,
            protocol: Protocols::RSN | Protocols::WPA,
            pairwise: Ciphers::CCMP | Ciphers::TKIP,
            group: Ciphers::TKIP,
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        assert_eq!(args.str_value("proto"), Some("RSN WPA"));
        assert_eq!(args.str_value("pairwise"), Some("CCMP TKIP"));
        assert_eq!(args.str_value("group"), Some("TKIP"));
    }

    #[test]
    fn args_eap_with_blob_references() {
        let mut blobs = BlobSet::new();
        blobs.insert("ca".to_string(), vec![1, 2, 3]);
        let np = NetworkParams {
            ssid: b"corp".to_vec(),
            security: Security::Eap,
            eap: Some(EapMethod::Peap),
            phase2: EapMethods::MSCHAPV2,
            identity: Some("user@example.com".into()),
            passphrase: Some("secret".into()),
            ca_cert_file: Some("blob://ca".into()),
            ..Default::default()
        };
        let args = network_args(&np, &blobs);
        assert_eq!(args.str_value("eap"), Some("PEAP"));
        assert_eq!(args.str_value("identity"), Some("user@example.com"));
        assert_eq!(args.str_value("password"), Some("secret"));
        assert_eq!(args.str_value("ca_cert"), Some("blob://ca"));
        assert_eq!(args.str_value("phase2"), Some("auth=MSCHAPV2"));
        assert_eq!(args.str_value("key_mgmt"), Some("WPA-EAP"));
    }

    #[test]
    fn args_eap_unknown_blob_is_dropped() {
        let np = NetworkParams {
            ssid: b"corp".to_vec(),
            security: Security::Eap,
            eap: Some(EapMethod::Ttls),
            ca_cert_file: Some("blob://missing".into()),
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        assert!(!args.contains_key("ca_cert"));
    }

    #[test]
    fn args_eap_phase2_autheap() {
        let np = NetworkParams {
            ssid: b"corp".to_vec(),
            security: Security::Eap,
            eap: Some(EapMethod::Ttls),
            auth_flags: AuthFlags::PHASE2_AUTHEAP,
            phase2: EapMethods::MSCHAPV2 | EapMethods::MD5,
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        // Table order: MD5 before MSCHAPV2
        assert_eq!(args.str_value("phase2"), Some("autheap=MD5 autheap=MSCHAPV2"));
    }

    #[test]
    fn args_peap_version_pinning() {
        let np = NetworkParams {
            ssid: b"corp".to_vec(),
            security: Security::Eap,
            eap: Some(EapMethod::Peap),
            auth_flags: AuthFlags::PHASE1_PEAPV1,
            phase2: EapMethods::MSCHAPV2,
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        assert_eq!(args.str_value("phase1"), Some("peapver=1"));
        // Asking for both versions at once is ignored
        let np = NetworkParams {
            auth_flags: AuthFlags::PHASE1_PEAPV0 | AuthFlags::PHASE1_PEAPV1,
            ..np
        };
        let args = network_args(&np, &BlobSet::new());
        assert!(!args.contains_key("phase1"));
    }

    #[test]
    fn args_ibss_mode() {
        let np = NetworkParams {
            ssid: b"adhoc".to_vec(),
            mode: OpMode::Ibss,
            frequency: 2412,
            ..Default::default()
        };
        let args = network_args(&np, &BlobSet::new());
        assert_eq!(args.u32_value("mode"), Some(1));
        assert_eq!(args.u32_value("frequency"), Some(2412));
    }

    fn root_props() -> Dict {
        let mut d = Dict::new();
        d.add_str_list("Capabilities", &[]);
        d.add_str_list("EapMethods", &[]);
        d.add_str_list("Interfaces", &[IFACE_PATH.to_string()]);
        d
    }

    fn iface_props() -> Dict {
        let mut d = Dict::new();
        d.add_str("State", "inactive");
        d.add_str_list("BSSs", &[]);
        d.add_str_list("Networks", &[]);
        d
    }

    fn net_props() -> Dict {
        let mut d = Dict::new();
        d.add_dict("Properties", Dict::new());
        d.add_bool("Enabled", false);
        d
    }

    async fn valid_interface(mock: &Rc<MockTransport>) -> (Supplicant, Interface) {
        mock.put_object(SUPPLICANT_PATH, root_props());
        mock.put_object(IFACE_PATH, iface_props());
        let supplicant = Supplicant::with_transport(Rc::clone(mock) as Rc<dyn Transport>);
        let iface = supplicant.interface(IFACE_PATH);
        settle().await;
        (supplicant, iface)
    }

    fn psk_params() -> NetworkParams {
        NetworkParams {
            ssid: b"home".to_vec(),
            security: Security::Psk,
            passphrase: Some("hunter2hunter2".into()),
            scan_ssid: 1,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_sequence_with_delayed_validity() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;

                let mut blobs = BlobSet::new();
                blobs.insert("ca".to_string(), vec![1, 2]);
                blobs.insert("key".to_string(), vec![3, 4]);

                // The first purge hits a blob the service does not know
                mock.script(
                    IFACE_PATH,
                    "RemoveBlob",
                    MockReply::Err(Error::Remote(RemoteError::BlobUnknown)),
                );
                mock.script(
                    IFACE_PATH,
                    "AddNetwork",
                    MockReply::Ok(Reply::Path(NET_PATH.to_string())),
                );
                mock.put_object(NET_PATH, net_props());
                // The network reports valid only after a delay
                let gate = mock.gate_load(NET_PATH);

                let task = tokio::task::spawn_local({
                    let iface = iface.clone();
                    async move {
                        iface
                            .add_network_full(
                                &psk_params(),
                                AddNetworkFlags::DELETE_OTHER
                                    | AddNetworkFlags::SELECT
                                    | AddNetworkFlags::ENABLE,
                                &blobs,
                                &CancellationToken::new(),
                            )
                            .await
                    }
                });
                settle().await;

                // Every call up to the selection went out in order; the
                // sequence is now suspended on the validity wait
                assert_eq!(
                    mock.methods(IFACE_PATH),
                    vec![
                        "RemoveBlob",
                        "RemoveBlob",
                        "RemoveAllNetworks",
                        "AddBlob",
                        "AddBlob",
                        "AddNetwork",
                        "SelectNetwork",
                    ]
                );
                assert!(!task.is_finished());

                // Delayed validity transition
                gate.notify_one();
                settle().await;
                assert_eq!(mock.methods(NET_PATH), vec!["SetEnabled"]);
                assert!(!task.is_finished());

                // The service confirms the enable
                let mut change = Dict::new();
                change.add_bool("Enabled", true);
                mock.emit(NET_PATH, &BusEvent::PropertiesChanged(change));
                settle().await;

                let path = task.await.unwrap().unwrap();
                assert_eq!(path, NET_PATH);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn add_failure_aborts_the_sequence() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                mock.script(
                    IFACE_PATH,
                    "AddNetwork",
                    MockReply::Err(Error::Remote(RemoteError::NoMemory)),
                );
                let err = iface
                    .add_network(&psk_params(), AddNetworkFlags::SELECT)
                    .await
                    .unwrap_err();
                assert!(err.is_remote(RemoteError::NoMemory));
                assert_eq!(mock.methods(IFACE_PATH), vec!["AddNetwork"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blob_purge_aborts_on_real_errors() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                let mut blobs = BlobSet::new();
                blobs.insert("ca".to_string(), vec![1]);
                mock.script(
                    IFACE_PATH,
                    "RemoveBlob",
                    MockReply::Err(Error::Remote(RemoteError::NotConnected)),
                );
                let err = iface
                    .add_network_full(
                        &psk_params(),
                        AddNetworkFlags::DELETE_OTHER,
                        &blobs,
                        &CancellationToken::new(),
                    )
                    .await
                    .unwrap_err();
                assert!(err.is_remote(RemoteError::NotConnected));
                // Nothing past the failed purge
                assert_eq!(mock.methods(IFACE_PATH), vec!["RemoveBlob"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn validity_loss_while_waiting_for_enable_fails() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                mock.script(
                    IFACE_PATH,
                    "AddNetwork",
                    MockReply::Ok(Reply::Path(NET_PATH.to_string())),
                );
                mock.put_object(NET_PATH, net_props());

                let task = tokio::task::spawn_local({
                    let iface = iface.clone();
                    async move {
                        iface
                            .add_network_full(
                                &psk_params(),
                                AddNetworkFlags::ENABLE,
                                &BlobSet::new(),
                                &CancellationToken::new(),
                            )
                            .await
                    }
                });
                settle().await;
                // Enable requested, waiting for confirmation
                assert_eq!(mock.methods(NET_PATH), vec!["SetEnabled"]);
                assert!(!task.is_finished());

                // The whole tree collapses while we wait
                mock.emit(SUPPLICANT_PATH, &BusEvent::OwnerChanged(false));
                settle().await;
                let err = task.await.unwrap().unwrap_err();
                assert!(matches!(err, Error::EnableFailed(p) if p == NET_PATH));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancellation_during_pending_call_never_reports() {
        LocalSet::new()
            .run_until(async {
                let mock = MockTransport::new();
                let (_supplicant, iface) = valid_interface(&mock).await;
                let gate = Rc::new(tokio::sync::Notify::new());
                mock.script(
                    IFACE_PATH,
                    "AddNetwork",
                    MockReply::OkAfter(Rc::clone(&gate), Reply::Path(NET_PATH.to_string())),
                );
                let cancel = CancellationToken::new();

                let task = tokio::task::spawn_local({
                    let iface = iface.clone();
                    let cancel = cancel.clone();
                    async move {
                        iface
                            .add_network_full(
                                &psk_params(),
                                AddNetworkFlags::SELECT,
                                &BlobSet::new(),
                                &cancel,
                            )
                            .await
                    }
                });
                settle().await;
                assert!(!task.is_finished());

                cancel.cancel();
                let err = task.await.unwrap().unwrap_err();
                assert!(matches!(err, Error::Cancelled));

                // The transport completes the stale call later; it is
                // discarded and the selection never happens
                gate.notify_one();
                settle().await;
                assert_eq!(mock.methods(IFACE_PATH), vec!["AddNetwork"]);
            })
            .await;
    }
}
