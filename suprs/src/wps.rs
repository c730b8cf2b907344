//! WPS (Wi-Fi Protected Setup) pairing.
//!
//! A connect attempt first cancels whatever WPS session the interface may
//! already be running (which also resets the cached credentials), then
//! starts a new session and waits for its outcome. Two independent
//! completion sources race from that point on: the reply to the Start
//! call, and the asynchronous session event, which is free to arrive
//! first. The attempt is only reported done once both a terminal outcome
//! has been observed and the Start call has completed; success carries the
//! optional PIN from the Start reply (shown to the peer in registrar
//! mode). A timer limits the whole attempt and is disarmed by any other
//! terminal transition.

use log::debug;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::dict::Dict;
use crate::interface::Interface;
use crate::models::{
    AUTH_TYPE_NAMES, Error, WPS_ENCR_NAMES, WpsAuth, WpsCredentials, WpsOutcome, WpsParams,
    WpsRole, bits_from_names,
};
use crate::transport::{BusEvent, ObjectKind, Request, WatchGuard};

/// Default time allowed for a WPS exchange to produce an outcome.
pub const WPS_DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

impl Interface {
    /// Runs a WPS connect attempt with the default timeout. On success
    /// returns the PIN from the Start reply, if the service issued one.
    pub async fn wps_connect(&self, params: &WpsParams) -> Result<Option<String>> {
        self.wps_connect_full(
            params,
            Some(WPS_DEFAULT_CONNECT_TIMEOUT),
            &CancellationToken::new(),
        )
        .await
    }

    /// Runs a WPS connect attempt. `timeout` of `None` disables the timer
    /// entirely.
    pub async fn wps_connect_full(
        &self,
        params: &WpsParams,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        if !self.valid() {
            return Err(Error::NotValid);
        }
        let run = run_wps(self, params, cancel);
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, run).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("WPS connect timed out");
                    Err(Error::Timeout)
                }
            },
            None => run.await,
        }
    }
}

async fn run_wps(
    iface: &Interface,
    params: &WpsParams,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let path = iface.path().to_string();

    // Cancel an ongoing WPS operation, if any. Either way the session
    // starts from a clean credentials slate.
    debug!("[{path}] cancelling ongoing WPS operation");
    let cancelled_prior = iface.call(cancel, Request::WpsCancel).await;
    iface.clear_wps_credentials();
    iface.flush();
    cancelled_prior?;

    // Register for session events before starting
    let (tx, mut rx) = mpsc::unbounded_channel::<WpsOutcome>();
    let transport = Rc::clone(iface.supplicant().transport());
    let watch_id = transport.watch(
        &path,
        ObjectKind::Interface,
        Rc::new({
            let tx = tx.clone();
            move |event| {
                if let BusEvent::WpsEvent(name, _) = event {
                    let _ = tx.send(WpsOutcome::from_event(name));
                }
            }
        }),
    );
    let _watch = WatchGuard::new(Rc::clone(&transport), watch_id);

    debug!("[{path}] starting WPS configuration");
    let start = iface.call(cancel, Request::WpsStart(wps_start_args(params)));
    tokio::pin!(start);

    let mut started = false;
    let mut new_pin: Option<String> = None;
    let mut outcome: Option<WpsOutcome> = None;
    loop {
        // Done only when both the outcome and the Start reply are in
        if started && let Some(outcome) = outcome {
            return match outcome {
                WpsOutcome::Success => {
                    debug!("[{path}] WPS connect OK");
                    Ok(new_pin)
                }
                failed => Err(Error::WpsFailed(failed)),
            };
        }
        tokio::select! {
            biased;
            result = &mut start, if !started => {
                let reply = result?;
                started = true;
                new_pin = reply
                    .into_dict()
                    .and_then(|d| d.str_value("Pin").map(str::to_string));
                if outcome.is_none() {
                    debug!("[{path}] waiting for WPS event");
                }
            }
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            event = rx.recv() => {
                if let Some(event) = event {
                    debug!("[{path}] WPS event \"{event}\"");
                    outcome = Some(event);
                }
            }
        }
    }
}

/// Assembles the argument dictionary for the WPS Start call.
fn wps_start_args(params: &WpsParams) -> Dict {
    let mut args = Dict::new();
    let enrollee = params.role != WpsRole::Registrar;
    args.add_str("Role", if enrollee { "enrollee" } else { "registrar" });
    if enrollee {
        // PIN authentication needs an actual pin; fall back to push-button
        let kind = if params.auth == WpsAuth::Pin && params.pin.is_some() {
            "pin"
        } else {
            "pbc"
        };
        args.add_str("Type", kind);
    }
    args.add_str0("Pin", params.pin.as_deref());
    args.add_bytes0("Bssid", params.bssid.as_deref());
    args.add_bytes0("P2PDeviceAddress", params.p2p_address.as_deref());
    args
}

/// Parses a credentials signal payload.
pub(crate) fn parse_credentials(args: &Dict) -> WpsCredentials {
    let mut creds = WpsCredentials {
        bssid: args.bytes_value("BSSID").map(<[u8]>::to_vec),
        // The SSID may arrive as either a byte string or a plain string
        ssid: args
            .bytes_value("SSID")
            .map(<[u8]>::to_vec)
            .or_else(|| args.str_value("SSID").map(|s| s.as_bytes().to_vec())),
        key: args.bytes_value("Key").map(<[u8]>::to_vec),
        key_index: args.u32_value("KeyIndex").unwrap_or(0),
        ..Default::default()
    };
    if let Some(names) = args.str_list_value("AuthType") {
        creds.auth_types = bits_from_names("AuthType", names, AUTH_TYPE_NAMES);
    }
    if let Some(names) = args.str_list_value("EncrType") {
        creds.encr_types = bits_from_names("EncrType", names, WPS_ENCR_NAMES);
    }
    creds
}
