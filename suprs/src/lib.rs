//! A Rust client library for wpa_supplicant over D-Bus.
//!
//! This crate mirrors the supplicant's remote object tree as cached local
//! proxies: the root [`Supplicant`], per-radio [`Interface`]s, discovered
//! [`Bss`] access points and configured [`Network`]s. Proxies are interned
//! by object path (one live proxy per path), track server-side property
//! changes, and expose the asynchronous operations of the service,
//! including the two multi-step protocols: network provisioning
//! ([`Interface::add_network`]) and WPS pairing
//! ([`Interface::wps_connect`]).
//!
//! # Example
//!
//! ```no_run
//! use suprs::{Supplicant, WpsAuth, WpsParams, WpsRole};
//!
//! # async fn example() -> suprs::Result<()> {
//! let supplicant = Supplicant::system().await?;
//! let path = supplicant.get_interface("wlan0").await?;
//! let iface = supplicant.interface(&path);
//!
//! // Push-button WPS pairing with the default 30 second timeout
//! let pin = iface
//!     .wps_connect(&WpsParams {
//!         role: WpsRole::Enrollee,
//!         auth: WpsAuth::PushButton,
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("paired{}", pin.map(|p| format!(", pin {p}")).unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! # Validity and presence
//!
//! A proxy starts out invalid and becomes valid once its remote state has
//! been mirrored locally and every ancestor is itself valid; invalidity
//! cascades top-down when the service drops off the bus. Presence tracks
//! whether the object's path is still listed in its parent's collection.
//! Property-change subscriptions ([`Interface::add_property_handler`] and
//! friends) observe both, with a fixed notification order: when an object
//! becomes valid, the `Valid` notification always comes last, so handlers
//! see a fully populated object; when it becomes invalid, `Valid` comes
//! first.
//!
//! # Concurrency
//!
//! The client is single-threaded and lock-free. Run it on a current-thread
//! Tokio runtime inside a `LocalSet`; background resolution and signal
//! forwarding are spawned as local tasks. Long operations take an optional
//! [`CancellationToken`] (the `*_full` variants); a cancelled operation
//! resolves to [`Error::Cancelled`] and guarantees that nothing
//! user-visible happens on its behalf afterwards.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade. To see log
//! output, add a logging implementation like `env_logger`.

// Internal implementation modules
mod add_network;
mod dbus;
mod dict;
mod envelope;
mod notify;
mod proxies;
mod registry;
mod transport;
mod wait;
mod wps;

#[cfg(test)]
mod testutil;

// Public API modules
pub mod bss;
pub mod interface;
pub mod models;
pub mod network;
pub mod supplicant;

// Re-exported public API
pub use bss::{Bss, BssProperty, BssRsn, BssWpa};
pub use dbus::{DbusTransport, SERVICE};
pub use dict::{Dict, Value};
pub use interface::{Interface, InterfaceProperty};
pub use models::{
    AddNetworkFlags, AuthAlgs, AuthFlags, AuthTypes, BlobSet, BssConnectParams, BssMode, Caps,
    Ciphers, CreateInterfaceParams, EapMethod, EapMethods, Error, InterfaceCaps, InterfaceState,
    KeyMgmts, ModeCaps, NetworkParams, OpMode, Protocols, RemoteError, ScanCaps, ScanParams,
    ScanType, Security, SignalPoll, WpsAuth, WpsCaps, WpsCredentials, WpsEncrTypes, WpsOutcome,
    WpsParams, WpsRole,
};
pub use network::{Network, NetworkProperty};
pub use notify::HandlerId;
pub use supplicant::{SUPPLICANT_PATH, Supplicant, SupplicantProperty};
pub use transport::{BusEvent, ObjectKind, Observer, Reply, Request, Transport, WatchId};
pub use wps::WPS_DEFAULT_CONNECT_TIMEOUT;

// The cancellation token type used by the `*_full` operation variants.
pub use tokio_util::sync::CancellationToken;

/// A specialized `Result` type for supplicant operations.
pub type Result<T> = std::result::Result<T, Error>;
