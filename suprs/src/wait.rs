//! Suspension on property changes.
//!
//! The orchestrators sometimes have nothing to call and must simply wait
//! for an object to change underneath them (a freshly added network
//! becoming valid, an enable request taking effect). Waits are
//! signal-driven, never polled: a subscription forwards matching change
//! notifications into a channel, and the waiter re-checks its condition on
//! every wake-up. Cancellation tears a wait down immediately.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::models::Error;
use crate::network::{Network, NetworkProperty};
use crate::notify::HandlerGuard;

/// Forwards change notifications for a set of network properties into a
/// channel. Handlers are removed when the subscription is dropped.
pub(crate) struct NetworkSubscription {
    _guards: Vec<HandlerGuard>,
    rx: mpsc::UnboundedReceiver<()>,
}

impl NetworkSubscription {
    pub(crate) fn new(network: &Network, props: &[NetworkProperty]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let guards = props
            .iter()
            .map(|&prop| {
                let tx = tx.clone();
                let id = network.add_property_handler(Some(prop), move |_, _| {
                    let _ = tx.send(());
                });
                let network = network.clone();
                HandlerGuard::new(move || network.remove_handler(id))
            })
            .collect();
        Self { _guards: guards, rx }
    }

    /// Suspends until any subscribed property changes.
    pub(crate) async fn changed(&mut self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = self.rx.recv() => Ok(()),
        }
    }
}
