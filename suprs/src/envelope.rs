//! The cancellable envelope around one outstanding call.
//!
//! Every RPC the crate issues goes through [`issue`], which races the
//! request against a cancellation token. Exactly one of the two outcomes
//! happens:
//!
//! - the request completes first: its result is returned as-is;
//! - the token is marked first: the caller gets [`Error::Cancelled`]
//!   immediately, while the in-flight request is handed to a detached task
//!   that keeps the issuing proxy alive until the transport reports the
//!   (now irrelevant) completion and then discards it.
//!
//! Cancelling the token from the caller after the call completed is a
//! no-op; the two paths are mutually exclusive.

use log::trace;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Issues one cancellable call on behalf of `proxy`.
///
/// The proxy handle is cloned for the duration of the call (including the
/// discard tail after a cancellation), which is what keeps the proxy's
/// remote connection alive across the asynchronous gap.
pub(crate) async fn issue<K, T, F>(proxy: &K, cancel: &CancellationToken, fut: F) -> Result<T>
where
    K: Clone + 'static,
    T: 'static,
    F: Future<Output = Result<T>> + 'static,
{
    let _keep = proxy.clone();
    let mut fut = Box::pin(fut);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let keep = proxy.clone();
            tokio::task::spawn_local(async move {
                // Hold the proxy until the transport is done with the call,
                // then drop the reply on the floor.
                let _keep = keep;
                match fut.await {
                    Ok(_) => trace!("discarded completion of a cancelled call"),
                    Err(e) => trace!("discarded failure of a cancelled call: {e}"),
                }
            });
            Err(Error::Cancelled)
        }
        res = &mut fut => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::sync::Notify;
    use tokio::task::LocalSet;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn completes_normally_without_cancellation() {
        LocalSet::new()
            .run_until(async {
                let cancel = CancellationToken::new();
                let proxy = Rc::new(());
                let res = issue(&proxy, &cancel, async { Ok(42) }).await;
                assert_eq!(res.unwrap(), 42);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancellation_wins_and_late_completion_is_discarded() {
        LocalSet::new()
            .run_until(async {
                let cancel = CancellationToken::new();
                let proxy = Rc::new(());
                let gate = Rc::new(Notify::new());
                let done = Rc::new(Cell::new(false));

                let fut = {
                    let gate = Rc::clone(&gate);
                    let done = Rc::clone(&done);
                    async move {
                        gate.notified().await;
                        done.set(true);
                        Ok(7)
                    }
                };

                let call = tokio::task::spawn_local({
                    let proxy = Rc::clone(&proxy);
                    let cancel = cancel.clone();
                    async move { issue(&proxy, &cancel, fut).await }
                });
                settle().await;

                cancel.cancel();
                let res = call.await.unwrap();
                assert!(matches!(res, Err(Error::Cancelled)));
                // The transport has not even answered yet
                assert!(!done.get());
                // The proxy is still referenced by the discard tail
                assert!(Rc::strong_count(&proxy) > 1);

                // Late completion arrives and is silently consumed
                gate.notify_one();
                settle().await;
                assert!(done.get());
                assert_eq!(Rc::strong_count(&proxy), 1);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelling_after_completion_is_a_no_op() {
        LocalSet::new()
            .run_until(async {
                let cancel = CancellationToken::new();
                let proxy = Rc::new(());
                let res = issue(&proxy, &cancel, async { Ok("done") }).await;
                assert_eq!(res.unwrap(), "done");
                // The caller reacting to the result by cancelling the same
                // token must be harmless.
                cancel.cancel();
                settle().await;
            })
            .await;
    }
}
