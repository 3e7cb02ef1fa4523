//! Change-only views of a ledger projection.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::watch;
use tracing::{debug, warn};

use nowaste_core::{LedgerScope, PickupRequest};

use crate::db::LedgerStore;

/// Longest wait between reads after repeated store failures.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// A live view of the requests in one [`LedgerScope`].
///
/// Wakes when this process writes to the ledger and every poll interval in
/// between, so writes from other processes sharing the store are seen too.
/// A projection is only yielded when it differs from the last one yielded.
/// Store errors are logged and retried with exponential backoff.
///
/// Dropping the subscription cancels it.
pub struct LedgerSubscription {
    store: Arc<dyn LedgerStore>,
    scope: LedgerScope,
    changes: watch::Receiver<u64>,
    poll_interval: Duration,
    delay: Duration,
    last: Option<Vec<PickupRequest>>,
    primed: bool,
}

impl LedgerSubscription {
    pub(super) fn new(
        store: Arc<dyn LedgerStore>,
        scope: LedgerScope,
        changes: watch::Receiver<u64>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            scope,
            changes,
            poll_interval,
            delay: poll_interval,
            last: None,
            primed: false,
        }
    }

    /// Wait for the next distinct projection.
    ///
    /// The first call reads immediately. Returns `None` once the ledger that
    /// created this subscription has been dropped.
    pub async fn next(&mut self) -> Option<Vec<PickupRequest>> {
        loop {
            if self.primed {
                tokio::select! {
                    changed = self.changes.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                    () = tokio::time::sleep(self.delay) => {}
                }
            }
            self.primed = true;

            match self.store.list_by(&self.scope).await {
                Ok(requests) => {
                    self.delay = self.poll_interval;
                    if self.last.as_ref() != Some(&requests) {
                        self.last = Some(requests.clone());
                        return Some(requests);
                    }
                }
                Err(e) => {
                    self.delay = (self.delay * 2).min(MAX_BACKOFF);
                    warn!(error = %e, retry_in = ?self.delay, "Ledger subscription read failed");
                }
            }
        }
    }

    /// Turn the subscription into a stream of projections.
    pub fn into_stream(mut self) -> impl Stream<Item = Vec<PickupRequest>> + Send {
        async_stream::stream! {
            while let Some(requests) = self.next().await {
                yield requests;
            }
            debug!("Ledger subscription ended");
        }
    }
}
