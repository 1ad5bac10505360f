//! Background cluster-context refresher.
//!
//! A spawned task re-reads the active context on a fixed interval and
//! publishes it into a single-slot `watch` channel. The session polls the
//! slot without blocking once per iteration through `ContextHandle`.
//!
//! - Failed fetches are silent (debug-logged); the last snapshot stays.
//! - A newer snapshot overwrites an unconsumed one, so the refresher never
//!   waits on the session.
//! - The task exits when its `CancellationToken` fires or the handle is dropped.
//! - A zero interval disables refreshing; the task only waits for cancellation.

use std::sync::Arc;
use std::time::Duration;

use oa_kube_tools::ContextProvider;
use oa_protocol::ContextSnapshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default refresh interval.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub struct ContextRefresher;

impl ContextRefresher {
    /// Start the refresh loop. The returned handle is the session's side of
    /// the slot; the join handle completes after `cancel` fires.
    pub fn spawn(
        provider: Arc<dyn ContextProvider>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (JoinHandle<()>, ContextHandle) {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(run(provider, interval, tx, cancel));
        (task, ContextHandle::new(rx))
    }
}

async fn run(
    provider: Arc<dyn ContextProvider>,
    interval: Duration,
    tx: watch::Sender<Option<ContextSnapshot>>,
    cancel: CancellationToken,
) {
    if interval.is_zero() {
        tracing::warn!("zero context refresh interval, background refresh disabled");
        cancel.cancelled().await;
        return;
    }

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first tick (fires immediately); the session bootstraps itself.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            () = cancel.cancelled() => break,
            fetched = provider.fetch() => fetched,
        };

        match fetched {
            Ok(snapshot) => {
                tracing::debug!(
                    cluster = %snapshot.cluster,
                    namespace = %snapshot.namespace,
                    "context refreshed"
                );
                if tx.send(Some(snapshot)).is_err() {
                    // Session side is gone.
                    break;
                }
            }
            Err(e) => tracing::debug!(error = %e, "context refresh failed, keeping last snapshot"),
        }
    }

    tracing::debug!("context refresher stopped");
}

/// Session-side view of the refresher's slot.
pub struct ContextHandle {
    rx: watch::Receiver<Option<ContextSnapshot>>,
    current: Option<ContextSnapshot>,
}

impl ContextHandle {
    fn new(rx: watch::Receiver<Option<ContextSnapshot>>) -> Self {
        Self { rx, current: None }
    }

    /// The snapshot to use for this iteration.
    ///
    /// Adopts a freshly published snapshot if one is waiting. If none has
    /// ever been obtained, fetches once from `provider` directly; a failed
    /// bootstrap yields an empty snapshot rather than an error.
    pub async fn current(&mut self, provider: &dyn ContextProvider) -> ContextSnapshot {
        if self.rx.has_changed().unwrap_or(false) {
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                self.current = Some(snapshot);
            }
        }

        if let Some(snapshot) = &self.current {
            return snapshot.clone();
        }

        let snapshot = match provider.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "could not read cluster context");
                ContextSnapshot::default()
            }
        };
        self.current = Some(snapshot.clone());
        snapshot
    }

    /// Last adopted snapshot, without polling or fetching.
    pub fn last(&self) -> Option<&ContextSnapshot> {
        self.current.as_ref()
    }
}
