use crate::{
    error::ClaimError,
    tracker::TransactionTracker,
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

/// Observed indexer lag after a confirmation.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Refreshes read-side state once the index has had time to catch up with a
/// confirmed transaction.
///
/// A single fixed-delay refetch: if the index is still behind afterwards the
/// UI shows stale data until the next manual refresh.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReconciliationScheduler {
    settle_delay: Duration,
}

impl Default for ReconciliationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl ReconciliationScheduler {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Wait out the settle delay, run `refresh`, then return the tracker to
    /// idle whatever the refresh outcome.
    pub async fn reconcile<F>(
        &self,
        tracker: &TransactionTracker,
        refresh: F,
    ) -> Result<(), ClaimError>
    where
        F: Future<Output = Result<(), ClaimError>>,
    {
        tracker.begin_reconcile();
        let guard = tracker.settle_guard();
        debug!(
            class = %tracker.class(),
            delay_ms = self.settle_delay.as_millis() as u64,
            "waiting for index to settle"
        );
        time::sleep(self.settle_delay).await;
        let result = refresh.await;
        match &result {
            Ok(()) => info!(
                class = %tracker.class(),
                operation = %tracker.operation(),
                "reconciled after confirmation"
            ),
            Err(err) => warn!(
                class = %tracker.class(),
                operation = %tracker.operation(),
                error = %err,
                "refresh after confirmation failed; data may be stale until the next refresh"
            ),
        }
        tracker.finish();
        guard.disarm();
        result
    }
}

enum RefreshCommand {
    RefreshNow,
    Stop,
}

/// Background task re-running a refresh on a fixed interval.
///
/// Stops on [`PeriodicRefresh::stop`], or is aborted when the handle is
/// dropped.
pub struct PeriodicRefresh {
    commands: mpsc::UnboundedSender<RefreshCommand>,
    handle: JoinHandle<()>,
}

impl PeriodicRefresh {
    pub fn spawn<F, Fut>(interval: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ClaimError>> + Send + 'static,
    {
        let (commands, mut cmd_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = task().await {
                            warn!(error = %err, "periodic refresh failed");
                        }
                    }
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(RefreshCommand::RefreshNow) => {
                                if let Err(err) = task().await {
                                    warn!(error = %err, "refresh failed");
                                }
                            }
                            Some(RefreshCommand::Stop) | None => break,
                        }
                    }
                }
            }
            debug!("periodic refresh stopped");
        });
        Self { commands, handle }
    }

    /// Ask for an out-of-band refresh. Returns false once the task has ended.
    pub fn refresh_now(&self) -> bool {
        self.commands.send(RefreshCommand::RefreshNow).is_ok()
    }

    pub async fn stop(mut self) {
        let _ = self.commands.send(RefreshCommand::Stop);
        if let Err(err) = (&mut self.handle).await
            && !err.is_cancelled()
        {
            warn!(?err, "periodic refresh task ended abnormally");
        }
    }
}

impl Drop for PeriodicRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
