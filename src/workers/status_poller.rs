use crate::database::store::CheckoutStore;
use crate::payments::provider::PixProvider;
use crate::payments::types::PixStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed cadence between status checks.
    pub interval: Duration,
    /// Hard ceiling on status checks; with the default cadence this is a
    /// ten-minute window.
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

impl PollerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: Duration::from_secs(
                std::env::var("POLL_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.interval.as_secs()),
            ),
            max_attempts: std::env::var("POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_attempts),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome and handle
// ---------------------------------------------------------------------------

/// Terminal result reported back to the checkout service. A poller that
/// hits the attempt cap reports nothing; the session stays awaiting
/// payment until the user cancels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Paid,
    Failed(PixStatus),
}

/// Handle to a running poll loop. Cancellation is cooperative (the loop
/// observes the watch channel at its next suspension point) and idempotent:
/// cancelling twice, or after the loop already finished, is a no-op.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(&self) {
        // Send fails only when the loop is already gone, which is fine.
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct StatusPoller;

impl StatusPoller {
    /// Spawn the bounded polling loop for one billing. Per tick: count the
    /// attempt, stop silently past the cap, otherwise check status. A
    /// terminal status persists the update exactly once, reports the
    /// outcome, and ends the loop; anything else (including the degraded
    /// PENDING a transport failure produces) keeps polling. Ticks never
    /// overlap: each awaits its status call before the next sleep.
    pub fn spawn(
        config: PollerConfig,
        provider: Arc<dyn PixProvider>,
        store: Arc<dyn CheckoutStore>,
        api_key: String,
        billing_id: String,
        outcome_tx: mpsc::Sender<PollOutcome>,
    ) -> PollHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                billing_id = %billing_id,
                interval_secs = config.interval.as_secs(),
                max_attempts = config.max_attempts,
                "status poller started"
            );

            let mut attempts: u32 = 0;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!(billing_id = %billing_id, "status poller cancelled");
                            break;
                        }
                    }
                    _ = tokio::time::sleep(config.interval) => {
                        attempts += 1;
                        if attempts > config.max_attempts {
                            warn!(
                                billing_id = %billing_id,
                                attempts = attempts,
                                "attempt cap reached without a terminal status, stopping"
                            );
                            break;
                        }

                        let status = provider.check_status(&api_key, &billing_id).await;

                        // A cancel may have landed while the check was in
                        // flight; its result must not touch the store or
                        // reach a session that already moved on.
                        if *shutdown_rx.borrow() {
                            info!(
                                billing_id = %billing_id,
                                "cancelled during status check, discarding result"
                            );
                            break;
                        }

                        match status {
                            PixStatus::Paid => {
                                store
                                    .update_transaction_status(&billing_id, status.as_str())
                                    .await;
                                info!(
                                    billing_id = %billing_id,
                                    attempts = attempts,
                                    "payment confirmed"
                                );
                                let _ = outcome_tx.send(PollOutcome::Paid).await;
                                break;
                            }
                            PixStatus::Cancelled | PixStatus::Failed => {
                                store
                                    .update_transaction_status(&billing_id, status.as_str())
                                    .await;
                                warn!(
                                    billing_id = %billing_id,
                                    status = %status,
                                    "billing reached a failed terminal status"
                                );
                                let _ = outcome_tx.send(PollOutcome::Failed(status)).await;
                                break;
                            }
                            // PENDING, EXPIRED, UNKNOWN: not terminal, keep polling.
                            _ => {}
                        }
                    }
                }
            }

            info!(billing_id = %billing_id, "status poller stopped");
        });

        PollHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
