//! Periodic reconciliation with on-demand triggering.

use crate::engine::ReconciliationEngine;
use crate::error::{ReconcileError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, Duration, Instant};

/// Runs full syncs on an interval and whenever triggered.
pub struct ReconcileScheduler {
    engine: Arc<ReconciliationEngine>,
    period: Duration,
    run_on_startup: bool,
    trigger_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
}

impl ReconcileScheduler {
    /// Create a scheduler and the receiver its loop consumes.
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        period: Duration,
        run_on_startup: bool,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(4);
        let scheduler = Arc::new(Self {
            engine,
            period,
            run_on_startup,
            trigger_tx,
            running: Arc::new(RwLock::new(false)),
        });
        (scheduler, trigger_rx)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Request an immediate run. Requests made while one is queued coalesce.
    pub async fn trigger(&self) -> Result<()> {
        match self.trigger_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ReconcileError::NotRunning),
        }
    }

    /// Run the loop until [`stop`](Self::stop) is called.
    pub async fn start(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }
        tracing::info!(interval_secs = self.period.as_secs(), "Reconcile scheduler started");

        let first = if self.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + self.period
        };
        let mut ticker = interval_at(first, self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = self.engine.full_sync().await;
                    tracing::info!(summary = %result, "Scheduled reconciliation finished");
                }
                Some(_) = trigger_rx.recv() => {
                    let result = self.engine.full_sync().await;
                    tracing::info!(summary = %result, "Triggered reconciliation finished");
                }
                else => break,
            }

            if !*self.running.read().await {
                break;
            }
        }

        tracing::info!("Reconcile scheduler stopped");
    }

    /// Stop after the current iteration.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }
}

impl std::fmt::Debug for ReconcileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileScheduler")
            .field("period", &self.period)
            .field("run_on_startup", &self.run_on_startup)
            .finish_non_exhaustive()
    }
}
