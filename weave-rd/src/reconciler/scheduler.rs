//! Reconciler scheduling
//!
//! Runs the reconciler as a cancellable fixed-interval task (default 10s in
//! the observed system). Out-of-band triggers ("new ranking computed", "new
//! roster fetched", manual refresh) arrive through the handle's trigger
//! channel rather than the EventBus, because the reconciler itself emits
//! ranking/roster events during a cycle and must not re-trigger on its own
//! output.
//!
//! On shutdown the token is cancelled and the in-flight cycle aborts before
//! any further write; the timer is dropped with the task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reconciler::Reconciler;

/// Default reconciliation period
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Cloneable sender for out-of-band reconcile requests
#[derive(Clone)]
pub struct ReconcileTrigger {
    tx: mpsc::Sender<&'static str>,
}

impl ReconcileTrigger {
    /// Request an out-of-band cycle; coalesced if one is already queued
    pub fn trigger(&self, reason: &'static str) {
        if self.tx.try_send(reason).is_err() {
            debug!(reason, "Reconcile trigger coalesced");
        }
    }
}

/// Handle to a running reconciler task
pub struct ReconcilerHandle {
    cancel: CancellationToken,
    trigger_tx: mpsc::Sender<&'static str>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Request an out-of-band cycle; coalesced if one is already queued
    pub fn trigger(&self, reason: &'static str) {
        if self.trigger_tx.try_send(reason).is_err() {
            debug!(reason, "Reconcile trigger coalesced");
        }
    }

    /// Cloneable trigger for handing to API handlers
    pub fn trigger_handle(&self) -> ReconcileTrigger {
        ReconcileTrigger {
            tx: self.trigger_tx.clone(),
        }
    }

    /// Cancel the task and wait for it to wind down
    ///
    /// After this returns, no further store write originates from the
    /// reconciler.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Reconciler task join error: {}", e);
        }
    }
}

/// Spawn the recurring reconciliation task
pub fn spawn_reconciler(reconciler: Arc<Reconciler>, interval: Duration) -> ReconcilerHandle {
    let cancel = CancellationToken::new();
    // Capacity 1: pending triggers coalesce into one extra cycle
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<&'static str>(1);

    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            subject_id = %reconciler.subject_id(),
            interval_ms = interval.as_millis() as u64,
            "Reconciler started"
        );

        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    info!("Reconciler cancelled; stopping");
                    break;
                }
                _ = ticker.tick() => {
                    run_once(&reconciler, &task_cancel, "interval").await;
                }
                Some(reason) = trigger_rx.recv() => {
                    run_once(&reconciler, &task_cancel, reason).await;
                }
            }
        }
    });

    ReconcilerHandle {
        cancel,
        trigger_tx,
        task,
    }
}

async fn run_once(reconciler: &Reconciler, cancel: &CancellationToken, reason: &str) {
    debug!(reason, "Reconciliation cycle starting");
    if let Err(e) = reconciler.run_cycle(cancel).await {
        // Cycle-local by design: log and let the schedule retry
        warn!(reason, error = %e, "Reconciliation cycle failed");
    }
}
