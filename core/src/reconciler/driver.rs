// Attendance tracker: the single consumer loop behind the reconciler
//
// Radio scan results arrive on a bounded mpsc channel; a sweep ticker fires
// on the same task. Every transition therefore runs on one logical loop, in
// arrival order, and no two transitions for a course ever overlap.

use super::BeaconReconciler;
use crate::beacon::{BeaconObservation, RadioAdapter, RadioError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),
    #[error("Tracker loop terminated abnormally: {0}")]
    Join(String),
}

/// Owns the scan lifecycle for one attendance-tracking period.
///
/// Created when tracking starts and consumed by [`AttendanceTracker::stop`];
/// the reconciler it drives is handed back out through [`reconciler`](Self::reconciler)
/// for UI queries.
pub struct AttendanceTracker {
    reconciler: BeaconReconciler,
    radio: Arc<dyn RadioAdapter>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AttendanceTracker {
    /// Start scanning and spawn the reconcile loop.
    pub async fn start(
        reconciler: BeaconReconciler,
        radio: Arc<dyn RadioAdapter>,
    ) -> Result<Self, TrackerError> {
        let (tx, rx) = mpsc::channel(reconciler.config().channel_capacity);
        radio.start_scanning(tx).await?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(reconciler.clone(), rx, shutdown_rx));
        info!("Attendance tracking started");

        Ok(Self {
            reconciler,
            radio,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    pub fn reconciler(&self) -> &BeaconReconciler {
        &self.reconciler
    }

    /// Stop scanning and wait for the loop to drain.
    pub async fn stop(mut self) -> Result<(), TrackerError> {
        let radio_result = self.radio.stop_scanning().await;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| TrackerError::Join(e.to_string()))?;
        info!("Attendance tracking stopped");
        radio_result.map_err(TrackerError::from)
    }
}

impl Drop for AttendanceTracker {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

/// The reconcile loop. Returns when shut down or when every sender is gone.
pub async fn run(
    reconciler: BeaconReconciler,
    mut observations: mpsc::Receiver<BeaconObservation>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = interval(reconciler.config().sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                debug!("Reconcile loop shutting down");
                break;
            }
            maybe = observations.recv() => match maybe {
                Some(observation) => {
                    let outcome = reconciler.handle_observation(&observation, Instant::now()).await;
                    debug!("Observation outcome: {:?}", outcome);
                }
                None => {
                    warn!("Observation channel closed");
                    break;
                }
            },
            _ = ticker.tick() => {
                reconciler.sweep(Instant::now());
            }
        }
    }
}
