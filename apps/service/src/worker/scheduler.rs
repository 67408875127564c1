use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use super::Worker;

/// Drives the two background cycles of a [`Worker`]
///
/// Both loops fire once immediately and then on their own interval. A tick's
/// work runs on its own task, so a slow cycle never delays the next tick and
/// two ticks of the same loop may overlap.
pub struct Scheduler {
    worker: Arc<Worker>,
    scan_interval: Duration,
    rotation_interval: Duration,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(worker: Arc<Worker>, scan_interval: Duration, rotation_interval: Duration) -> Self {
        Self { worker, scan_interval, rotation_interval }
    }

    /// Start both loops. They run until the process exits.
    pub fn start(&self) -> Vec<tokio::task::JoinHandle<()>> {
        info!(
            scan_every = ?self.scan_interval,
            rotate_every = ?self.rotation_interval,
            "Background workers are running"
        );
        vec![self.start_scan_loop(), self.start_rotation_loop()]
    }

    /// Probe every check once per scan interval
    pub fn start_scan_loop(&self) -> tokio::task::JoinHandle<()> {
        let worker = Arc::clone(&self.worker);
        let period = self.scan_interval;

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;

                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    match worker.scan_all().await {
                        Ok(summary) => debug!(?summary, "Scan cycle completed"),
                        Err(e) => error!("Scan cycle failed, waiting for next tick: {:#}", e),
                    }
                });
            }
        })
    }

    /// Rotate every log once per rotation interval
    pub fn start_rotation_loop(&self) -> tokio::task::JoinHandle<()> {
        let worker = Arc::clone(&self.worker);
        let period = self.rotation_interval;

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;

                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    match worker.rotate_logs().await {
                        Ok(summary) => debug!(?summary, "Rotation cycle completed"),
                        Err(e) => error!("Rotation cycle failed, waiting for next tick: {:#}", e),
                    }
                });
            }
        })
    }
}
