/// Worker module - runs checks and rotates their logs
///
/// The worker is the service object every background cycle goes through:
/// - Scans every stored check and runs its probe pipeline
/// - Folds outcomes into stored state and the check's history log
/// - Dispatches alerts on state transitions
/// - Rotates history logs into archives
///
/// ## Scheduling
/// The `scheduler` submodule drives the scan and rotation cycles.

pub mod scheduler;


pub use scheduler::Scheduler;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::alerts::{AlertDispatcher, alert_message};
use crate::logs::{LogRotator, LogStore, LogWriter, RotationSummary};
use crate::monitoring::{
    CheckOutcome, CheckRecord, CheckState, ProbeRequest, Prober, ValidationError, evaluate,
    validate_check,
};
use crate::store::{CHECKS, RecordStore, StoreError};

/// Why a check's pipeline stopped before probing
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Check {0} disappeared before it could be read")]
    NotFound(String),

    #[error("Failed to read check {id}: {source}")]
    Read { id: String, source: StoreError },

    #[error("Check {id} is malformed, skipping: {source}")]
    Invalid { id: String, source: ValidationError },
}

/// What one pipeline run did for one check
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub check_id: String,
    pub outcome: CheckOutcome,
    pub state: CheckState,
    pub alert_warranted: bool,
    pub alert_sent: bool,
    pub logged: bool,
    pub persisted: bool,
}

/// Per-cycle tally for a scan
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub probed: usize,
    pub up: usize,
    pub down: usize,
    pub alerts: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ScanSummary {
    fn record(&mut self, result: &Result<CheckReport, CheckError>) {
        match result {
            Ok(report) => {
                self.probed += 1;
                match report.state {
                    CheckState::Up => self.up += 1,
                    CheckState::Down => self.down += 1,
                }
                if report.alert_sent {
                    self.alerts += 1;
                }
            }
            Err(CheckError::NotFound(_) | CheckError::Invalid { .. }) => self.skipped += 1,
            Err(CheckError::Read { .. }) => self.failed += 1,
        }
    }
}

/// Background worker for checks and their logs
pub struct Worker {
    store: Arc<dyn RecordStore>,
    prober: Arc<dyn Prober>,
    dispatcher: Arc<dyn AlertDispatcher>,
    log_writer: LogWriter,
    rotator: LogRotator,
    probe_limit: Option<Arc<Semaphore>>,
}

impl Worker {
    /// Create a new worker around its collaborators
    pub fn new(
        store: Arc<dyn RecordStore>,
        log_store: Arc<dyn LogStore>,
        dispatcher: Arc<dyn AlertDispatcher>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        Self {
            store,
            prober,
            dispatcher,
            log_writer: LogWriter::new(Arc::clone(&log_store)),
            rotator: LogRotator::new(log_store),
            probe_limit: None,
        }
    }

    /// Cap the number of probes in flight during one scan
    pub fn with_max_concurrent_probes(mut self, limit: Option<usize>) -> Self {
        self.probe_limit = limit.filter(|n| *n > 0).map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Probe every stored check concurrently.
    ///
    /// Only a failure to list the checks is an error. Each check's own
    /// failures are logged and counted without touching the others.
    pub async fn scan_all(self: &Arc<Self>) -> Result<ScanSummary> {
        let ids = self.store.list(CHECKS).await?;
        if ids.is_empty() {
            debug!("Could not find any checks to process");
            return Ok(ScanSummary::default());
        }

        debug!(count = ids.len(), "Dispatching checks");

        let mut tasks = JoinSet::new();
        for id in ids {
            let worker = Arc::clone(self);
            let limit = self.probe_limit.clone();
            tasks.spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                worker.run_check(&id).await
            });
        }

        let mut summary = ScanSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => summary.record(&result),
                Err(e) => {
                    error!("Check task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            probed = summary.probed,
            up = summary.up,
            down = summary.down,
            alerts = summary.alerts,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scan finished"
        );
        Ok(summary)
    }

    /// `process_check` plus logging of whatever stopped it
    async fn run_check(&self, id: &str) -> Result<CheckReport, CheckError> {
        let result = self.process_check(id).await;
        match &result {
            Ok(_) => {}
            Err(e @ CheckError::NotFound(_)) => debug!(check_id = id, "{}", e),
            Err(e @ CheckError::Invalid { .. }) => warn!(check_id = id, "{}", e),
            Err(e @ CheckError::Read { .. }) => warn!(check_id = id, "{}", e),
        }
        result
    }

    /// Read, validate, probe, then record the outcome of one check
    pub async fn process_check(&self, id: &str) -> Result<CheckReport, CheckError> {
        let raw = self.store.read(CHECKS, id).await.map_err(|source| {
            if source.is_not_found() {
                CheckError::NotFound(id.to_string())
            } else {
                CheckError::Read { id: id.to_string(), source }
            }
        })?;

        let check = validate_check(&raw)
            .map_err(|source| CheckError::Invalid { id: id.to_string(), source })?;

        let outcome = self.prober.probe(&ProbeRequest::from(&check)).await;

        Ok(self.record_outcome(&check, outcome).await)
    }

    /// Log the outcome, persist the new state, alert on a transition.
    ///
    /// The log entry is written first and stays even if the update fails.
    pub async fn record_outcome(&self, check: &CheckRecord, outcome: CheckOutcome) -> CheckReport {
        let evaluation = evaluate(check, outcome, Utc::now());

        let logged = self.log_writer.write(&evaluation.entry).await.is_ok();

        let persisted = match serde_json::to_value(&evaluation.updated) {
            Ok(record) => match self.store.update(CHECKS, &check.id, &record).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(check_id = %check.id, error = %e, "Error trying to save updates to check");
                    false
                }
            },
            Err(e) => {
                warn!(check_id = %check.id, error = %e, "Failed to serialize updated check");
                false
            }
        };

        // An unsaved transition is detected again next cycle, alert then
        let alert_sent = if !persisted {
            false
        } else if evaluation.alert_warranted() {
            self.alert(&evaluation.updated).await
        } else {
            debug!(check_id = %check.id, "Check outcome has not changed, no alert needed");
            false
        };

        CheckReport {
            check_id: check.id.clone(),
            outcome: evaluation.entry.outcome,
            state: evaluation.entry.state,
            alert_warranted: evaluation.entry.alert,
            alert_sent,
            logged,
            persisted,
        }
    }

    async fn alert(&self, check: &CheckRecord) -> bool {
        let message = alert_message(check);
        match self.dispatcher.notify(&check.user_phone, &message).await {
            Ok(()) => {
                info!(
                    check_id = %check.id,
                    dispatcher = self.dispatcher.name(),
                    state = %check.state,
                    "User was alerted to a status change"
                );
                true
            }
            Err(e) => {
                warn!(
                    check_id = %check.id,
                    dispatcher = self.dispatcher.name(),
                    error = %e,
                    "Could not alert user to a status change"
                );
                false
            }
        }
    }

    /// Compress and truncate every live log
    pub async fn rotate_logs(&self) -> Result<RotationSummary> {
        self.rotator.rotate_all().await
    }
}
