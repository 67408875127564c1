use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::types::{CheckOutcome, CheckRecord, Method, Protocol};

/// Everything needed to issue one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub protocol: Protocol,
    pub url_tail: String,
    pub method: Method,
    pub timeout: Duration,
}

impl ProbeRequest {
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url_tail)
    }
}

impl From<&CheckRecord> for ProbeRequest {
    fn from(check: &CheckRecord) -> Self {
        Self {
            protocol: check.protocol,
            url_tail: check.url_tail.clone(),
            method: check.method,
            timeout: Duration::from_secs(check.timeout_seconds),
        }
    }
}

/// Issues exactly one outbound request and reports exactly one outcome
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, request: &ProbeRequest) -> CheckOutcome;
}

/// Single-resolution result cell shared by the events racing to finish a probe.
///
/// The sender can be taken out once, so only the first `deliver` reaches the
/// receiver. Every later call gets `false` back and its outcome is dropped.
pub struct OutcomeSlot {
    sender: Mutex<Option<oneshot::Sender<CheckOutcome>>>,
}

impl OutcomeSlot {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<CheckOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Arc::new(Self { sender: Mutex::new(Some(tx)) }), rx)
    }

    /// Deliver `outcome` if nothing was delivered before
    pub fn deliver(&self, outcome: CheckOutcome) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                trace!(?outcome, "Outcome already delivered, discarding");
                false
            }
        }
    }
}

/// HTTP/HTTPS prober backed by reqwest
pub struct HttpProber {
    http_client: reqwest::Client,
    https_client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let https_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .https_only(true)
            .build()?;

        Ok(Self { http_client, https_client })
    }

    fn client_for(&self, protocol: Protocol) -> &reqwest::Client {
        match protocol {
            Protocol::Http => &self.http_client,
            Protocol::Https => &self.https_client,
        }
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, request: &ProbeRequest) -> CheckOutcome {
        let target = request.target();
        let url = match url::Url::parse(&target) {
            Ok(url) => url,
            Err(e) => return CheckOutcome::Error(format!("Invalid URL {target}: {e}")),
        };

        let pending = self
            .client_for(request.protocol)
            .request(request.method.into(), url)
            .timeout(request.timeout)
            .send();

        let (slot, outcome_rx) = OutcomeSlot::new();

        // Response or transport error
        let response_slot = Arc::clone(&slot);
        let request_task = tokio::spawn(async move {
            let outcome = match pending.await {
                Ok(response) => CheckOutcome::ResponseCode(response.status().as_u16()),
                Err(e) if e.is_timeout() => CheckOutcome::timeout(),
                Err(e) => CheckOutcome::Error(describe_error(&e)),
            };
            response_slot.deliver(outcome);
        });

        // Deadline
        let deadline_slot = Arc::clone(&slot);
        let deadline = request.timeout;
        let deadline_task = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            deadline_slot.deliver(CheckOutcome::timeout());
        });

        let outcome = outcome_rx.await.unwrap_or_else(|_| CheckOutcome::timeout());

        // Whatever is still running lost the race
        request_task.abort();
        deadline_task.abort();

        debug!(url = %target, method = request.method.as_upper(), ?outcome, "Probe finished");
        outcome
    }
}

/// Flatten a reqwest error and its sources into one line
fn describe_error(error: &reqwest::Error) -> String {
    let mut description = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    description
}
