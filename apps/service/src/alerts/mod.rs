/// Alert delivery for check state changes
///
/// Delivery is best effort: one attempt per transition, failures are logged.
pub mod twilio;

pub use twilio::{TwilioConfig, TwilioDispatcher};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::monitoring::CheckRecord;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Recipient {0:?} is not a valid phone number")]
    InvalidRecipient(String),

    #[error("Alert message must be between 1 and 1600 characters")]
    InvalidMessage,

    #[error("Notification provider rejected the message with status {0}")]
    Rejected(u16),

    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// External notification collaborator
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), AlertError>;

    fn name(&self) -> &str;
}

/// Human readable message for a check that just changed state
pub fn alert_message(check: &CheckRecord) -> String {
    format!(
        "Alert: Your check for {} {} is currently {}",
        check.method.as_upper(),
        check.target(),
        check.state
    )
}

/// Writes alerts to the log instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), AlertError> {
        info!(recipient, message, "Alert (not sent, no provider configured)");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
