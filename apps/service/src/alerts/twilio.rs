use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AlertDispatcher, AlertError};

const RECIPIENT_LENGTH: usize = 10;
const MAX_MESSAGE_LENGTH: usize = 1600;

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164 form
    pub from_phone: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// SMS alerts through the Twilio Messages API
pub struct TwilioDispatcher {
    config: TwilioConfig,
    client: Client,
}

impl TwilioDispatcher {
    pub fn new(config: TwilioConfig) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

/// Checks a recipient and message, returning both trimmed
fn prepare<'a>(recipient: &'a str, message: &'a str) -> Result<(&'a str, &'a str), AlertError> {
    let recipient = recipient.trim();
    if recipient.chars().count() != RECIPIENT_LENGTH {
        return Err(AlertError::InvalidRecipient(recipient.to_string()));
    }

    let message = message.trim();
    let length = message.chars().count();
    if length == 0 || length > MAX_MESSAGE_LENGTH {
        return Err(AlertError::InvalidMessage);
    }

    Ok((recipient, message))
}

#[async_trait]
impl AlertDispatcher for TwilioDispatcher {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), AlertError> {
        let (recipient, message) = prepare(recipient, message)?;
        let to = format!("+1{recipient}");

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("From", self.config.from_phone.as_str()), ("To", to.as_str()), ("Body", message)])
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 200 || status == 201 {
            debug!(to = %to, "SMS alert accepted");
            Ok(())
        } else {
            Err(AlertError::Rejected(status))
        }
    }

    fn name(&self) -> &str {
        "twilio"
    }
}
