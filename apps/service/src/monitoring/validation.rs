//! Sanity checks for raw check records read from the record store.
//!
//! Records are written by the account-facing API, so anything may be on disk:
//! half-written documents, hand-edited files, or records the workers have
//! never seen. Every field is checked on its own. `state` and `lastChecked`
//! are defaulted rather than rejected since a record that was never probed
//! has neither.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{CheckRecord, CheckState, Method, Protocol};

pub const ID_LENGTH: usize = 20;
pub const PHONE_LENGTH: usize = 10;
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Check record is not a JSON object")]
    NotAnObject,

    #[error("Check id must be a 20 character string")]
    InvalidId,

    #[error("Owner phone must be a 10 character string")]
    InvalidPhone,

    #[error("Protocol must be one of http, https")]
    InvalidProtocol,

    #[error("URL must be a non-empty string")]
    InvalidUrl,

    #[error("Method must be one of get, post, put, delete")]
    InvalidMethod,

    #[error("Success codes must be a non-empty array of status codes")]
    InvalidSuccessCodes,

    #[error("Timeout must be a whole number of seconds between 1 and 5")]
    InvalidTimeout,
}

/// Turn a raw stored document into a usable [`CheckRecord`]
pub fn validate_check(raw: &Value) -> Result<CheckRecord, ValidationError> {
    let fields = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let id = trimmed_str(fields, "id")
        .filter(|id| id.chars().count() == ID_LENGTH)
        .ok_or(ValidationError::InvalidId)?;

    let user_phone = trimmed_str(fields, "userPhone")
        .filter(|phone| phone.chars().count() == PHONE_LENGTH)
        .ok_or(ValidationError::InvalidPhone)?;

    let protocol = fields
        .get("protocol")
        .and_then(Value::as_str)
        .and_then(Protocol::parse)
        .ok_or(ValidationError::InvalidProtocol)?;

    let url_tail = trimmed_str(fields, "url")
        .filter(|url| !url.is_empty())
        .ok_or(ValidationError::InvalidUrl)?;

    let method = fields
        .get("method")
        .and_then(Value::as_str)
        .and_then(Method::parse)
        .ok_or(ValidationError::InvalidMethod)?;

    let success_codes = fields
        .get("successCodes")
        .and_then(Value::as_array)
        .filter(|codes| !codes.is_empty())
        .and_then(|codes| codes.iter().map(status_code).collect::<Option<Vec<u16>>>())
        .ok_or(ValidationError::InvalidSuccessCodes)?;

    let timeout_seconds = fields
        .get("timeoutSeconds")
        .and_then(whole_number)
        .filter(|secs| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(secs))
        .ok_or(ValidationError::InvalidTimeout)?;

    let state = match fields.get("state").and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    };

    let last_checked = fields.get("lastChecked").and_then(last_checked);

    Ok(CheckRecord {
        id: id.to_string(),
        user_phone: user_phone.to_string(),
        protocol,
        url_tail: url_tail.to_string(),
        method,
        success_codes,
        timeout_seconds,
        state,
        last_checked,
    })
}

fn trimmed_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str).map(str::trim)
}

/// Accepts `3` as well as `3.0`, rejects `3.5`
fn whole_number(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let n = value.as_f64()?;
    (n.fract() == 0.0 && n >= 0.0 && n <= u64::MAX as f64).then_some(n as u64)
}

fn status_code(value: &Value) -> Option<u16> {
    whole_number(value)
        .filter(|code| (100..=999).contains(code))
        .map(|code| code as u16)
}

fn last_checked(value: &Value) -> Option<DateTime<Utc>> {
    let millis = value.as_i64().or_else(|| whole_number(value).map(|n| n as i64))?;
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}
