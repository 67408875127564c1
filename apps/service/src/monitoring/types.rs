use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Up/down state of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// Scheme used to reach a check's endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method a check issues, stored lowercase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "get" => Some(Method::Get),
            "post" => Some(Method::Post),
            "put" => Some(Method::Put),
            "delete" => Some(Method::Delete),
            _ => None,
        }
    }

    /// Uppercased wire form, e.g. `GET`
    pub fn as_upper(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A validated check record as persisted in the `checks` namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRecord {
    /// 20 character token assigned at creation
    pub id: String,

    /// Phone number of the owning account
    pub user_phone: String,

    pub protocol: Protocol,

    /// Host plus path and query, without the scheme
    #[serde(rename = "url")]
    pub url_tail: String,

    pub method: Method,

    /// Status codes that count as "up"
    pub success_codes: Vec<u16>,

    pub timeout_seconds: u64,

    #[serde(default)]
    pub state: CheckState,

    /// When the check was last probed. `None` means it never was.
    #[serde(
        rename = "lastChecked",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked: Option<DateTime<Utc>>,
}

impl CheckRecord {
    /// Full probe target, `protocol://urlTail`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url_tail)
    }

    /// Whether this record has never been probed
    pub fn is_first_sight(&self) -> bool {
        self.last_checked.is_none()
    }
}

/// What a single probe produced. Either a status code or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckOutcome {
    ResponseCode(u16),
    Error(String),
}

impl CheckOutcome {
    pub fn timeout() -> Self {
        CheckOutcome::Error("timeout".to_string())
    }

    pub fn response_code(&self) -> Option<u16> {
        match self {
            CheckOutcome::ResponseCode(code) => Some(*code),
            CheckOutcome::Error(_) => None,
        }
    }

    pub fn error_description(&self) -> Option<&str> {
        match self {
            CheckOutcome::ResponseCode(_) => None,
            CheckOutcome::Error(description) => Some(description),
        }
    }
}

/// One line of a check's history log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Record as it was before this probe
    pub check: CheckRecord,
    pub outcome: CheckOutcome,
    pub state: CheckState,
    pub alert: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}
