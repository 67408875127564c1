use std::sync::Arc;

use tracing::{debug, warn};

use super::{LogStore, LogStoreError};
use crate::monitoring::LogEntry;

/// Appends one JSON line per probe cycle to the check's own log
#[derive(Clone)]
pub struct LogWriter {
    store: Arc<dyn LogStore>,
}

impl LogWriter {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Write `entry` to the log named after its check id.
    ///
    /// Failures are logged and returned, never retried.
    pub async fn write(&self, entry: &LogEntry) -> Result<(), LogStoreError> {
        let log_id = entry.check.id.as_str();

        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(check_id = log_id, error = %e, "Failed to serialize log entry");
                return Err(LogStoreError::Io(std::io::Error::other(e)));
            }
        };

        match self.store.append(log_id, &line).await {
            Ok(()) => {
                debug!(check_id = log_id, "Log entry written");
                Ok(())
            }
            Err(e) => {
                warn!(check_id = log_id, error = %e, "Failed to append log entry");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::FileLogStore;
    use crate::monitoring::{CheckOutcome, CheckRecord, CheckState, Method, Protocol};
    use chrono::{DateTime, Utc};
    use tempfile::tempdir;

    fn entry(outcome: CheckOutcome, state: CheckState, alert: bool) -> LogEntry {
        LogEntry {
            check: CheckRecord {
                id: "abcdefghij0123456789".to_string(),
                user_phone: "5551234567".to_string(),
                protocol: Protocol::Http,
                url_tail: "example.com".to_string(),
                method: Method::Get,
                success_codes: vec![200],
                timeout_seconds: 2,
                state: CheckState::Down,
                last_checked: None,
            },
            outcome,
            state,
            alert,
            time: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_entries_are_json_lines() {
        let dir = tempdir().unwrap();
        let writer = LogWriter::new(Arc::new(FileLogStore::new(dir.path())));

        writer.write(&entry(CheckOutcome::ResponseCode(200), CheckState::Up, false)).await.unwrap();
        writer.write(&entry(CheckOutcome::timeout(), CheckState::Down, true)).await.unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("abcdefghij0123456789.log")).unwrap();
        let lines: Vec<serde_json::Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"]["responseCode"], 200);
        assert_eq!(lines[0]["state"], "up");
        assert_eq!(lines[0]["alert"], false);
        assert_eq!(lines[0]["time"], 1_700_000_000_000i64);
        assert_eq!(lines[0]["check"]["id"], "abcdefghij0123456789");
        assert_eq!(lines[1]["outcome"]["error"], "timeout");
        assert_eq!(lines[1]["alert"], true);
    }
}
