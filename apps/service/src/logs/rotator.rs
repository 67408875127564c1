//! Log rotation.
//!
//! Each live log is compressed into a fresh archive named
//! `<logId>-<epochMillis>` and only then truncated. Truncation drops just
//! the archived prefix, so records written mid-rotation wait for the next
//! pass. A failed compression leaves the live log untouched, so the next
//! rotation picks it up again under a new name.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{LogStore, LogStoreError};

/// Per-cycle tally, mostly for logging and tests
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RotationSummary {
    pub rotated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// What happened to a single log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRotation {
    Rotated { archive_id: String },
    Empty,
    Failed,
}

pub struct LogRotator {
    store: Arc<dyn LogStore>,
}

pub fn archive_id(log_id: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", log_id, at.timestamp_millis())
}

impl LogRotator {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Rotate every live log. Errors only if the logs cannot be listed.
    pub async fn rotate_all(&self) -> Result<RotationSummary> {
        let logs = self.store.list(false).await?;
        if logs.is_empty() {
            debug!("No logs to rotate");
            return Ok(RotationSummary::default());
        }

        let results = join_all(logs.iter().map(|log_id| self.rotate(log_id))).await;

        let mut summary = RotationSummary::default();
        for result in results {
            match result {
                LogRotation::Rotated { .. } => summary.rotated += 1,
                LogRotation::Empty => summary.skipped += 1,
                LogRotation::Failed => summary.failed += 1,
            }
        }

        info!(
            rotated = summary.rotated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Log rotation finished"
        );
        Ok(summary)
    }

    /// Compress one log into a new archive, then truncate it
    pub async fn rotate(&self, log_id: &str) -> LogRotation {
        self.rotate_at(log_id, Utc::now()).await
    }

    pub async fn rotate_at(&self, log_id: &str, at: DateTime<Utc>) -> LogRotation {
        let archive_id = archive_id(log_id, at);

        match self.store.compress_exclusive(log_id, &archive_id).await {
            Ok(()) => {}
            Err(LogStoreError::EmptyLog(_)) => {
                debug!(log_id, "Log is empty, nothing to rotate");
                return LogRotation::Empty;
            }
            Err(e) => {
                warn!(log_id, archive_id = %archive_id, error = %e, "Failed to compress log");
                return LogRotation::Failed;
            }
        }

        if let Err(e) = self.store.truncate(log_id).await {
            warn!(log_id, archive_id = %archive_id, error = %e, "Log archived but not truncated");
            return LogRotation::Failed;
        }

        debug!(log_id, archive_id = %archive_id, "Log rotated");
        LogRotation::Rotated { archive_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::FileLogStore;
    use tempfile::tempdir;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_archive_id_embeds_timestamp() {
        assert_eq!(archive_id("abc123", at(1_700_000_000_123)), "abc123-1700000000123");
    }

    #[tokio::test]
    async fn test_rotate_archives_then_truncates() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileLogStore::new(dir.path()));
        std::fs::write(dir.path().join("abc123.log"), "line1\nline2\n").unwrap();

        let rotator = LogRotator::new(store.clone());
        let LogRotation::Rotated { archive_id } = rotator.rotate("abc123").await else {
            panic!("expected the log to rotate");
        };

        assert!(archive_id.starts_with("abc123-"));
        assert_eq!(store.decompress(&archive_id).await.unwrap(), "line1\nline2\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("abc123.log")).unwrap(), "");
    }

    #[tokio::test]
    async fn test_name_collision_leaves_everything_intact() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileLogStore::new(dir.path()));
        let rotator = LogRotator::new(store.clone());
        let when = at(1_700_000_000_000);

        std::fs::write(dir.path().join("abc.log"), "first\n").unwrap();
        assert!(matches!(rotator.rotate_at("abc", when).await, LogRotation::Rotated { .. }));

        std::fs::write(dir.path().join("abc.log"), "second\n").unwrap();
        assert_eq!(rotator.rotate_at("abc", when).await, LogRotation::Failed);

        assert_eq!(std::fs::read_to_string(dir.path().join("abc.log")).unwrap(), "second\n");
        assert_eq!(store.decompress("abc-1700000000000").await.unwrap(), "first\n");

        // A later cycle gets a new name and succeeds
        let later = at(1_700_000_060_000);
        assert!(matches!(rotator.rotate_at("abc", later).await, LogRotation::Rotated { .. }));
        assert_eq!(store.decompress("abc-1700000060000").await.unwrap(), "second\n");
    }

    #[tokio::test]
    async fn test_rotate_all_skips_archives_and_empty_logs() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileLogStore::new(dir.path()));
        std::fs::write(dir.path().join("a.log"), "a\n").unwrap();
        std::fs::write(dir.path().join("b.log"), "b\n").unwrap();
        std::fs::write(dir.path().join("idle.log"), "").unwrap();

        let rotator = LogRotator::new(store.clone());
        let summary = rotator.rotate_all().await.unwrap();
        assert_eq!(summary, RotationSummary { rotated: 2, skipped: 1, failed: 0 });

        // Archives from the first pass are not re-archived
        let summary = rotator.rotate_all().await.unwrap();
        assert_eq!(summary, RotationSummary { rotated: 0, skipped: 3, failed: 0 });
        assert_eq!(store.list(true).await.unwrap().len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_records_appended_during_rotation_survive() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileLogStore::new(dir.path()));
        let rotator = LogRotator::new(store.clone());
        store.append("abc", "line-0").await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for n in 1..=2000 {
                    store.append("abc", &format!("line-{n}")).await.unwrap();
                    if n % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let mut millis = 1_700_000_000_000;
        while !writer.is_finished() {
            rotator.rotate_at("abc", at(millis)).await;
            millis += 1;
        }
        writer.await.unwrap();

        let mut recovered: Vec<String> = std::fs::read_to_string(dir.path().join("abc.log"))
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect();
        for id in store.list(true).await.unwrap() {
            if id.starts_with("abc-") {
                let archived = store.decompress(&id).await.unwrap();
                recovered.extend(archived.lines().map(str::to_owned));
            }
        }

        let mut expected: Vec<String> = (0..=2000).map(|n| format!("line-{n}")).collect();
        recovered.sort();
        expected.sort();
        assert_eq!(recovered, expected);
    }

    #[tokio::test]
    async fn test_rotate_all_without_logs() {
        let dir = tempdir().unwrap();
        let rotator = LogRotator::new(Arc::new(FileLogStore::new(dir.path().join("absent"))));

        assert_eq!(rotator.rotate_all().await.unwrap(), RotationSummary::default());
    }
}
