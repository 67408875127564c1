use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{LogStore, LogStoreError};

const LOG_SUFFIX: &str = ".log";
const ARCHIVE_SUFFIX: &str = ".gz.b64";

/// Separator written after every appended record
pub const RECORD_SEPARATOR: char = '\n';

/// Rotation bookkeeping for one live log
#[derive(Debug, Default)]
struct LogState {
    /// Bytes at the head of the log already copied into an archive
    archived_len: Option<u64>,
}

/// Live logs as `<id>.log`, archives as gzip-then-base64 `<id>.gz.b64`
///
/// Appends and rotation steps on the same log are serialized, and
/// `truncate` only drops the prefix the pending archive captured. Records
/// appended while a log is being rotated stay in the live log.
#[derive(Debug, Clone)]
pub struct FileLogStore {
    base_dir: PathBuf,
    logs: Arc<StdMutex<HashMap<String, Arc<Mutex<LogState>>>>>,
}

impl FileLogStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), logs: Arc::default() }
    }

    fn state(&self, log_id: &str) -> Arc<Mutex<LogState>> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(logs.entry(log_id.to_string()).or_default())
    }

    fn log_path(&self, log_id: &str) -> PathBuf {
        self.base_dir.join(format!("{log_id}{LOG_SUFFIX}"))
    }

    fn archive_path(&self, archive_id: &str) -> PathBuf {
        self.base_dir.join(format!("{archive_id}{ARCHIVE_SUFFIX}"))
    }
}

fn compress(content: &[u8]) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(STANDARD.encode(encoder.finish()?))
}

fn decompress(archive_id: &str, encoded: &str) -> Result<String, LogStoreError> {
    let decode_error =
        |reason: String| LogStoreError::Decode { id: archive_id.to_string(), reason };

    let compressed = STANDARD.decode(encoded.trim()).map_err(|e| decode_error(e.to_string()))?;
    let mut content = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut content)
        .map_err(|e| decode_error(e.to_string()))?;

    Ok(content)
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, log_id: &str, entry: &str) -> Result<(), LogStoreError> {
        let slot = self.state(log_id);
        let _guard = slot.lock().await;

        fs::create_dir_all(&self.base_dir).await?;

        let mut line = String::with_capacity(entry.len() + 1);
        line.push_str(entry);
        line.push(RECORD_SEPARATOR);

        let mut file =
            fs::OpenOptions::new().create(true).append(true).open(self.log_path(log_id)).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn list(&self, include_archived: bool) -> Result<Vec<String>, LogStoreError> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };

            if let Some(id) = name.strip_suffix(LOG_SUFFIX) {
                ids.push(id.to_string());
            } else if let Some(id) = name.strip_suffix(ARCHIVE_SUFFIX) {
                if include_archived {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();

        Ok(ids)
    }

    async fn compress_exclusive(&self, log_id: &str, archive_id: &str) -> Result<(), LogStoreError> {
        let slot = self.state(log_id);
        let mut state = slot.lock().await;
        if state.archived_len.is_some() {
            return Err(LogStoreError::RotationPending(log_id.to_string()));
        }

        let content = match fs::read(self.log_path(log_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LogStoreError::NotFound(log_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if content.is_empty() {
            return Err(LogStoreError::EmptyLog(log_id.to_string()));
        }

        let content_len = content.len() as u64;
        let encoded = tokio::task::spawn_blocking(move || compress(&content))
            .await
            .map_err(std::io::Error::other)??;

        let archive_path = self.archive_path(archive_id);
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&archive_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LogStoreError::AlreadyExists(archive_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            file.write_all(encoded.as_bytes()).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            // The archive is ours; a half-written one must not be mistaken for a good one
            drop(file);
            if let Err(remove_err) = fs::remove_file(&archive_path).await {
                warn!(archive_id, error = %remove_err, "Failed to remove partial archive");
            }
            return Err(e.into());
        }

        state.archived_len = Some(content_len);
        debug!(log_id, archive_id, bytes = encoded.len(), "Log compressed");
        Ok(())
    }

    async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError> {
        let encoded = match fs::read_to_string(self.archive_path(archive_id)).await {
            Ok(encoded) => encoded,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LogStoreError::NotFound(archive_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let archive_id = archive_id.to_string();
        tokio::task::spawn_blocking(move || decompress(&archive_id, &encoded))
            .await
            .map_err(|e| LogStoreError::Io(std::io::Error::other(e)))?
    }

    async fn truncate(&self, log_id: &str) -> Result<(), LogStoreError> {
        let slot = self.state(log_id);
        let mut state = slot.lock().await;
        // Cleared up front: a failed truncate leaves duplicates, never gaps
        let archived_len = state.archived_len.take();

        let path = self.log_path(log_id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LogStoreError::NotFound(log_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let keep_from = match archived_len {
            Some(len) => usize::try_from(len).unwrap_or(usize::MAX).min(content.len()),
            None => content.len(),
        };
        let rest = &content[keep_from..];

        if rest.is_empty() {
            let file = fs::OpenOptions::new().write(true).open(&path).await?;
            file.set_len(0).await?;
            file.sync_all().await?;
        } else {
            let tmp_path = path.with_extension("log.tmp");
            let mut tmp = fs::File::create(&tmp_path).await?;
            tmp.write_all(rest).await?;
            tmp.sync_all().await?;
            fs::rename(&tmp_path, &path).await?;
            debug!(log_id, kept = rest.len(), "Kept records appended during rotation");
        }

        Ok(())
    }
}
