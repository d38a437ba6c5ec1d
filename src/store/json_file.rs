// src/store/json_file.rs
//! Durable store: a [`MemoryStore`] mirrored to files under a state directory.
//!
//! Current rates are a pretty JSON snapshot rewritten on change. History and
//! the notification log are JSON Lines, appended one record per write.
//! A failed disk write never leaves memory ahead of disk: appends hit disk
//! first, and a failed snapshot rolls memory back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::{fs, sync::Mutex};

use super::{
    MemoryStore, NotificationLog, RateRepository, SourceRepository, SubscriberRepository,
};
use crate::domain::{
    AlertNotification, ExchangeRate, HistoricalRate, NotificationSubscriber, RateKey,
    ScrapingSource,
};
use crate::error::PersistenceError;

const CURRENT_FILE: &str = "current_rates.json";
const HISTORY_FILE: &str = "historical_rates.jsonl";
const NOTIFICATIONS_FILE: &str = "notifications.jsonl";

pub struct JsonFileStore {
    dir: PathBuf,
    mem: MemoryStore,
    /// Held across the memory update and the matching disk write.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or create) the state directory and load whatever it holds.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| PersistenceError::Io {
                path: dir.display().to_string(),
                source,
            })?;

        let current: Vec<ExchangeRate> = read_json(&dir.join(CURRENT_FILE)).await?;
        let history: Vec<HistoricalRate> = read_json_lines(&dir.join(HISTORY_FILE)).await?;
        let notifications: Vec<AlertNotification> =
            read_json_lines(&dir.join(NOTIFICATIONS_FILE)).await?;

        tracing::info!(
            dir = %dir.display(),
            current = current.len(),
            history = history.len(),
            notifications = notifications.len(),
            "state loaded"
        );

        let mem = MemoryStore::new();
        mem.restore(current, history, notifications).await;
        Ok(Self {
            dir,
            mem,
            write_lock: Mutex::new(()),
        })
    }

    /// In-memory view, also used to seed sources and subscribers.
    pub fn memory(&self) -> &MemoryStore {
        &self.mem
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
    match fs::read_to_string(path).await {
        Ok(s) if s.trim().is_empty() => Ok(Vec::new()),
        Ok(s) => serde_json::from_str(&s).map_err(|source| PersistenceError::Encoding {
            path: path.display().to_string(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(io_error(path)(source)),
    }
}

/// One record per line. A torn last line from a crash is skipped with a warning.
async fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
    let content = match fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(io_error(path)(source)),
    };
    let mut out = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(v) => out.push(v),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = n + 1,
                error = %e,
                "unreadable state line skipped"
            ),
        }
    }
    Ok(out)
}

/// Write to a sibling temp file, then rename over the target.
async fn write_json<T: Serialize>(path: &Path, items: &[T]) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(items).map_err(|source| PersistenceError::Encoding {
        path: path.display().to_string(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await.map_err(io_error(path))?;
    fs::rename(&tmp, path).await.map_err(io_error(path))
}

async fn append_json_line<T: Serialize>(path: &Path, item: &T) -> Result<(), PersistenceError> {
    let mut line = serde_json::to_vec(item).map_err(|source| PersistenceError::Encoding {
        path: path.display().to_string(),
        source,
    })?;
    line.push(b'\n');
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_error(path))?;
    file.write_all(&line).await.map_err(io_error(path))?;
    file.flush().await.map_err(io_error(path))
}

#[async_trait]
impl RateRepository for JsonFileStore {
    async fn current_rate(&self, key: &RateKey) -> Result<Option<ExchangeRate>, PersistenceError> {
        self.mem.current_rate(key).await
    }

    async fn upsert_current_rate(&self, rate: ExchangeRate) -> Result<ExchangeRate, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let key = rate.key();
        let previous = self.mem.current_rate(&key).await?;
        let kept = self.mem.upsert_current_rate(rate).await?;
        if previous.as_ref().is_some_and(|p| p.id == kept.id) {
            return Ok(kept);
        }

        let snapshot = self.mem.current_rates().await;
        if let Err(e) = write_json(&self.dir.join(CURRENT_FILE), &snapshot).await {
            self.mem.reset_current(key, previous).await;
            return Err(e);
        }
        Ok(kept)
    }

    async fn append_historical_rate(
        &self,
        rate: HistoricalRate,
    ) -> Result<HistoricalRate, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        append_json_line(&self.dir.join(HISTORY_FILE), &rate).await?;
        self.mem.append_historical_rate(rate).await
    }
}

#[async_trait]
impl SourceRepository for JsonFileStore {
    async fn active_sources(&self) -> Result<Vec<ScrapingSource>, PersistenceError> {
        self.mem.active_sources().await
    }
}

#[async_trait]
impl SubscriberRepository for JsonFileStore {
    async fn active_subscribers(&self) -> Result<Vec<NotificationSubscriber>, PersistenceError> {
        self.mem.active_subscribers().await
    }
}

#[async_trait]
impl NotificationLog for JsonFileStore {
    async fn append_notification(
        &self,
        n: AlertNotification,
    ) -> Result<AlertNotification, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        append_json_line(&self.dir.join(NOTIFICATIONS_FILE), &n).await?;
        self.mem.append_notification(n).await
    }
}
