use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::model::BestsellerResult;

pub const BESTSELLER_CACHE_KEY: &str = "bessel_bestseller_cache_v2";

/// Single-slot persisted records addressed by key. Values are raw JSON text so
/// that a corrupt record can be observed and discarded by the reader.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn put(&self, key: &str, record: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct LocalFsCacheStore {
    base_dir: PathBuf,
}

impl LocalFsCacheStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CacheStore for LocalFsCacheStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.record_path(key);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read: {}", path.display())),
        }
    }

    async fn put(&self, key: &str, record: &str) -> anyhow::Result<()> {
        write_atomic(&self.record_path(key), record.as_bytes()).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.record_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove: {}", path.display())),
        }
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, record: &str) -> anyhow::Result<()> {
        self.records
            .lock()
            .await
            .insert(key.to_owned(), record.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.records.lock().await.remove(key);
        Ok(())
    }
}

/// Persisted form: `{"date": "YYYY-MM-DD", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub date: NaiveDate,
    pub data: BestsellerResult,
}

/// Bestseller cache whose validity is calendar-date equality.
pub struct DailyCache {
    store: Arc<dyn CacheStore>,
    key: String,
}

impl DailyCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_key(store, BESTSELLER_CACHE_KEY)
    }

    pub fn with_key(store: Arc<dyn CacheStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the stored result if it was written on `today`, otherwise runs
    /// `fetch` and overwrites the slot with its result.
    pub async fn get_or_fetch<F, Fut>(&self, today: NaiveDate, fetch: F) -> BestsellerResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BestsellerResult>,
    {
        if let Some(data) = self.lookup(today).await {
            tracing::info!(%today, "returning cached bestseller data");
            return data;
        }

        let data = fetch().await;
        let record = CacheRecord { date: today, data };
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(err) = self.store.put(&self.key, &json).await {
                    tracing::warn!(?err, key = %self.key, "failed to persist bestseller cache");
                }
            }
            Err(err) => tracing::warn!(?err, "failed to serialize bestseller cache record"),
        }
        record.data
    }

    async fn lookup(&self, today: NaiveDate) -> Option<BestsellerResult> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(?err, key = %self.key, "failed to read bestseller cache");
                return None;
            }
        };

        match serde_json::from_str::<CacheRecord>(&raw) {
            Ok(record) if record.date == today => Some(record.data),
            Ok(record) => {
                tracing::debug!(cached = %record.date, %today, "bestseller cache is stale");
                None
            }
            Err(err) => {
                tracing::warn!(?err, "invalid bestseller cache record, discarding");
                if let Err(err) = self.store.remove(&self.key).await {
                    tracing::warn!(?err, key = %self.key, "failed to discard bestseller cache");
                }
                None
            }
        }
    }
}
