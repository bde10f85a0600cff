//! In-memory icon cache with a debounced durable snapshot
//!
//! Reads are synchronous and memory-resident; writes follow the
//! strictly-greater score rule unless forced, and each accepted write
//! schedules a debounced flush that coalesces rapid writes into one
//! persisted snapshot after a quiescence window.

pub mod kv;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{CacheSnapshot, IconCacheEntry};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};

/// Bumping this abandons every durable snapshot written under the old
/// version: cold-start re-detection for everyone.
pub const CACHE_SCHEMA_VERSION: u32 = 3;

/// Storage key the snapshot lives under. The engine owns this key and
/// bumps the embedded version to force a global cold start.
pub fn snapshot_key() -> String {
    format!("favicon-cache:v{}", CACHE_SCHEMA_VERSION)
}

/// Aggregate counters surfaced by the CLI after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub mean_score: f64,
    pub oldest: Option<chrono::DateTime<Utc>>,
}

#[derive(Clone)]
pub struct IconCacheStore {
    entries: Arc<Mutex<HashMap<String, IconCacheEntry>>>,
    kv: Arc<dyn KeyValueStore>,
    flush_debounce: Duration,
    max_age: chrono::Duration,
    flush_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    ready_tx: Arc<watch::Sender<bool>>,
    ready_rx: watch::Receiver<bool>,
}

impl IconCacheStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, flush_debounce_ms: u64, max_age_days: i64) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            kv,
            flush_debounce: Duration::from_millis(flush_debounce_ms),
            max_age: chrono::Duration::days(max_age_days),
            flush_task: Arc::new(Mutex::new(None)),
            ready_tx: Arc::new(ready_tx),
            ready_rx,
        }
    }

    /// Synchronous, memory-resident lookup.
    pub fn get(&self, domain: &str) -> Option<IconCacheEntry> {
        self.entries.lock().unwrap().get(domain).cloned()
    }

    /// Write an entry if `score` strictly exceeds the existing one, or
    /// unconditionally when `force` is set (force-refresh cycle). Returns
    /// whether anything was written. Accepted writes schedule a debounced
    /// durable flush.
    pub fn put(&self, domain: &str, url: &str, score: i32, force: bool) -> bool {
        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(existing) = entries.get(domain) {
                if !force && score <= existing.score {
                    return false;
                }
            }
            entries.insert(domain.to_string(), IconCacheEntry::new(domain, url, score));
        }
        debug!("Cached icon for {}: {} (score {})", domain, url, score);
        self.schedule_flush();
        true
    }

    /// Read the durable snapshot, drop entries past the hard-expiry max
    /// age, populate memory and signal the one-time "storage ready"
    /// transition. Absent or corrupt state is treated as empty; nothing
    /// here is fatal. Returns the number of entries loaded.
    pub async fn load(&self) -> usize {
        let start = std::time::Instant::now();
        let key = snapshot_key();

        let snapshot: CacheSnapshot = match self.kv.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Discarding corrupt icon snapshot under {}: {}", key, e);
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Failed to read icon snapshot under {}: {}", key, e);
                HashMap::new()
            }
        };

        let now = Utc::now();
        let total = snapshot.len();
        let fresh: HashMap<String, IconCacheEntry> = snapshot
            .into_iter()
            .filter(|(_, entry)| entry.age(now) < self.max_age)
            .collect();
        let purged = total - fresh.len();
        let loaded = fresh.len();

        *self.entries.lock().unwrap() = fresh;
        let _ = self.ready_tx.send(true);

        info!(
            "Icon cache loaded: {} entries ({} purged as expired) in {:.2?}",
            loaded,
            purged,
            start.elapsed()
        );
        loaded
    }

    /// Whether the one-time storage-ready transition has happened.
    pub fn storage_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Wait for the storage-ready transition.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        // Only errors when the sender is gone, which means the store
        // itself is gone too.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Explicit full wipe of memory and durable state.
    pub async fn clear(&self) {
        self.entries.lock().unwrap().clear();
        if let Some(task) = self.flush_task.lock().unwrap().take() {
            task.abort();
        }
        if let Err(e) = self.kv.remove(&snapshot_key()).await {
            warn!("Failed to remove durable icon snapshot: {}", e);
        }
        info!("Icon cache cleared");
    }

    /// Flush immediately, cancelling any pending debounced flush. Used at
    /// graceful shutdown.
    pub async fn flush_now(&self) {
        if let Some(task) = self.flush_task.lock().unwrap().take() {
            task.abort();
        }
        Self::write_snapshot(&self.entries, &self.kv).await;
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap();
        let count = entries.len();
        let mean_score = if count == 0 {
            0.0
        } else {
            entries.values().map(|e| e.score as f64).sum::<f64>() / count as f64
        };
        CacheStats {
            entries: count,
            mean_score,
            oldest: entries.values().map(|e| e.timestamp).min(),
        }
    }

    /// Schedule a flush at now + debounce, cancelling and rescheduling on
    /// every accepted write so rapid writes coalesce into one snapshot.
    fn schedule_flush(&self) {
        let entries = Arc::clone(&self.entries);
        let kv = Arc::clone(&self.kv);
        let debounce = self.flush_debounce;

        let mut slot = self.flush_task.lock().unwrap();
        if let Some(task) = slot.take() {
            task.abort();
        }
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            Self::write_snapshot(&entries, &kv).await;
        }));
    }

    async fn write_snapshot(
        entries: &Mutex<HashMap<String, IconCacheEntry>>,
        kv: &Arc<dyn KeyValueStore>,
    ) {
        let snapshot = entries.lock().unwrap().clone();
        let count = snapshot.len();
        let bytes = match serde_json::to_vec(&snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize icon snapshot: {}", e);
                return;
            }
        };
        match kv.set(&snapshot_key(), bytes).await {
            Ok(()) => debug!("Flushed icon snapshot: {} entries", count),
            Err(e) => warn!("Failed to persist icon snapshot: {}", e),
        }
    }
}
