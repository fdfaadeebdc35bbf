//! Per-run intensity cache with single-flight lookups
//!
//! Intensity lookups are repository round-trips requested with high
//! key-collision probability (many pods, same zone and hour), so the
//! cache guarantees at most one in-flight lookup per distinct key:
//! concurrent callers for the same key await the same fetch and all
//! receive its result. Absences are cached too, so a failing lookup is
//! not retried until the cache is cleared.

use crate::observability::EngineMetrics;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

type CacheKey = (String, i64);

/// Concurrency-safe (zone, normalized timestamp) -> intensity cache.
///
/// Keys are never evicted automatically; `clear` is the only way to
/// force a re-fetch and is intended to be called once per processing
/// run.
pub struct IntensityCache {
    entries: Mutex<HashMap<CacheKey, Arc<OnceCell<Option<f64>>>>>,
    metrics: EngineMetrics,
}

impl Default for IntensityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IntensityCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            metrics: EngineMetrics::new(),
        }
    }

    /// Return the cached intensity for `(zone, normalized)`, fetching it
    /// through `fetch` exactly once per key. A fetch error is logged and
    /// cached as an absence.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        zone: &str,
        normalized: DateTime<Utc>,
        fetch: F,
    ) -> Option<f64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<f64>>>,
    {
        // The map lock covers the check-or-insert critical section; the
        // per-key cell then serializes the fetch itself without blocking
        // lookups for other keys.
        let cell = {
            let mut entries = self.entries.lock().await;
            entries
                .entry((zone.to_string(), normalized.timestamp()))
                .or_default()
                .clone()
        };

        if let Some(value) = cell.get() {
            self.metrics.inc_intensity_cache_hits();
            return *value;
        }

        let zone = zone.to_string();
        let metrics = self.metrics.clone();
        *cell
            .get_or_init(|| async move {
                metrics.inc_intensity_cache_misses();
                match fetch().await {
                    Ok(value) => value,
                    Err(error) => {
                        warn!(zone = %zone, %error, "Intensity lookup failed; caching absence");
                        None
                    }
                }
            })
            .await
    }

    /// Drop every cached entry, forcing subsequent lookups to re-fetch
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of distinct keys currently cached
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
