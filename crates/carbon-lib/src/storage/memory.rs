//! In-memory repository backend
//!
//! Backs tests and single-process deployments. Intensity history is
//! kept per zone in a sorted map so lookups resolve to the most recent
//! record at or before the requested time.

use super::{CarbonIntensityRepository, EmbodiedProfileRepository, NodeRepository};
use crate::models::{CombinedMetric, EmbodiedProfile, GridIntensityRecord, NodeSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-memory intensity history plus combined-metric storage
#[derive(Default)]
pub struct InMemoryIntensityRepository {
    /// zone -> (epoch seconds -> intensity)
    history: RwLock<BTreeMap<String, BTreeMap<i64, f64>>>,
    metrics: RwLock<Vec<CombinedMetric>>,
}

impl InMemoryIntensityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed intensity history, e.g. from a grid-intensity collector
    pub async fn insert_history(&self, records: &[GridIntensityRecord]) {
        let mut history = self.history.write().await;
        for record in records {
            history
                .entry(record.zone.clone())
                .or_default()
                .insert(record.timestamp.timestamp(), record.intensity);
        }
    }
}

#[async_trait]
impl CarbonIntensityRepository for InMemoryIntensityRepository {
    async fn get_for_zone_at_time(
        &self,
        zone: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let history = self.history.read().await;
        Ok(history.get(zone).and_then(|records| {
            records
                .range(..=timestamp.timestamp())
                .next_back()
                .map(|(_, intensity)| *intensity)
        }))
    }

    async fn write_combined_metrics(&self, metrics: &[CombinedMetric]) -> Result<()> {
        self.metrics.write().await.extend_from_slice(metrics);
        Ok(())
    }

    async fn read_combined_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CombinedMetric>> {
        let metrics = self.metrics.read().await;
        Ok(metrics
            .iter()
            .filter(|m| m.timestamp.map(|ts| ts >= start && ts < end).unwrap_or(false))
            .cloned()
            .collect())
    }
}

/// In-memory node snapshot storage
#[derive(Default)]
pub struct InMemoryNodeRepository {
    snapshots: RwLock<Vec<NodeSnapshot>>,
}

impl InMemoryNodeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn save_snapshots(&self, snapshots: &[NodeSnapshot]) -> Result<()> {
        self.snapshots.write().await.extend_from_slice(snapshots);
        Ok(())
    }

    async fn get_latest_snapshots_before(
        &self,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<NodeSnapshot>> {
        let snapshots = self.snapshots.read().await;
        let mut latest: BTreeMap<String, NodeSnapshot> = BTreeMap::new();
        for snapshot in snapshots.iter().filter(|s| s.timestamp <= timestamp) {
            match latest.get(&snapshot.node.name) {
                Some(existing) if existing.timestamp >= snapshot.timestamp => {}
                _ => {
                    latest.insert(snapshot.node.name.clone(), snapshot.clone());
                }
            }
        }
        Ok(latest.into_values().collect())
    }

    async fn get_snapshots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NodeSnapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp < end)
            .cloned()
            .collect())
    }
}

/// In-memory embodied profile cache keyed by (provider, instance type)
#[derive(Default)]
pub struct InMemoryEmbodiedProfileRepository {
    profiles: DashMap<(String, String), EmbodiedProfile>,
}

impl InMemoryEmbodiedProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmbodiedProfileRepository for InMemoryEmbodiedProfileRepository {
    async fn get_profile(
        &self,
        provider: &str,
        instance_type: &str,
    ) -> Result<Option<EmbodiedProfile>> {
        Ok(self
            .profiles
            .get(&(provider.to_string(), instance_type.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn save_profile(
        &self,
        provider: &str,
        instance_type: &str,
        profile: &EmbodiedProfile,
    ) -> Result<()> {
        self.profiles.insert(
            (provider.to_string(), instance_type.to_string()),
            profile.clone(),
        );
        Ok(())
    }
}
