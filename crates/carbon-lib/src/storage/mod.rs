//! Repository boundaries for persisted data
//!
//! The engine only depends on these traits; concrete backends (SQLite,
//! Postgres, Elasticsearch) live outside the core and are injected at
//! construction. An in-memory implementation is provided for tests and
//! default wiring.

pub mod memory;

pub use memory::{
    InMemoryEmbodiedProfileRepository, InMemoryIntensityRepository, InMemoryNodeRepository,
};

use crate::models::{CombinedMetric, EmbodiedProfile, NodeSnapshot};
use anyhow::Result;
use chrono::{DateTime, Utc};

pub use async_trait::async_trait;

/// The repositories the engine consumes, injected at construction
#[derive(Clone)]
pub struct RepositorySet {
    pub intensity: std::sync::Arc<dyn CarbonIntensityRepository>,
    pub nodes: std::sync::Arc<dyn NodeRepository>,
    pub embodied: std::sync::Arc<dyn EmbodiedProfileRepository>,
}

/// Storage for grid carbon intensity history and combined metrics
#[async_trait]
pub trait CarbonIntensityRepository: Send + Sync {
    /// Intensity (gCO2e/kWh) for a zone at a point in time, `None` when
    /// no record covers it
    async fn get_for_zone_at_time(
        &self,
        zone: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<f64>>;

    /// Persist a batch of combined metrics
    async fn write_combined_metrics(&self, metrics: &[CombinedMetric]) -> Result<()>;

    /// Read back combined metrics for a window
    async fn read_combined_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CombinedMetric>>;
}

/// Storage for node inventory snapshots
#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn save_snapshots(&self, snapshots: &[NodeSnapshot]) -> Result<()>;

    /// Most recent snapshot per node at or before `timestamp`
    async fn get_latest_snapshots_before(
        &self,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<NodeSnapshot>>;

    /// All snapshots within `[start, end)`
    async fn get_snapshots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NodeSnapshot>>;
}

/// Storage for embodied (manufacturing) emission profiles
#[async_trait]
pub trait EmbodiedProfileRepository: Send + Sync {
    async fn get_profile(
        &self,
        provider: &str,
        instance_type: &str,
    ) -> Result<Option<EmbodiedProfile>>;

    async fn save_profile(
        &self,
        provider: &str,
        instance_type: &str,
        profile: &EmbodiedProfile,
    ) -> Result<()>;
}
