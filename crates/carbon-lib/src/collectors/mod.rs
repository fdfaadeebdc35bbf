//! Telemetry collector boundaries
//!
//! The engine consumes these traits; the concrete clients (Prometheus,
//! OpenCost, Kepler, Electricity Maps, Boavizta, …) live outside the
//! core and are injected at construction. Every call may fail
//! independently: the processor guards each one and degrades to an
//! empty or default result instead of aborting the run.

use crate::models::{
    ClusterUsage, CostMetric, GridIntensityRecord, NodeInfo, PodRequest, RangeUsage, ServerImpact,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

pub use async_trait::async_trait;

/// The collectors one processor run consumes, injected at construction
#[derive(Clone)]
pub struct CollectorSet {
    pub nodes: std::sync::Arc<dyn NodeCollector>,
    pub usage: std::sync::Arc<dyn UsageCollector>,
    pub cost: std::sync::Arc<dyn CostCollector>,
    pub pod_requests: std::sync::Arc<dyn PodRequestCollector>,
    pub embodied_impact: std::sync::Arc<dyn EmbodiedImpactCollector>,
}

/// Cluster node inventory
#[async_trait]
pub trait NodeCollector: Send + Sync {
    /// Full node inventory keyed by node name
    async fn collect(&self) -> Result<HashMap<String, NodeInfo>>;

    /// Just the instance-type labels, keyed by node name
    async fn collect_instance_types(&self) -> Result<HashMap<String, String>>;
}

/// Pod CPU/memory usage and node labels from the metrics backend
#[async_trait]
pub trait UsageCollector: Send + Sync {
    /// Current usage snapshot across the cluster
    async fn collect(&self) -> Result<ClusterUsage>;

    /// Historical usage rows over `[start, end)` sampled at `step`
    async fn collect_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<RangeUsage>;
}

/// Cost allocation rows from the cost backend
#[async_trait]
pub trait CostCollector: Send + Sync {
    /// Cost allocations over the trailing `window`
    async fn collect(&self, window: Duration) -> Result<Vec<CostMetric>>;
}

/// Declared container resource requests
#[async_trait]
pub trait PodRequestCollector: Send + Sync {
    async fn collect(&self) -> Result<Vec<PodRequest>>;
}

/// Historical grid intensity records for one zone.
///
/// Consumed by the intensity ingestion job, not by the processor: the
/// processor only reads ingested history back through
/// [`crate::storage::CarbonIntensityRepository`].
#[async_trait]
pub trait GridIntensityCollector: Send + Sync {
    async fn collect(&self, zone: &str) -> Result<Vec<GridIntensityRecord>>;
}

/// External impact-estimation service for embodied emissions
#[async_trait]
pub trait EmbodiedImpactCollector: Send + Sync {
    /// Manufacturing impact for a cloud instance, `None` when the
    /// service has no data for it
    async fn get_server_impact(
        &self,
        provider: &str,
        instance_type: &str,
    ) -> Result<Option<ServerImpact>>;
}
