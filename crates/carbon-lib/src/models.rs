//! Core data models for the carbon estimation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node inventory entry as reported by the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub instance_type: Option<String>,
    pub zone: Option<String>,
    pub region: Option<String>,
    #[serde(default = "default_provider")]
    pub cloud_provider: String,
    pub cpu_capacity_cores: Option<f64>,
    pub memory_capacity_bytes: Option<u64>,
}

fn default_provider() -> String {
    "unknown".to_string()
}

/// Point-in-time snapshot of a node, persisted for historical replays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub timestamp: DateTime<Utc>,
    pub node: NodeInfo,
}

/// Node identity resolved once per processing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeContext {
    pub node_name: String,
    pub cloud_provider: String,
    pub instance_type: Option<String>,
    pub zone: Option<String>,
    pub region: Option<String>,
    /// Grid-intensity zone code the node's cloud zone maps to
    pub emaps_zone: String,
}

/// Per-container CPU usage row from the usage collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodCpuUsage {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub node: String,
    pub cpu_usage_cores: f64,
}

/// Per-pod memory usage row from the usage collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodMemoryUsage {
    pub namespace: String,
    pub pod: String,
    pub node: String,
    pub memory_usage_bytes: u64,
}

/// Per-pod network I/O counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodNetworkIo {
    pub namespace: String,
    pub pod: String,
    pub node: String,
    pub network_receive_bytes: u64,
    pub network_transmit_bytes: u64,
}

/// Per-pod disk I/O counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodDiskIo {
    pub namespace: String,
    pub pod: String,
    pub node: String,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
}

/// Per-container restart counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRestartCount {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub restart_count: u32,
}

/// Node instance-type label reported alongside usage data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstanceType {
    pub node: String,
    pub instance_type: String,
}

/// One usage collection cycle across the cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterUsage {
    pub pod_cpu_usage: Vec<PodCpuUsage>,
    #[serde(default)]
    pub pod_memory_usage: Vec<PodMemoryUsage>,
    #[serde(default)]
    pub pod_network_io: Vec<PodNetworkIo>,
    #[serde(default)]
    pub pod_disk_io: Vec<PodDiskIo>,
    #[serde(default)]
    pub pod_restart_counts: Vec<PodRestartCount>,
    pub node_instance_types: Vec<NodeInstanceType>,
}

/// One pod's sampled time series over a historical window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSeries {
    pub namespace: String,
    pub pod: String,
    pub node: String,
    /// (sample timestamp, value) pairs; CPU in cores, memory in bytes
    pub points: Vec<(DateTime<Utc>, f64)>,
}

/// Historical usage rows returned by `UsageCollector::collect_range`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeUsage {
    pub pod_cpu: Vec<RangeSeries>,
    #[serde(default)]
    pub pod_memory: Vec<RangeSeries>,
}

/// Cost allocation row from the cost collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostMetric {
    pub pod_name: String,
    pub namespace: String,
    pub cpu_cost: f64,
    pub ram_cost: f64,
    pub total_cost: f64,
}

/// Declared resource requests for one container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRequest {
    pub pod_name: String,
    pub namespace: String,
    pub container_name: String,
    pub cpu_request_millicores: f64,
    pub memory_request_bytes: u64,
}

/// Per-pod energy for one time slice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyMetric {
    pub pod_name: String,
    pub namespace: String,
    pub node: String,
    pub joules: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_estimated: bool,
    #[serde(default)]
    pub estimation_reasons: Vec<String>,
}

/// Output of one carbon calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonCalculationResult {
    pub co2e_grams: f64,
    /// Grid intensity used, absent when no data was found for the zone
    pub grid_intensity: Option<f64>,
    pub grid_intensity_timestamp: Option<DateTime<Utc>>,
}

/// Amortized manufacturing footprint for an instance type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbodiedProfile {
    pub gwp_manufacture_kg: f64,
    pub lifespan_hours: f64,
}

/// Manufacturing impact reported by the external impact service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerImpact {
    pub gwp_manufacture_kg: Option<f64>,
}

/// Historical grid intensity record for one zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridIntensityRecord {
    pub zone: String,
    pub timestamp: DateTime<Utc>,
    /// gCO2e per kWh
    pub intensity: f64,
}

/// The canonical combined row: energy, carbon, cost and resource data
/// for one pod over one time slice (or one aggregation period).
///
/// `timestamp` and `period` are mutually exclusive: raw slices carry a
/// timestamp, aggregated rows carry a period label instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedMetric {
    pub pod_name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub joules: f64,
    pub co2e_grams: f64,
    #[serde(default)]
    pub embodied_co2e_grams: f64,
    pub total_cost: f64,
    #[serde(default)]
    pub cpu_request_millicores: f64,
    #[serde(default)]
    pub memory_request_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage_millicores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_receive_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_transmit_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_read_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_write_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_intensity: Option<f64>,
    pub pue: f64,
    pub emaps_zone: String,
    pub node: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_instance_type: Option<String>,
    pub duration_seconds: f64,
    #[serde(default)]
    pub is_estimated: bool,
    #[serde(default)]
    pub estimation_reasons: Vec<String>,
}

/// Optimization patterns the recommendation engine can detect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    ZombiePod,
    RightsizingCpu,
    RightsizingMemory,
    AutoscalingCandidate,
    OffPeakScaling,
    IdleNamespace,
    CarbonAwareScheduling,
    OverprovisionedNode,
    UnderutilizedNode,
}

/// Recommendation urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
}

/// One actionable optimization recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub pod_name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub description: String,
    pub reason: String,
    pub priority: RecommendationPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_cpu_request_millicores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_cpu_request_millicores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_memory_request_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_memory_request_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_savings_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_savings_co2e_grams: Option<f64>,
}
