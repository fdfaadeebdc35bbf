//! Historical range mode
//!
//! Replays the snapshot pipeline over `[start, end)` at the configured
//! step, using persisted node snapshots (most recent at or before each
//! bucket boundary) instead of live inventory. Sample timestamps are
//! normalized to step boundaries before bucketing so floating-point
//! drift cannot produce spurious buckets.

use super::aggregate::{aggregate_metrics, Aggregation};
use super::processor::{build_pod_lookups, PodKey, PodLookups, Processor};
use crate::collectors::{CostCollector, NodeCollector, UsageCollector};
use crate::models::{CombinedMetric, NodeInfo, NodeSnapshot, RangeSeries};
use crate::profiles::INFERRED_CORES_SUFFIX;
use crate::storage::NodeRepository;
use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

impl Processor {
    /// Produce combined metrics for a historical window, optionally
    /// filtered to one namespace and aggregated into periods
    pub async fn run_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        namespace: Option<&str>,
        aggregation: Option<Aggregation>,
    ) -> Result<Vec<CombinedMetric>> {
        if end <= start {
            bail!("range end {end} is not after start {start}");
        }
        let step_secs = self.config().query_step_secs as i64;
        info!(%start, %end, step_secs, "Starting range processing");
        self.calculator().clear_cache().await;

        let step = std::time::Duration::from_secs(step_secs as u64);
        let window = (end - start)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(0));

        let usage = match self.collectors().usage.collect_range(start, end, step).await {
            Ok(usage) => usage,
            Err(error) => {
                warn!(%error, "Range usage collection failed; continuing with empty usage");
                Default::default()
            }
        };

        let (base_snapshots, window_snapshots, live_types, costs, requests) = tokio::join!(
            self.collect_snapshots_before(start),
            self.collect_snapshots_window(start, end),
            self.collect_live_instance_types(),
            self.collect_costs_window(window),
            self.collect_requests(),
        );

        let timeline = snapshot_timeline(base_snapshots, window_snapshots);

        let cpu_buckets = bucket_series(&usage.pod_cpu, start, end, step_secs, namespace);
        let mem_buckets = bucket_series(&usage.pod_memory, start, end, step_secs, namespace);

        // Shared cost/request lookups; usage lookups are per bucket
        let shared = build_pod_lookups(&Default::default(), &costs, &requests);

        // First pass: estimate every bucket so embodied profiles can be
        // resolved once across the whole window
        let mut buckets = Vec::new();
        for (bucket_index, rows) in &cpu_buckets {
            let bucket_time = start + Duration::seconds(*bucket_index * step_secs);
            let mut inventory = inventory_at(&timeline, bucket_time);
            // The live collector's instance labels are fresher than any
            // snapshot; snapshots still supply zone and provider
            for (name, info) in inventory.iter_mut() {
                if let Some(label) = live_types.get(name) {
                    info.instance_type = Some(label.clone());
                }
            }
            let contexts = self.resolve_node_contexts(&inventory);

            let mut node_usage = crate::energy::NodeUsageMap::new();
            for row in rows {
                *node_usage
                    .entry(row.node.clone())
                    .or_default()
                    .entry((row.namespace.clone(), row.pod.clone()))
                    .or_default() += row.value;
            }
            let substituted =
                self.apply_low_usage_substitution(&mut node_usage, &shared.requests);

            let instance_types =
                range_instance_types(&node_usage, &inventory, &live_types);
            let energy = self.estimator().estimate(
                &node_usage,
                &instance_types,
                step_secs as f64,
                bucket_time,
            );

            let mut lookups = PodLookups {
                cost_by_pod: shared.cost_by_pod.clone(),
                requests: shared.requests.clone(),
                ..Default::default()
            };
            for row in rows {
                *lookups
                    .cpu_usage_millicores
                    .entry((row.namespace.clone(), row.pod.clone()))
                    .or_default() += row.value * 1000.0;
            }
            if let Some(memory) = mem_buckets.get(bucket_index) {
                for row in memory {
                    let key: PodKey = (row.namespace.clone(), row.pod.clone());
                    let entry = lookups.memory_usage.entry(key).or_default();
                    *entry = (*entry).max(row.value as u64);
                }
            }

            buckets.push((energy, contexts, lookups, substituted));
        }

        let all_energy: Vec<_> = buckets
            .iter()
            .flat_map(|(energy, _, _, _)| energy.iter().cloned())
            .collect();
        let merged_contexts: HashMap<_, _> = buckets
            .iter()
            .flat_map(|(_, contexts, _, _)| contexts.iter())
            .map(|(node, entry)| {
                (
                    node.clone(),
                    super::processor::NodeContextEntry {
                        context: entry.context.clone(),
                        fallback_reason: entry.fallback_reason.clone(),
                    },
                )
            })
            .collect();
        let embodied = self
            .resolve_embodied_profiles(&all_energy, &merged_contexts)
            .await;

        // Second pass: prefetch and combine per bucket
        let mut combined = Vec::new();
        for (energy, contexts, lookups, substituted) in buckets {
            self.prefetch_intensity(&energy, &contexts).await;
            combined.extend(
                self.combine(
                    energy,
                    &contexts,
                    &lookups,
                    &embodied,
                    &substituted,
                    step_secs as f64,
                )
                .await,
            );
        }

        info!(count = combined.len(), "Range processing complete");
        Ok(match aggregation {
            Some(aggregation) => aggregate_metrics(combined, aggregation),
            None => combined,
        })
    }

    async fn collect_snapshots_before(&self, start: DateTime<Utc>) -> Vec<NodeSnapshot> {
        match self.node_repository().get_latest_snapshots_before(start).await {
            Ok(snapshots) => snapshots,
            Err(error) => {
                warn!(%error, "Historical snapshot lookup failed; continuing without inventory");
                Vec::new()
            }
        }
    }

    async fn collect_snapshots_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<NodeSnapshot> {
        match self.node_repository().get_snapshots(start, end).await {
            Ok(snapshots) => snapshots,
            Err(error) => {
                warn!(%error, "In-window snapshot lookup failed; using window-start inventory");
                Vec::new()
            }
        }
    }

    async fn collect_live_instance_types(&self) -> HashMap<String, String> {
        match self.collectors().nodes.collect_instance_types().await {
            Ok(types) => types,
            Err(error) => {
                warn!(%error, "Live instance-type lookup failed; relying on snapshots");
                HashMap::new()
            }
        }
    }

    async fn collect_costs_window(
        &self,
        window: std::time::Duration,
    ) -> Vec<crate::models::CostMetric> {
        match self.collectors().cost.collect(window).await {
            Ok(costs) => costs,
            Err(error) => {
                warn!(%error, "Cost collection failed; pods will use the default cost");
                Vec::new()
            }
        }
    }
}

/// Per-node snapshot history sorted by timestamp
fn snapshot_timeline(
    base: Vec<NodeSnapshot>,
    window: Vec<NodeSnapshot>,
) -> HashMap<String, Vec<NodeSnapshot>> {
    let mut timeline: HashMap<String, Vec<NodeSnapshot>> = HashMap::new();
    for snapshot in base.into_iter().chain(window) {
        timeline
            .entry(snapshot.node.name.clone())
            .or_default()
            .push(snapshot);
    }
    for snapshots in timeline.values_mut() {
        snapshots.sort_by_key(|s| s.timestamp);
    }
    timeline
}

/// Inventory as of `at`: the most recent snapshot at or before it per
/// node
fn inventory_at(
    timeline: &HashMap<String, Vec<NodeSnapshot>>,
    at: DateTime<Utc>,
) -> HashMap<String, NodeInfo> {
    timeline
        .iter()
        .filter_map(|(name, snapshots)| {
            snapshots
                .iter()
                .rev()
                .find(|s| s.timestamp <= at)
                .map(|s| (name.clone(), s.node.clone()))
        })
        .collect()
}

/// One sample flattened out of a series, already assigned to a bucket
struct BucketRow {
    namespace: String,
    pod: String,
    node: String,
    value: f64,
}

/// Group raw series points into step buckets, normalizing each sample
/// timestamp to its bucket boundary. Returns bucket index -> flattened
/// per-pod rows.
fn bucket_series(
    series: &[RangeSeries],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_secs: i64,
    namespace: Option<&str>,
) -> BTreeMap<i64, Vec<BucketRow>> {
    let mut buckets: BTreeMap<i64, Vec<BucketRow>> = BTreeMap::new();
    for row in series {
        if let Some(filter) = namespace {
            if row.namespace != filter {
                continue;
            }
        }
        for (timestamp, value) in &row.points {
            if *timestamp < start || *timestamp >= end {
                continue;
            }
            let bucket = (*timestamp - start).num_seconds() / step_secs;
            buckets.entry(bucket).or_default().push(BucketRow {
                namespace: row.namespace.clone(),
                pod: row.pod.clone(),
                node: row.node.clone(),
                value: *value,
            });
        }
    }
    buckets
}

/// Instance types for a historical bucket: the live collector's labels
/// win, then the snapshot inventory, then a capacity-derived synthetic
/// label
fn range_instance_types(
    node_usage: &crate::energy::NodeUsageMap,
    inventory: &HashMap<String, NodeInfo>,
    live_types: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    let mut types = BTreeMap::new();
    for node in node_usage.keys() {
        if let Some(label) = live_types.get(node) {
            types.insert(node.clone(), label.clone());
            continue;
        }
        let Some(info) = inventory.get(node) else {
            continue;
        };
        if let Some(label) = &info.instance_type {
            types.insert(node.clone(), label.clone());
        } else if let Some(cores) = info.cpu_capacity_cores.filter(|c| *c >= 1.0) {
            types.insert(
                node.clone(),
                format!("{}{INFERRED_CORES_SUFFIX}", cores.round() as u32),
            );
        }
    }
    types
}
