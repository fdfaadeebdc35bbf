//! The processing pipeline for one snapshot run
//!
//! Coordinates collectors, the energy estimator and the carbon
//! calculator into combined metrics. Every collection sub-step is
//! independently guarded: an unreachable collector degrades that
//! sub-step to an empty or default result and the run continues. Data
//! gaps never abort a run either; they surface as `is_estimated` plus
//! human-readable reasons on the affected metrics.

use crate::carbon::{co2e_grams, CarbonCalculator};
use crate::collectors::{
    CollectorSet, CostCollector, EmbodiedImpactCollector, NodeCollector, PodRequestCollector,
    UsageCollector,
};
use crate::config::EngineConfig;
use crate::energy::{EnergyEstimator, NodeUsageMap};
use crate::models::{
    ClusterUsage, CombinedMetric, EmbodiedProfile, EnergyMetric, NodeContext, NodeInfo,
    NodeSnapshot, PodRequest,
};
use crate::observability::EngineMetrics;
use crate::profiles::{
    emaps_zone_for_cloud_zone, pue_for_provider, PowerProfileRegistry, INFERRED_CORES_SUFFIX,
};
use crate::storage::{EmbodiedProfileRepository, NodeRepository, RepositorySet};
use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// (namespace, pod) lookup key
pub(super) type PodKey = (String, String);

/// Node context plus the reason recorded when the zone mapping fell
/// back to the configured default
pub(super) struct NodeContextEntry {
    pub context: NodeContext,
    pub fallback_reason: Option<String>,
}

/// Per-pod lookups feeding the combine step
#[derive(Default)]
pub(super) struct PodLookups {
    pub cost_by_pod: HashMap<String, f64>,
    pub requests: HashMap<PodKey, (f64, u64)>,
    pub cpu_usage_millicores: HashMap<PodKey, f64>,
    pub memory_usage: HashMap<PodKey, u64>,
    pub network: HashMap<PodKey, (u64, u64)>,
    pub disk: HashMap<PodKey, (u64, u64)>,
    pub restarts: HashMap<PodKey, u32>,
}

/// Orchestrates collection, estimation and calculation into the
/// canonical combined-metric stream
pub struct Processor {
    config: EngineConfig,
    collectors: CollectorSet,
    node_repository: Arc<dyn NodeRepository>,
    embodied_repository: Arc<dyn EmbodiedProfileRepository>,
    registry: Arc<PowerProfileRegistry>,
    estimator: EnergyEstimator,
    calculator: Arc<CarbonCalculator>,
    metrics: EngineMetrics,
}

impl Processor {
    pub fn new(
        config: EngineConfig,
        collectors: CollectorSet,
        repositories: RepositorySet,
        registry: Arc<PowerProfileRegistry>,
        calculator: Arc<CarbonCalculator>,
    ) -> Self {
        Self {
            config,
            collectors,
            node_repository: repositories.nodes,
            embodied_repository: repositories.embodied,
            estimator: EnergyEstimator::new(registry.clone()),
            registry,
            calculator,
            metrics: EngineMetrics::new(),
        }
    }

    pub(super) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(super) fn calculator(&self) -> &CarbonCalculator {
        &self.calculator
    }

    pub(super) fn estimator(&self) -> &EnergyEstimator {
        &self.estimator
    }

    pub(super) fn collectors(&self) -> &CollectorSet {
        &self.collectors
    }

    pub(super) fn node_repository(&self) -> &Arc<dyn NodeRepository> {
        &self.node_repository
    }

    /// Produce one combined metric per pod for the current slice
    pub async fn run(&self) -> Result<Vec<CombinedMetric>> {
        let started = Instant::now();
        info!("Starting processing cycle");
        self.calculator.clear_cache().await;

        // Independent collections run concurrently; the join is the
        // barrier before anything downstream needs their results.
        let (inventory, usage, costs, requests) = tokio::join!(
            self.collect_inventory(),
            self.collect_usage(),
            self.collect_costs(),
            self.collect_requests(),
        );

        let now = Utc::now();
        self.save_node_snapshots(&inventory, now).await;

        let contexts = self.resolve_node_contexts(&inventory);
        let lookups = build_pod_lookups(&usage, &costs, &requests);

        let mut usage_by_node = usage_by_node(&usage);
        let substituted = self.apply_low_usage_substitution(&mut usage_by_node, &lookups.requests);

        let instance_types = self.resolve_instance_types(&usage, &inventory);
        let energy = self.estimator.estimate(
            &usage_by_node,
            &instance_types,
            self.config.query_step_secs as f64,
            now,
        );

        self.prefetch_intensity(&energy, &contexts).await;
        let embodied = self.resolve_embodied_profiles(&energy, &contexts).await;

        let combined = self
            .combine(
                energy,
                &contexts,
                &lookups,
                &embodied,
                &substituted,
                self.config.query_step_secs as f64,
            )
            .await;

        self.metrics.add_combined_metrics_produced(combined.len() as u64);
        self.metrics.observe_run_latency(started.elapsed().as_secs_f64());
        info!(count = combined.len(), "Processing cycle complete");
        Ok(combined)
    }

    // --- guarded collection sub-steps -------------------------------

    pub(super) async fn collect_inventory(&self) -> HashMap<String, NodeInfo> {
        match self.collectors.nodes.collect().await {
            Ok(inventory) => inventory,
            Err(error) => {
                warn!(%error, "Node inventory collection failed; continuing without it");
                HashMap::new()
            }
        }
    }

    async fn collect_usage(&self) -> ClusterUsage {
        match self.collectors.usage.collect().await {
            Ok(usage) => usage,
            Err(error) => {
                warn!(%error, "Usage collection failed; continuing with empty usage");
                ClusterUsage::default()
            }
        }
    }

    pub(super) async fn collect_costs(&self) -> Vec<crate::models::CostMetric> {
        let window = std::time::Duration::from_secs(self.config.query_step_secs);
        match self.collectors.cost.collect(window).await {
            Ok(costs) => costs,
            Err(error) => {
                warn!(%error, "Cost collection failed; pods will use the default cost");
                Vec::new()
            }
        }
    }

    pub(super) async fn collect_requests(&self) -> Vec<PodRequest> {
        match self.collectors.pod_requests.collect().await {
            Ok(requests) => requests,
            Err(error) => {
                warn!(%error, "Pod request collection failed; continuing without requests");
                Vec::new()
            }
        }
    }

    async fn save_node_snapshots(
        &self,
        inventory: &HashMap<String, NodeInfo>,
        timestamp: chrono::DateTime<Utc>,
    ) {
        if inventory.is_empty() {
            return;
        }
        let snapshots: Vec<NodeSnapshot> = inventory
            .values()
            .map(|node| NodeSnapshot {
                timestamp,
                node: node.clone(),
            })
            .collect();
        if let Err(error) = self.node_repository.save_snapshots(&snapshots).await {
            warn!(%error, "Failed to persist node snapshots; historical replays may degrade");
        }
    }

    // --- resolution steps -------------------------------------------

    /// Map each inventoried node's cloud zone (falling back to its
    /// region) to a grid zone, defaulting and recording a reason when
    /// unmapped
    pub(super) fn resolve_node_contexts(
        &self,
        inventory: &HashMap<String, NodeInfo>,
    ) -> HashMap<String, NodeContextEntry> {
        inventory
            .iter()
            .map(|(name, info)| {
                let mapped = info
                    .zone
                    .as_deref()
                    .and_then(emaps_zone_for_cloud_zone)
                    .or_else(|| info.region.as_deref().and_then(emaps_zone_for_cloud_zone));

                let (emaps_zone, fallback_reason) = match mapped {
                    Some(zone) => (zone.to_string(), None),
                    None => (
                        self.config.default_zone.clone(),
                        Some(format!(
                            "Could not map zone '{}' for node '{name}'; used default zone '{}'",
                            info.zone.as_deref().unwrap_or("<none>"),
                            self.config.default_zone
                        )),
                    ),
                };

                let entry = NodeContextEntry {
                    context: NodeContext {
                        node_name: name.clone(),
                        cloud_provider: info.cloud_provider.clone(),
                        instance_type: info.instance_type.clone(),
                        zone: info.zone.clone(),
                        region: info.region.clone(),
                        emaps_zone,
                    },
                    fallback_reason,
                };
                (name.clone(), entry)
            })
            .collect()
    }

    /// Instance types for estimation: usage labels first, then the node
    /// inventory, then a synthetic "N inferred cores" label from
    /// capacity
    fn resolve_instance_types(
        &self,
        usage: &ClusterUsage,
        inventory: &HashMap<String, NodeInfo>,
    ) -> BTreeMap<String, String> {
        let mut types: BTreeMap<String, String> = usage
            .node_instance_types
            .iter()
            .map(|entry| (entry.node.clone(), entry.instance_type.clone()))
            .collect();

        let nodes_in_use: HashSet<&str> =
            usage.pod_cpu_usage.iter().map(|row| row.node.as_str()).collect();
        for node in nodes_in_use {
            if types.contains_key(node) {
                continue;
            }
            let Some(info) = inventory.get(node) else {
                continue;
            };
            if let Some(instance_type) = &info.instance_type {
                types.insert(node.to_string(), instance_type.clone());
            } else if let Some(cores) = info.cpu_capacity_cores.filter(|c| *c >= 1.0) {
                types.insert(
                    node.to_string(),
                    format!("{}{INFERRED_CORES_SUFFIX}", cores.round() as u32),
                );
            }
        }
        types
    }

    /// Substitute declared requests for usage on nodes whose reported
    /// total is implausibly near zero while pods still request
    /// resources, so node energy is not misattributed to one pod
    pub(super) fn apply_low_usage_substitution(
        &self,
        usage_by_node: &mut NodeUsageMap,
        requests: &HashMap<PodKey, (f64, u64)>,
    ) -> HashSet<String> {
        let threshold = self.config.low_usage_substitution_threshold_millicores;
        let mut substituted = HashSet::new();

        for (node, pods) in usage_by_node.iter_mut() {
            let total_millicores: f64 = pods.values().sum::<f64>() * 1000.0;
            if total_millicores >= threshold {
                continue;
            }
            let has_requests = pods.keys().any(|key| {
                requests
                    .get(key)
                    .map(|(cpu, _)| *cpu > 0.0)
                    .unwrap_or(false)
            });
            if !has_requests {
                continue;
            }

            for (key, cores) in pods.iter_mut() {
                if let Some((request_millicores, _)) = requests.get(key) {
                    if *request_millicores > 0.0 {
                        *cores = request_millicores / 1000.0;
                    }
                }
            }
            warn!(
                node = %node,
                total_millicores,
                "Node reported near-zero CPU usage; substituting declared requests"
            );
            substituted.insert(node.clone());
        }
        substituted
    }

    /// Warm the intensity cache for every (zone, slice) pair the run
    /// will need, collapsing O(pods) lookups into O(zones x buckets)
    pub(super) async fn prefetch_intensity(
        &self,
        energy: &[EnergyMetric],
        contexts: &HashMap<String, NodeContextEntry>,
    ) {
        let mut pairs: HashSet<(String, i64)> = HashSet::new();
        for metric in energy {
            let zone = self.zone_for_node(&metric.node, contexts);
            if pairs.insert((zone.clone(), metric.timestamp.timestamp())) {
                if let Err(error) = self.calculator.prefetch(&zone, metric.timestamp).await {
                    debug!(zone = %zone, %error, "Intensity prefetch failed");
                }
            }
        }
    }

    /// Resolve one embodied profile per distinct (provider, instance
    /// type): repository first, impact service on miss, `None` on total
    /// failure
    pub(super) async fn resolve_embodied_profiles(
        &self,
        energy: &[EnergyMetric],
        contexts: &HashMap<String, NodeContextEntry>,
    ) -> HashMap<(String, String), Option<EmbodiedProfile>> {
        let mut keys: HashSet<(String, String)> = HashSet::new();
        for metric in energy {
            if let Some(entry) = contexts.get(&metric.node) {
                if let Some(instance_type) = &entry.context.instance_type {
                    keys.insert((entry.context.cloud_provider.clone(), instance_type.clone()));
                }
            }
        }

        let mut profiles = HashMap::new();
        for (provider, instance_type) in keys {
            let profile = self.resolve_embodied_profile(&provider, &instance_type).await;
            profiles.insert((provider, instance_type), profile);
        }
        profiles
    }

    async fn resolve_embodied_profile(
        &self,
        provider: &str,
        instance_type: &str,
    ) -> Option<EmbodiedProfile> {
        match self.embodied_repository.get_profile(provider, instance_type).await {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => {}
            Err(error) => {
                warn!(provider, instance_type, %error, "Embodied profile lookup failed");
            }
        }

        match self
            .collectors
            .embodied_impact
            .get_server_impact(provider, instance_type)
            .await
        {
            Ok(Some(impact)) => {
                let gwp_manufacture_kg = impact.gwp_manufacture_kg?;
                let profile = EmbodiedProfile {
                    gwp_manufacture_kg,
                    lifespan_hours: self.config.default_lifespan_hours,
                };
                if let Err(error) = self
                    .embodied_repository
                    .save_profile(provider, instance_type, &profile)
                    .await
                {
                    warn!(provider, instance_type, %error, "Failed to cache embodied profile");
                }
                Some(profile)
            }
            Ok(None) => {
                debug!(provider, instance_type, "Impact service has no data for instance");
                None
            }
            Err(error) => {
                warn!(provider, instance_type, %error, "Impact service unreachable");
                None
            }
        }
    }

    fn zone_for_node(
        &self,
        node: &str,
        contexts: &HashMap<String, NodeContextEntry>,
    ) -> String {
        contexts
            .get(node)
            .map(|entry| entry.context.emaps_zone.clone())
            .unwrap_or_else(|| self.config.default_zone.clone())
    }

    // --- the combine step -------------------------------------------

    /// Merge energy metrics with carbon, cost, request and embodied
    /// data into combined metrics, propagating every estimation reason
    /// accumulated along the way. A failed calculation skips only its
    /// metric.
    pub(super) async fn combine(
        &self,
        energy: Vec<EnergyMetric>,
        contexts: &HashMap<String, NodeContextEntry>,
        lookups: &PodLookups,
        embodied: &HashMap<(String, String), Option<EmbodiedProfile>>,
        substituted_nodes: &HashSet<String>,
        duration_secs: f64,
    ) -> Vec<CombinedMetric> {
        let mut combined = Vec::with_capacity(energy.len());

        for metric in energy {
            let mut reasons = metric.estimation_reasons.clone();
            let pod_key: PodKey = (metric.namespace.clone(), metric.pod_name.clone());

            let (emaps_zone, provider, instance_type) = match contexts.get(&metric.node) {
                Some(entry) => {
                    if let Some(reason) = &entry.fallback_reason {
                        reasons.push(reason.clone());
                    }
                    (
                        entry.context.emaps_zone.clone(),
                        entry.context.cloud_provider.clone(),
                        entry.context.instance_type.clone(),
                    )
                }
                None => {
                    reasons.push(format!(
                        "Node '{}' missing from inventory; used default zone '{}'",
                        metric.node, self.config.default_zone
                    ));
                    (
                        self.config.default_zone.clone(),
                        "unknown".to_string(),
                        None,
                    )
                }
            };

            let pue = match pue_for_provider(&provider) {
                Some(pue) => pue,
                None => {
                    reasons.push(format!(
                        "No PUE profile for provider '{provider}'; used default {:.2}",
                        self.config.default_pue
                    ));
                    self.config.default_pue
                }
            };

            if substituted_nodes.contains(&metric.node) {
                reasons.push(format!(
                    "Node '{}' reported near-zero CPU usage; energy attributed from declared requests",
                    metric.node
                ));
            }

            let result = match self
                .calculator
                .calculate_emissions_with_pue(metric.joules, &emaps_zone, metric.timestamp, pue)
                .await
            {
                Ok(result) => result,
                Err(error) => {
                    warn!(
                        pod = %metric.pod_name,
                        namespace = %metric.namespace,
                        %error,
                        "Carbon calculation failed; skipping metric"
                    );
                    continue;
                }
            };

            let (co2e, grid_intensity) = match result.grid_intensity {
                Some(intensity) => (result.co2e_grams, Some(intensity)),
                None => {
                    reasons.push(format!(
                        "No grid intensity for zone '{emaps_zone}'; used default {}",
                        self.config.default_grid_intensity
                    ));
                    (
                        co2e_grams(metric.joules, pue, self.config.default_grid_intensity),
                        Some(self.config.default_grid_intensity),
                    )
                }
            };

            let total_cost = match lookups.cost_by_pod.get(&metric.pod_name) {
                Some(cost) => *cost,
                None => {
                    reasons.push(format!(
                        "No cost data for pod '{}'; used default {:.2}",
                        metric.pod_name, self.config.default_cost
                    ));
                    self.config.default_cost
                }
            };

            let (cpu_request, memory_request) =
                lookups.requests.get(&pod_key).copied().unwrap_or((0.0, 0));
            let cpu_usage = lookups.cpu_usage_millicores.get(&pod_key).copied();

            let embodied_co2e_grams = self.embodied_for_pod(
                &provider,
                instance_type.as_deref(),
                embodied,
                cpu_request,
                cpu_usage,
                duration_secs,
                &mut reasons,
            );

            let is_estimated = !reasons.is_empty();
            if is_estimated {
                self.metrics.inc_estimation_fallbacks();
            }

            combined.push(CombinedMetric {
                pod_name: metric.pod_name,
                namespace: metric.namespace,
                timestamp: Some(metric.timestamp),
                period: None,
                joules: metric.joules,
                co2e_grams: co2e,
                embodied_co2e_grams,
                total_cost,
                cpu_request_millicores: cpu_request,
                memory_request_bytes: memory_request,
                cpu_usage_millicores: cpu_usage,
                memory_usage_bytes: lookups.memory_usage.get(&pod_key).copied(),
                network_receive_bytes: lookups.network.get(&pod_key).map(|(rx, _)| *rx),
                network_transmit_bytes: lookups.network.get(&pod_key).map(|(_, tx)| *tx),
                disk_read_bytes: lookups.disk.get(&pod_key).map(|(r, _)| *r),
                disk_write_bytes: lookups.disk.get(&pod_key).map(|(_, w)| *w),
                restart_count: lookups.restarts.get(&pod_key).copied(),
                grid_intensity,
                pue,
                emaps_zone,
                node: metric.node,
                node_instance_type: instance_type,
                duration_seconds: duration_secs,
                is_estimated,
                estimation_reasons: reasons,
            });
        }
        combined
    }

    #[allow(clippy::too_many_arguments)]
    fn embodied_for_pod(
        &self,
        provider: &str,
        instance_type: Option<&str>,
        embodied: &HashMap<(String, String), Option<EmbodiedProfile>>,
        cpu_request_millicores: f64,
        cpu_usage_millicores: Option<f64>,
        duration_secs: f64,
        reasons: &mut Vec<String>,
    ) -> f64 {
        let Some(instance_type) = instance_type else {
            reasons.push(
                "No instance type; assumed zero embodied emissions".to_string(),
            );
            return 0.0;
        };

        let profile = embodied
            .get(&(provider.to_string(), instance_type.to_string()))
            .and_then(|profile| profile.as_ref());
        let Some(profile) = profile else {
            reasons.push(format!(
                "No embodied emissions profile for {provider}/{instance_type}; assumed zero"
            ));
            return 0.0;
        };

        let vcores = self.registry.resolve(instance_type).profile.vcores.max(1) as f64;
        let share_cores = if cpu_request_millicores > 0.0 {
            cpu_request_millicores / 1000.0
        } else {
            cpu_usage_millicores.unwrap_or(0.0) / 1000.0
        };
        let vcore_share = (share_cores / vcores).clamp(0.0, 1.0);

        self.calculator.calculate_embodied_emissions(
            profile.gwp_manufacture_kg,
            profile.lifespan_hours,
            duration_secs,
            vcore_share,
        )
    }
}

/// Aggregate per-container usage rows into a node -> pod -> cores map
pub(super) fn usage_by_node(usage: &ClusterUsage) -> NodeUsageMap {
    let mut map = NodeUsageMap::new();
    for row in &usage.pod_cpu_usage {
        *map.entry(row.node.clone())
            .or_default()
            .entry((row.namespace.clone(), row.pod.clone()))
            .or_default() += row.cpu_usage_cores;
    }
    map
}

/// Build the per-pod lookups the combine step needs
pub(super) fn build_pod_lookups(
    usage: &ClusterUsage,
    costs: &[crate::models::CostMetric],
    requests: &[PodRequest],
) -> PodLookups {
    let mut lookups = PodLookups::default();

    for cost in costs {
        lookups
            .cost_by_pod
            .insert(cost.pod_name.clone(), cost.total_cost);
    }

    // Requests aggregate across a pod's containers
    for request in requests {
        let entry = lookups
            .requests
            .entry((request.namespace.clone(), request.pod_name.clone()))
            .or_insert((0.0, 0));
        entry.0 += request.cpu_request_millicores;
        entry.1 += request.memory_request_bytes;
    }

    for row in &usage.pod_cpu_usage {
        *lookups
            .cpu_usage_millicores
            .entry((row.namespace.clone(), row.pod.clone()))
            .or_default() += row.cpu_usage_cores * 1000.0;
    }
    for row in &usage.pod_memory_usage {
        *lookups
            .memory_usage
            .entry((row.namespace.clone(), row.pod.clone()))
            .or_default() += row.memory_usage_bytes;
    }
    for row in &usage.pod_network_io {
        let entry = lookups
            .network
            .entry((row.namespace.clone(), row.pod.clone()))
            .or_insert((0, 0));
        entry.0 += row.network_receive_bytes;
        entry.1 += row.network_transmit_bytes;
    }
    for row in &usage.pod_disk_io {
        let entry = lookups
            .disk
            .entry((row.namespace.clone(), row.pod.clone()))
            .or_insert((0, 0));
        entry.0 += row.disk_read_bytes;
        entry.1 += row.disk_write_bytes;
    }
    for row in &usage.pod_restart_counts {
        *lookups
            .restarts
            .entry((row.namespace.clone(), row.pod.clone()))
            .or_default() += row.restart_count;
    }

    lookups
}
