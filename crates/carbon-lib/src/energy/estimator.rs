//! Converts per-node CPU usage into per-pod energy estimates
//!
//! The physical model is a linear interpolation between the instance's
//! idle and full-load power draw, with node power distributed to pods
//! proportionally to their share of the node's CPU usage.

use crate::models::EnergyMetric;
use crate::profiles::PowerProfileRegistry;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// (namespace, pod) -> CPU cores used during the slice
pub type PodUsageMap = BTreeMap<(String, String), f64>;

/// node -> per-pod usage for the slice
pub type NodeUsageMap = BTreeMap<String, PodUsageMap>;

/// Estimates pod energy consumption from CPU usage and power profiles
pub struct EnergyEstimator {
    registry: Arc<PowerProfileRegistry>,
}

impl EnergyEstimator {
    pub fn new(registry: Arc<PowerProfileRegistry>) -> Self {
        Self { registry }
    }

    /// Estimate per-pod energy for one time slice.
    ///
    /// Nodes with a positive usage total distribute the interpolated
    /// node power proportionally; nodes with no usage signal fall back
    /// to pricing each pod at its own utilization of the node's vcores,
    /// so no pod silently drops out of accounting.
    pub fn estimate(
        &self,
        usage_by_node: &NodeUsageMap,
        instance_types: &BTreeMap<String, String>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    ) -> Vec<EnergyMetric> {
        let mut metrics = Vec::new();
        for (node, pods) in usage_by_node {
            metrics.extend(self.estimate_node(
                node,
                instance_types.get(node).map(String::as_str),
                pods,
                duration_secs,
                timestamp,
            ));
        }
        debug!(count = metrics.len(), "Energy estimation complete");
        metrics
    }

    /// Estimate energy for all pods on a single node
    pub fn estimate_node(
        &self,
        node: &str,
        instance_type: Option<&str>,
        pods: &PodUsageMap,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    ) -> Vec<EnergyMetric> {
        if pods.is_empty() {
            return Vec::new();
        }

        let (profile, mut estimated, mut reasons) = match instance_type {
            Some(label) => {
                let resolved = self.registry.resolve(label);
                let reasons = resolved.reason.into_iter().collect::<Vec<_>>();
                (resolved.profile, resolved.estimated, reasons)
            }
            None => (
                self.registry.default_profile(),
                true,
                vec![format!(
                    "No instance type reported for node '{node}'; used default power profile"
                )],
            ),
        };

        let vcores = profile.vcores.max(1) as f64;
        let total_cpu: f64 = pods.values().sum();

        if total_cpu <= 0.0 {
            estimated = true;
            reasons.push(format!(
                "No CPU usage signal on node '{node}'; estimated from per-pod utilization"
            ));
        }

        let utilization = (total_cpu / vcores).min(1.0);
        let node_power_watts =
            profile.min_watts + utilization * (profile.max_watts - profile.min_watts);

        pods.iter()
            .map(|((namespace, pod), cpu_cores)| {
                let pod_power_watts = if total_cpu > 0.0 {
                    node_power_watts * (cpu_cores / total_cpu)
                } else {
                    let own_utilization = (cpu_cores / vcores).clamp(0.0, 1.0);
                    profile.min_watts
                        + own_utilization * (profile.max_watts - profile.min_watts)
                };
                EnergyMetric {
                    pod_name: pod.clone(),
                    namespace: namespace.clone(),
                    node: node.to_string(),
                    joules: pod_power_watts * duration_secs,
                    timestamp,
                    is_estimated: estimated,
                    estimation_reasons: reasons.clone(),
                }
            })
            .collect()
    }
}
