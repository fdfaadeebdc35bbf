//! Node-level consolidation analyzers

use super::stats::mean;
use super::{Recommender, WILDCARD_POD};
use crate::models::{
    CombinedMetric, NodeInfo, Recommendation, RecommendationPriority, RecommendationType,
};
use std::collections::{BTreeMap, BTreeSet};

/// A node with fewer distinct pods than this and utilization below
/// [`UNDERUTILIZED_CPU_FRACTION`] is a drain-and-remove candidate.
const UNDERUTILIZED_MIN_PODS: usize = 3;
const UNDERUTILIZED_CPU_FRACTION: f64 = 0.15;

impl Recommender {
    /// Nodes whose pods use a small fraction of the CPU capacity
    pub(super) fn detect_overprovisioned_nodes(
        &self,
        metrics: &[CombinedMetric],
        nodes: &[NodeInfo],
    ) -> Vec<Recommendation> {
        let t = self.thresholds();
        let mut recommendations = Vec::new();

        for node in nodes {
            let Some(utilization) = node_utilization(metrics, node) else {
                continue;
            };
            if utilization >= t.node_utilization {
                continue;
            }

            recommendations.push(Recommendation {
                pod_name: WILDCARD_POD.to_string(),
                namespace: WILDCARD_POD.to_string(),
                kind: RecommendationType::OverprovisionedNode,
                description: format!(
                    "Node '{}' runs at {:.1}% of its {:.0}-core capacity. Consider moving \
                     its workloads to a smaller instance or packing them onto other nodes.",
                    node.name,
                    utilization * 100.0,
                    node.cpu_capacity_cores.unwrap_or(0.0)
                ),
                reason: format!(
                    "mean utilization {:.3} below {:.3}",
                    utilization, t.node_utilization
                ),
                priority: RecommendationPriority::Medium,
                target_node: Some(node.name.clone()),
                cron_schedule: None,
                current_cpu_request_millicores: None,
                recommended_cpu_request_millicores: None,
                current_memory_request_bytes: None,
                recommended_memory_request_bytes: None,
                potential_savings_cost: None,
                potential_savings_co2e_grams: None,
            });
        }
        recommendations
    }

    /// Nodes hosting only a couple of barely-active pods
    pub(super) fn detect_underutilized_nodes(
        &self,
        metrics: &[CombinedMetric],
        nodes: &[NodeInfo],
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for node in nodes {
            let pods: BTreeSet<(&str, &str)> = metrics
                .iter()
                .filter(|m| m.node == node.name)
                .map(|m| (m.namespace.as_str(), m.pod_name.as_str()))
                .collect();
            if pods.is_empty() || pods.len() >= UNDERUTILIZED_MIN_PODS {
                continue;
            }

            let Some(utilization) = node_utilization(metrics, node) else {
                continue;
            };
            if utilization >= UNDERUTILIZED_CPU_FRACTION {
                continue;
            }

            recommendations.push(Recommendation {
                pod_name: WILDCARD_POD.to_string(),
                namespace: WILDCARD_POD.to_string(),
                kind: RecommendationType::UnderutilizedNode,
                description: format!(
                    "Node '{}' hosts only {} pod(s) at {:.1}% CPU utilization. Draining it \
                     and letting the cluster scale down would save its full footprint.",
                    node.name,
                    pods.len(),
                    utilization * 100.0
                ),
                reason: format!(
                    "{} distinct pods (fewer than {UNDERUTILIZED_MIN_PODS}) with \
                     utilization {:.3} below {UNDERUTILIZED_CPU_FRACTION}",
                    pods.len(),
                    utilization
                ),
                priority: RecommendationPriority::Low,
                target_node: Some(node.name.clone()),
                cron_schedule: None,
                current_cpu_request_millicores: None,
                recommended_cpu_request_millicores: None,
                current_memory_request_bytes: None,
                recommended_memory_request_bytes: None,
                potential_savings_cost: None,
                potential_savings_co2e_grams: None,
            });
        }
        recommendations
    }
}

/// Mean total CPU utilization of a node across time slices, `None` when
/// capacity or usage data is missing
fn node_utilization(metrics: &[CombinedMetric], node: &NodeInfo) -> Option<f64> {
    let capacity_cores = node.cpu_capacity_cores.filter(|c| *c > 0.0)?;

    // Sum usage per time slice, then average the slice totals
    let mut per_slice: BTreeMap<Option<i64>, f64> = BTreeMap::new();
    for metric in metrics.iter().filter(|m| m.node == node.name) {
        if let Some(usage) = metric.cpu_usage_millicores {
            *per_slice
                .entry(metric.timestamp.map(|ts| ts.timestamp()))
                .or_default() += usage;
        }
    }
    if per_slice.is_empty() {
        return None;
    }

    let totals: Vec<f64> = per_slice.into_values().collect();
    Some(mean(&totals) / (capacity_cores * 1000.0))
}
