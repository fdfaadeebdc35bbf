//! Recommendation engine
//!
//! Pure analysis over a window of combined-metric history: nine
//! independent analyzers for zombie workloads, rightsizing, autoscaling
//! candidates, off-peak and carbon-aware scheduling, idle namespaces
//! and node consolidation. Stateless and deterministic; analyzers skip
//! records lacking the data they need instead of erroring.

mod node;
mod stats;
mod workload;


pub use stats::{coefficient_of_variation, mean, percentile, std_dev};

use crate::config::RecommendationThresholds;
use crate::models::{CombinedMetric, NodeInfo, Recommendation};
use crate::observability::EngineMetrics;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Pod name used on recommendations that target a whole namespace or
/// node rather than a single pod.
pub const WILDCARD_POD: &str = "*";

/// Analyzes combined metrics to generate optimization recommendations
pub struct Recommender {
    thresholds: RecommendationThresholds,
    metrics: EngineMetrics,
}

impl Default for Recommender {
    fn default() -> Self {
        Self::new(RecommendationThresholds::default())
    }
}

impl Recommender {
    pub fn new(thresholds: RecommendationThresholds) -> Self {
        Self {
            thresholds,
            metrics: EngineMetrics::new(),
        }
    }

    /// Run every analyzer over the metric window and return the
    /// deduplicated union of their findings.
    ///
    /// `node_infos` enables the node-level analyzers; without it only
    /// pod- and namespace-level patterns are detected.
    pub fn generate_recommendations(
        &self,
        metrics: &[CombinedMetric],
        node_infos: Option<&[NodeInfo]>,
    ) -> Vec<Recommendation> {
        if metrics.is_empty() {
            return Vec::new();
        }

        let mut recommendations = Vec::new();
        recommendations.extend(self.detect_zombie_pods(metrics));
        recommendations.extend(self.detect_oversized_cpu(metrics));
        recommendations.extend(self.detect_oversized_memory(metrics));
        recommendations.extend(self.detect_autoscaling_candidates(metrics));
        recommendations.extend(self.detect_off_peak_windows(metrics));
        recommendations.extend(self.detect_idle_namespaces(metrics));
        recommendations.extend(self.detect_carbon_aware_candidates(metrics));
        if let Some(nodes) = node_infos {
            recommendations.extend(self.detect_overprovisioned_nodes(metrics, nodes));
            recommendations.extend(self.detect_underutilized_nodes(metrics, nodes));
        }

        let recommendations = dedup(recommendations);
        self.metrics
            .add_recommendations_generated(recommendations.len() as u64);
        debug!(count = recommendations.len(), "Recommendation analysis complete");
        recommendations
    }

    /// Narrow entry point for zombie-only call sites; same analyzer as
    /// [`generate_recommendations`](Self::generate_recommendations).
    pub fn generate_zombie_recommendations(
        &self,
        metrics: &[CombinedMetric],
    ) -> Vec<Recommendation> {
        dedup(self.detect_zombie_pods(metrics))
    }

    /// Narrow entry point for rightsizing-only call sites (CPU and
    /// memory).
    pub fn generate_rightsizing_recommendations(
        &self,
        metrics: &[CombinedMetric],
    ) -> Vec<Recommendation> {
        let mut recommendations = self.detect_oversized_cpu(metrics);
        recommendations.extend(self.detect_oversized_memory(metrics));
        dedup(recommendations)
    }

    pub(crate) fn thresholds(&self) -> &RecommendationThresholds {
        &self.thresholds
    }
}

/// Group metrics by (namespace, pod), preserving input order inside a
/// group
pub(crate) fn group_by_pod(
    metrics: &[CombinedMetric],
) -> BTreeMap<(String, String), Vec<&CombinedMetric>> {
    let mut groups: BTreeMap<(String, String), Vec<&CombinedMetric>> = BTreeMap::new();
    for metric in metrics {
        groups
            .entry((metric.namespace.clone(), metric.pod_name.clone()))
            .or_default()
            .push(metric);
    }
    groups
}

/// Drop recommendations repeating an already-seen
/// (namespace, pod, type, target node) identity, keeping the first
fn dedup(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut seen = HashSet::new();
    recommendations
        .into_iter()
        .filter(|rec| {
            seen.insert((
                rec.namespace.clone(),
                rec.pod_name.clone(),
                rec.kind,
                rec.target_node.clone().unwrap_or_default(),
            ))
        })
        .collect()
}
