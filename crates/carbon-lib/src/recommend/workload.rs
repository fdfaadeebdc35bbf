//! Pod- and namespace-level analyzers

use super::stats::{coefficient_of_variation, mean, percentile};
use super::{group_by_pod, Recommender, WILDCARD_POD};
use crate::models::{
    CombinedMetric, Recommendation, RecommendationPriority, RecommendationType,
};
use chrono::Timelike;
use std::collections::BTreeMap;

impl Recommender {
    /// Pods that cost money while consuming near-zero energy
    pub(super) fn detect_zombie_pods(&self, metrics: &[CombinedMetric]) -> Vec<Recommendation> {
        let t = self.thresholds();
        let mut recommendations = Vec::new();

        for ((namespace, pod), group) in group_by_pod(metrics) {
            let total_cost: f64 = group.iter().map(|m| m.total_cost).sum();
            let total_joules: f64 = group.iter().map(|m| m.joules).sum();
            let total_co2e: f64 = group.iter().map(|m| m.co2e_grams).sum();

            if total_cost > t.zombie_cost && total_joules < t.zombie_energy_joules {
                recommendations.push(Recommendation {
                    pod_name: pod.clone(),
                    namespace: namespace.clone(),
                    kind: RecommendationType::ZombiePod,
                    description: format!(
                        "Pod cost {total_cost:.4} while consuming only {total_joules:.0} J; \
                         it may be idle or orphaned. Consider scaling it down or deleting it."
                    ),
                    reason: format!(
                        "cost {total_cost:.4} above {:.4} with energy {total_joules:.0} J below {:.0} J",
                        t.zombie_cost, t.zombie_energy_joules
                    ),
                    priority: RecommendationPriority::High,
                    target_node: None,
                    cron_schedule: None,
                    current_cpu_request_millicores: None,
                    recommended_cpu_request_millicores: None,
                    current_memory_request_bytes: None,
                    recommended_memory_request_bytes: None,
                    potential_savings_cost: Some(total_cost),
                    potential_savings_co2e_grams: Some(total_co2e),
                });
            }
        }
        recommendations
    }

    /// Pods whose mean CPU usage sits far below their request
    pub(super) fn detect_oversized_cpu(&self, metrics: &[CombinedMetric]) -> Vec<Recommendation> {
        let t = self.thresholds();
        let mut recommendations = Vec::new();

        for ((namespace, pod), group) in group_by_pod(metrics) {
            let request = group
                .iter()
                .map(|m| m.cpu_request_millicores)
                .fold(0.0_f64, f64::max);
            if request <= 0.0 {
                continue;
            }
            let usage: Vec<f64> = group
                .iter()
                .filter_map(|m| m.cpu_usage_millicores)
                .collect();
            if usage.is_empty() {
                continue;
            }

            let mean_usage = mean(&usage);
            if mean_usage / request >= t.rightsizing_cpu {
                continue;
            }

            let recommended = (percentile(&usage, 95.0) * t.rightsizing_headroom).max(1.0);
            recommendations.push(Recommendation {
                pod_name: pod.clone(),
                namespace: namespace.clone(),
                kind: RecommendationType::RightsizingCpu,
                description: format!(
                    "Pod uses a mean of {mean_usage:.0}m of its {request:.0}m CPU request \
                     ({:.0}%). Consider lowering the request to {recommended:.0}m.",
                    mean_usage / request * 100.0
                ),
                reason: format!(
                    "mean usage / request {:.2} below {:.2} over {} samples",
                    mean_usage / request,
                    t.rightsizing_cpu,
                    usage.len()
                ),
                priority: RecommendationPriority::Medium,
                target_node: None,
                cron_schedule: None,
                current_cpu_request_millicores: Some(request),
                recommended_cpu_request_millicores: Some(recommended),
                current_memory_request_bytes: None,
                recommended_memory_request_bytes: None,
                potential_savings_cost: None,
                potential_savings_co2e_grams: None,
            });
        }
        recommendations
    }

    /// Pods whose mean memory usage sits far below their request
    pub(super) fn detect_oversized_memory(
        &self,
        metrics: &[CombinedMetric],
    ) -> Vec<Recommendation> {
        let t = self.thresholds();
        let mut recommendations = Vec::new();

        for ((namespace, pod), group) in group_by_pod(metrics) {
            let request = group.iter().map(|m| m.memory_request_bytes).max().unwrap_or(0);
            if request == 0 {
                continue;
            }
            let usage: Vec<f64> = group
                .iter()
                .filter_map(|m| m.memory_usage_bytes.map(|b| b as f64))
                .collect();
            if usage.is_empty() {
                continue;
            }

            let mean_usage = mean(&usage);
            if mean_usage / request as f64 >= t.rightsizing_memory {
                continue;
            }

            let recommended =
                (percentile(&usage, 95.0) * t.rightsizing_headroom).max(1.0) as u64;
            recommendations.push(Recommendation {
                pod_name: pod.clone(),
                namespace: namespace.clone(),
                kind: RecommendationType::RightsizingMemory,
                description: format!(
                    "Pod uses a mean of {} of its {} memory request ({:.0}%). \
                     Consider lowering the request to {}.",
                    format_bytes(mean_usage as u64),
                    format_bytes(request),
                    mean_usage / request as f64 * 100.0,
                    format_bytes(recommended)
                ),
                reason: format!(
                    "mean usage / request {:.2} below {:.2} over {} samples",
                    mean_usage / request as f64,
                    t.rightsizing_memory,
                    usage.len()
                ),
                priority: RecommendationPriority::Medium,
                target_node: None,
                cron_schedule: None,
                current_cpu_request_millicores: None,
                recommended_cpu_request_millicores: None,
                current_memory_request_bytes: Some(request),
                recommended_memory_request_bytes: Some(recommended),
                potential_savings_cost: None,
                potential_savings_co2e_grams: None,
            });
        }
        recommendations
    }

    /// Pods with spiky usage that a horizontal autoscaler would absorb
    pub(super) fn detect_autoscaling_candidates(
        &self,
        metrics: &[CombinedMetric],
    ) -> Vec<Recommendation> {
        let t = self.thresholds();
        let mut recommendations = Vec::new();

        for ((namespace, pod), group) in group_by_pod(metrics) {
            let usage: Vec<f64> = group
                .iter()
                .filter_map(|m| m.cpu_usage_millicores)
                .collect();
            if usage.len() < 3 {
                continue;
            }

            let mean_usage = mean(&usage);
            if mean_usage < f64::EPSILON {
                continue;
            }
            let cv = coefficient_of_variation(&usage);
            let spike_ratio = usage.iter().cloned().fold(f64::MIN, f64::max) / mean_usage;

            if cv > t.autoscaling_cv && spike_ratio > t.autoscaling_spike_ratio {
                recommendations.push(Recommendation {
                    pod_name: pod.clone(),
                    namespace: namespace.clone(),
                    kind: RecommendationType::AutoscalingCandidate,
                    description: format!(
                        "CPU usage spikes to {spike_ratio:.1}x its mean with high variability \
                         (CV {cv:.2}). A horizontal autoscaler would track this load better \
                         than a static request."
                    ),
                    reason: format!(
                        "CV {cv:.2} above {:.2} and max/mean {spike_ratio:.1} above {:.1}",
                        t.autoscaling_cv, t.autoscaling_spike_ratio
                    ),
                    priority: RecommendationPriority::Medium,
                    target_node: None,
                    cron_schedule: None,
                    current_cpu_request_millicores: None,
                    recommended_cpu_request_millicores: None,
                    current_memory_request_bytes: None,
                    recommended_memory_request_bytes: None,
                    potential_savings_cost: None,
                    potential_savings_co2e_grams: None,
                });
            }
        }
        recommendations
    }

    /// Pods with a long recurring idle window that could scale to zero
    /// on a schedule
    pub(super) fn detect_off_peak_windows(
        &self,
        metrics: &[CombinedMetric],
    ) -> Vec<Recommendation> {
        let t = self.thresholds();
        let mut recommendations = Vec::new();

        for ((namespace, pod), group) in group_by_pod(metrics) {
            let mut hourly: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
            for metric in &group {
                if let (Some(ts), Some(usage)) = (metric.timestamp, metric.cpu_usage_millicores)
                {
                    hourly.entry(ts.hour()).or_default().push(usage);
                }
            }
            if hourly.is_empty() {
                continue;
            }

            let hourly_mean: BTreeMap<u32, f64> =
                hourly.iter().map(|(h, v)| (*h, mean(v))).collect();
            let peak = hourly_mean.values().cloned().fold(0.0_f64, f64::max);
            if peak < f64::EPSILON {
                continue;
            }

            let idle_cutoff = peak * t.off_peak_idle_fraction;
            let idle: Vec<bool> = (0..24)
                .map(|h| hourly_mean.get(&h).map(|m| *m < idle_cutoff).unwrap_or(false))
                .collect();

            if let Some((start, len)) = longest_wrapping_run(&idle) {
                if len >= t.off_peak_min_idle_hours {
                    let end = (start + len) % 24;
                    recommendations.push(Recommendation {
                        pod_name: pod.clone(),
                        namespace: namespace.clone(),
                        kind: RecommendationType::OffPeakScaling,
                        description: format!(
                            "Pod is idle from {start:02}:00 to {end:02}:00 UTC every day \
                             ({len} consecutive hours below {:.0}% of peak usage). \
                             Consider scaling it down over that window.",
                            t.off_peak_idle_fraction * 100.0
                        ),
                        reason: format!(
                            "{len} consecutive idle hours, minimum is {}",
                            t.off_peak_min_idle_hours
                        ),
                        priority: RecommendationPriority::Medium,
                        target_node: None,
                        cron_schedule: Some(format!("0 {start} * * *")),
                        current_cpu_request_millicores: None,
                        recommended_cpu_request_millicores: None,
                        current_memory_request_bytes: None,
                        recommended_memory_request_bytes: None,
                        potential_savings_cost: None,
                        potential_savings_co2e_grams: None,
                    });
                }
            }
        }
        recommendations
    }

    /// Namespaces with aggregate cost but negligible aggregate energy
    pub(super) fn detect_idle_namespaces(
        &self,
        metrics: &[CombinedMetric],
    ) -> Vec<Recommendation> {
        let t = self.thresholds();
        let mut by_namespace: BTreeMap<&str, (f64, f64, f64)> = BTreeMap::new();
        for metric in metrics {
            let entry = by_namespace.entry(&metric.namespace).or_default();
            entry.0 += metric.joules;
            entry.1 += metric.total_cost;
            entry.2 += metric.co2e_grams;
        }

        by_namespace
            .into_iter()
            .filter(|(_, (joules, cost, _))| {
                *joules < t.idle_namespace_energy_joules && *cost > 0.0
            })
            .map(|(namespace, (joules, cost, co2e))| Recommendation {
                pod_name: WILDCARD_POD.to_string(),
                namespace: namespace.to_string(),
                kind: RecommendationType::IdleNamespace,
                description: format!(
                    "Namespace consumed only {joules:.0} J while costing {cost:.4}. \
                     It may be abandoned; consider archiving or deleting it."
                ),
                reason: format!(
                    "aggregate energy {joules:.0} J below {:.0} J with nonzero cost",
                    t.idle_namespace_energy_joules
                ),
                priority: RecommendationPriority::High,
                target_node: None,
                cron_schedule: None,
                current_cpu_request_millicores: None,
                recommended_cpu_request_millicores: None,
                current_memory_request_bytes: None,
                recommended_memory_request_bytes: None,
                potential_savings_cost: Some(cost),
                potential_savings_co2e_grams: Some(co2e),
            })
            .collect()
    }

    /// Pods that consistently run while their zone's grid is dirtier
    /// than average
    pub(super) fn detect_carbon_aware_candidates(
        &self,
        metrics: &[CombinedMetric],
    ) -> Vec<Recommendation> {
        let t = self.thresholds();

        // Mean observed intensity per zone, across every pod in it
        let mut zone_samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for metric in metrics {
            if let Some(intensity) = metric.grid_intensity {
                zone_samples.entry(&metric.emaps_zone).or_default().push(intensity);
            }
        }
        let zone_means: BTreeMap<&str, f64> = zone_samples
            .into_iter()
            .map(|(zone, samples)| (zone, mean(&samples)))
            .collect();

        let mut recommendations = Vec::new();
        for ((namespace, pod), group) in group_by_pod(metrics) {
            let samples: Vec<f64> =
                group.iter().filter_map(|m| m.grid_intensity).collect();
            if samples.is_empty() {
                continue;
            }
            let zone = &group[0].emaps_zone;
            let Some(zone_mean) = zone_means.get(zone.as_str()).copied() else {
                continue;
            };
            if zone_mean < f64::EPSILON {
                continue;
            }

            let pod_mean = mean(&samples);
            let ratio = pod_mean / zone_mean;
            if ratio <= t.carbon_aware_ratio {
                continue;
            }

            let total_co2e: f64 = group.iter().map(|m| m.co2e_grams).sum();
            let savings = total_co2e * (1.0 - 1.0 / ratio);
            recommendations.push(Recommendation {
                pod_name: pod.clone(),
                namespace: namespace.clone(),
                kind: RecommendationType::CarbonAwareScheduling,
                description: format!(
                    "Pod runs while grid intensity in {zone} averages {pod_mean:.0} g/kWh, \
                     {ratio:.1}x the zone mean of {zone_mean:.0} g/kWh. Shifting it to \
                     cleaner hours could avoid about {savings:.1} g CO2e."
                ),
                reason: format!(
                    "pod/zone intensity ratio {ratio:.2} above {:.2}",
                    t.carbon_aware_ratio
                ),
                priority: RecommendationPriority::Low,
                target_node: None,
                cron_schedule: None,
                current_cpu_request_millicores: None,
                recommended_cpu_request_millicores: None,
                current_memory_request_bytes: None,
                recommended_memory_request_bytes: None,
                potential_savings_cost: None,
                potential_savings_co2e_grams: Some(savings),
            });
        }
        recommendations
    }
}

/// Longest run of consecutive `true` values, allowing the run to wrap
/// past the end of the slice. Returns (start index, length), capped at
/// the slice length.
fn longest_wrapping_run(flags: &[bool]) -> Option<(u32, u32)> {
    let n = flags.len();
    if n == 0 || !flags.iter().any(|f| *f) {
        return None;
    }
    if flags.iter().all(|f| *f) {
        return Some((0, n as u32));
    }

    let mut best: Option<(usize, usize)> = None;
    let mut run_start = 0usize;
    let mut run_len = 0usize;
    // Scanning two laps covers every wrapping run once
    for i in 0..n * 2 {
        if flags[i % n] {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
        } else {
            if run_len > best.map_or(0, |(_, l)| l) {
                best = Some((run_start % n, run_len.min(n)));
            }
            run_len = 0;
        }
    }
    if run_len > best.map_or(0, |(_, l)| l) {
        best = Some((run_start % n, run_len.min(n)));
    }
    best.map(|(start, len)| (start as u32, len as u32))
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
