//! Aggregation of combined metrics into time periods
//!
//! Groups rows by (namespace, pod, period). Energy, carbon and cost are
//! summed; grid intensity and PUE are duration-weighted averages;
//! resource requests keep the maximum observed value. Aggregated rows
//! carry a period label instead of a timestamp.

use crate::models::CombinedMetric;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Aggregation window for historical reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Aggregation {
    fn period_label(&self, metric: &CombinedMetric) -> Option<String> {
        let ts = metric.timestamp?;
        let label = match self {
            Aggregation::Hourly => ts.format("%Y-%m-%dT%H:00").to_string(),
            Aggregation::Daily => ts.format("%Y-%m-%d").to_string(),
            Aggregation::Weekly => ts.format("%Y-W%V").to_string(),
            Aggregation::Monthly => ts.format("%Y-%m").to_string(),
            Aggregation::Yearly => ts.format("%Y").to_string(),
        };
        Some(label)
    }
}

/// Aggregate metrics into one row per (namespace, pod, period).
/// Rows without a timestamp keep their existing period (or fall into a
/// single unlabelled group).
pub fn aggregate_metrics(
    metrics: Vec<CombinedMetric>,
    aggregation: Aggregation,
) -> Vec<CombinedMetric> {
    let mut groups: BTreeMap<(String, String, String), Vec<CombinedMetric>> = BTreeMap::new();
    for metric in metrics {
        let period = aggregation
            .period_label(&metric)
            .or_else(|| metric.period.clone())
            .unwrap_or_default();
        groups
            .entry((metric.namespace.clone(), metric.pod_name.clone(), period))
            .or_default()
            .push(metric);
    }

    groups
        .into_iter()
        .map(|((namespace, pod_name, period), items)| merge_group(namespace, pod_name, period, items))
        .collect()
}

fn merge_group(
    namespace: String,
    pod_name: String,
    period: String,
    items: Vec<CombinedMetric>,
) -> CombinedMetric {
    let total_duration: f64 = items.iter().map(|m| m.duration_seconds).sum();

    let weighted = |value: fn(&CombinedMetric) -> Option<f64>| -> Option<f64> {
        let covered: Vec<(f64, f64)> = items
            .iter()
            .filter_map(|m| value(m).map(|v| (v, m.duration_seconds)))
            .collect();
        if covered.is_empty() {
            return None;
        }
        let weight: f64 = covered.iter().map(|(_, d)| d).sum();
        if weight > 0.0 {
            Some(covered.iter().map(|(v, d)| v * d).sum::<f64>() / weight)
        } else {
            Some(covered.iter().map(|(v, _)| v).sum::<f64>() / covered.len() as f64)
        }
    };

    let grid_intensity = weighted(|m| m.grid_intensity);
    let cpu_usage = weighted(|m| m.cpu_usage_millicores);
    let memory_usage = weighted(|m| m.memory_usage_bytes.map(|b| b as f64));
    let pue = weighted(|m| Some(m.pue)).unwrap_or(1.0);

    let mut reasons: Vec<String> = Vec::new();
    for metric in &items {
        for reason in &metric.estimation_reasons {
            if !reasons.contains(reason) {
                reasons.push(reason.clone());
            }
        }
    }

    let first = &items[0];
    CombinedMetric {
        pod_name,
        namespace,
        timestamp: None,
        period: Some(period),
        joules: items.iter().map(|m| m.joules).sum(),
        co2e_grams: items.iter().map(|m| m.co2e_grams).sum(),
        embodied_co2e_grams: items.iter().map(|m| m.embodied_co2e_grams).sum(),
        total_cost: items.iter().map(|m| m.total_cost).sum(),
        cpu_request_millicores: items
            .iter()
            .map(|m| m.cpu_request_millicores)
            .fold(0.0, f64::max),
        memory_request_bytes: items.iter().map(|m| m.memory_request_bytes).max().unwrap_or(0),
        cpu_usage_millicores: cpu_usage,
        memory_usage_bytes: memory_usage.map(|b| b as u64),
        network_receive_bytes: sum_optional(&items, |m| m.network_receive_bytes),
        network_transmit_bytes: sum_optional(&items, |m| m.network_transmit_bytes),
        disk_read_bytes: sum_optional(&items, |m| m.disk_read_bytes),
        disk_write_bytes: sum_optional(&items, |m| m.disk_write_bytes),
        restart_count: items.iter().filter_map(|m| m.restart_count).max(),
        grid_intensity,
        pue,
        emaps_zone: first.emaps_zone.clone(),
        node: first.node.clone(),
        node_instance_type: first.node_instance_type.clone(),
        duration_seconds: total_duration,
        is_estimated: items.iter().any(|m| m.is_estimated),
        estimation_reasons: reasons,
    }
}

fn sum_optional(items: &[CombinedMetric], value: fn(&CombinedMetric) -> Option<u64>) -> Option<u64> {
    let covered: Vec<u64> = items.iter().filter_map(value).collect();
    if covered.is_empty() {
        None
    } else {
        Some(covered.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn metric(pod: &str, hour: u32, minute: u32, joules: f64) -> CombinedMetric {
        CombinedMetric {
            pod_name: pod.to_string(),
            namespace: "default".to_string(),
            timestamp: Some(Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()),
            period: None,
            joules,
            co2e_grams: joules / 1000.0,
            embodied_co2e_grams: 0.5,
            total_cost: 0.01,
            cpu_request_millicores: 500.0,
            memory_request_bytes: 256 << 20,
            cpu_usage_millicores: Some(100.0),
            memory_usage_bytes: Some(128 << 20),
            network_receive_bytes: Some(1000),
            network_transmit_bytes: None,
            disk_read_bytes: None,
            disk_write_bytes: None,
            restart_count: Some(1),
            grid_intensity: Some(100.0),
            pue: 1.5,
            emaps_zone: "FR".to_string(),
            node: "node-1".to_string(),
            node_instance_type: Some("m5.large".to_string()),
            duration_seconds: 300.0,
            is_estimated: false,
            estimation_reasons: Vec::new(),
        }
    }

    #[test]
    fn test_hourly_grouping_sums_energy() {
        let metrics = vec![
            metric("p1", 10, 0, 1000.0),
            metric("p1", 10, 30, 2000.0),
            metric("p1", 11, 0, 4000.0),
        ];
        let aggregated = aggregate_metrics(metrics, Aggregation::Hourly);
        assert_eq!(aggregated.len(), 2);

        let first_hour = aggregated
            .iter()
            .find(|m| m.period.as_deref() == Some("2026-03-01T10:00"))
            .unwrap();
        assert_eq!(first_hour.joules, 3000.0);
        assert_eq!(first_hour.total_cost, 0.02);
        assert_eq!(first_hour.duration_seconds, 600.0);
        assert_eq!(first_hour.network_receive_bytes, Some(2000));
        // Aggregated rows drop the raw timestamp
        assert!(first_hour.timestamp.is_none());
    }

    #[test]
    fn test_daily_grouping_separates_pods() {
        let metrics = vec![metric("p1", 10, 0, 1000.0), metric("p2", 10, 0, 2000.0)];
        let aggregated = aggregate_metrics(metrics, Aggregation::Daily);
        assert_eq!(aggregated.len(), 2);
        assert!(aggregated
            .iter()
            .all(|m| m.period.as_deref() == Some("2026-03-01")));
    }

    #[test]
    fn test_weighted_intensity_average() {
        let mut short = metric("p1", 10, 0, 1000.0);
        short.grid_intensity = Some(100.0);
        short.duration_seconds = 300.0;
        let mut long = metric("p1", 10, 30, 1000.0);
        long.grid_intensity = Some(200.0);
        long.duration_seconds = 900.0;

        let aggregated = aggregate_metrics(vec![short, long], Aggregation::Hourly);
        assert_eq!(aggregated.len(), 1);
        // (100 * 300 + 200 * 900) / 1200 = 175
        assert!((aggregated[0].grid_intensity.unwrap() - 175.0).abs() < 1e-9);
    }

    #[test]
    fn test_requests_keep_max() {
        let mut small = metric("p1", 10, 0, 1000.0);
        small.cpu_request_millicores = 250.0;
        let mut large = metric("p1", 10, 30, 1000.0);
        large.cpu_request_millicores = 750.0;

        let aggregated = aggregate_metrics(vec![small, large], Aggregation::Hourly);
        assert_eq!(aggregated[0].cpu_request_millicores, 750.0);
    }

    #[test]
    fn test_reasons_deduplicated_and_flag_propagates() {
        let mut a = metric("p1", 10, 0, 1000.0);
        a.is_estimated = true;
        a.estimation_reasons = vec!["No cost data".to_string()];
        let mut b = metric("p1", 10, 15, 1000.0);
        b.is_estimated = true;
        b.estimation_reasons = vec!["No cost data".to_string()];

        let aggregated = aggregate_metrics(vec![a, b], Aggregation::Hourly);
        assert!(aggregated[0].is_estimated);
        assert_eq!(aggregated[0].estimation_reasons.len(), 1);
    }

    #[test]
    fn test_weekly_label_uses_iso_week() {
        let m = metric("p1", 10, 0, 1000.0);
        let aggregated = aggregate_metrics(vec![m], Aggregation::Weekly);
        assert_eq!(aggregated[0].period.as_deref(), Some("2026-W09"));
    }

    #[test]
    fn test_timestamps_spanning_hours_do_not_merge() {
        let metrics: Vec<CombinedMetric> = (0..4)
            .map(|i| {
                let mut m = metric("p1", 10, 0, 1000.0);
                m.timestamp = Some(
                    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
                        + Duration::minutes(i * 30),
                );
                m
            })
            .collect();
        let aggregated = aggregate_metrics(metrics, Aggregation::Hourly);
        assert_eq!(aggregated.len(), 2);
    }
}
