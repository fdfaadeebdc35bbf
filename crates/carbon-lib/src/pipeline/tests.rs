//! Pipeline integration tests with mocked collectors

use super::*;
use crate::carbon::{CarbonCalculator, JOULES_PER_KWH};
use crate::collectors::{
    CollectorSet, CostCollector, EmbodiedImpactCollector, NodeCollector, PodRequestCollector,
    UsageCollector,
};
use crate::config::EngineConfig;
use crate::models::*;
use crate::profiles::PowerProfileRegistry;
use crate::storage::{
    CarbonIntensityRepository, EmbodiedProfileRepository, InMemoryEmbodiedProfileRepository,
    InMemoryIntensityRepository, InMemoryNodeRepository, NodeRepository, RepositorySet,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- mock collectors -------------------------------------------------

#[derive(Default)]
struct MockNodeCollector {
    inventory: HashMap<String, NodeInfo>,
    instance_types: HashMap<String, String>,
    fail: bool,
}

#[async_trait]
impl NodeCollector for MockNodeCollector {
    async fn collect(&self) -> Result<HashMap<String, NodeInfo>> {
        if self.fail {
            return Err(anyhow!("node API down"));
        }
        Ok(self.inventory.clone())
    }

    async fn collect_instance_types(&self) -> Result<HashMap<String, String>> {
        Ok(self.instance_types.clone())
    }
}

#[derive(Default)]
struct MockUsageCollector {
    usage: ClusterUsage,
    range: RangeUsage,
    fail: bool,
}

#[async_trait]
impl UsageCollector for MockUsageCollector {
    async fn collect(&self) -> Result<ClusterUsage> {
        if self.fail {
            return Err(anyhow!("metrics backend down"));
        }
        Ok(self.usage.clone())
    }

    async fn collect_range(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _step: std::time::Duration,
    ) -> Result<RangeUsage> {
        if self.fail {
            return Err(anyhow!("metrics backend down"));
        }
        Ok(self.range.clone())
    }
}

#[derive(Default)]
struct MockCostCollector {
    costs: Vec<CostMetric>,
    fail: bool,
}

#[async_trait]
impl CostCollector for MockCostCollector {
    async fn collect(&self, _window: std::time::Duration) -> Result<Vec<CostMetric>> {
        if self.fail {
            return Err(anyhow!("cost API down"));
        }
        Ok(self.costs.clone())
    }
}

#[derive(Default)]
struct MockRequestCollector {
    requests: Vec<PodRequest>,
}

#[async_trait]
impl PodRequestCollector for MockRequestCollector {
    async fn collect(&self) -> Result<Vec<PodRequest>> {
        Ok(self.requests.clone())
    }
}

#[derive(Default)]
struct MockImpactCollector {
    gwp_manufacture_kg: Option<f64>,
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl EmbodiedImpactCollector for MockImpactCollector {
    async fn get_server_impact(
        &self,
        _provider: &str,
        _instance_type: &str,
    ) -> Result<Option<ServerImpact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("impact service unreachable"));
        }
        Ok(self.gwp_manufacture_kg.map(|kg| ServerImpact {
            gwp_manufacture_kg: Some(kg),
        }))
    }
}

/// Intensity repository wrapper that counts lookups
struct CountingIntensityRepo {
    inner: InMemoryIntensityRepository,
    lookups: AtomicUsize,
}

#[async_trait]
impl CarbonIntensityRepository for CountingIntensityRepo {
    async fn get_for_zone_at_time(
        &self,
        zone: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_for_zone_at_time(zone, timestamp).await
    }

    async fn write_combined_metrics(&self, metrics: &[CombinedMetric]) -> Result<()> {
        self.inner.write_combined_metrics(metrics).await
    }

    async fn read_combined_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CombinedMetric>> {
        self.inner.read_combined_metrics(start, end).await
    }
}

// --- test harness ----------------------------------------------------

fn aws_node(name: &str) -> NodeInfo {
    NodeInfo {
        name: name.to_string(),
        instance_type: Some("m5.large".to_string()),
        zone: Some("eu-west-3a".to_string()),
        region: Some("eu-west-3".to_string()),
        cloud_provider: "aws".to_string(),
        cpu_capacity_cores: Some(2.0),
        memory_capacity_bytes: Some(8 << 30),
    }
}

fn cpu_row(ns: &str, pod: &str, container: &str, node: &str, cores: f64) -> PodCpuUsage {
    PodCpuUsage {
        namespace: ns.to_string(),
        pod: pod.to_string(),
        container: container.to_string(),
        node: node.to_string(),
        cpu_usage_cores: cores,
    }
}

struct Harness {
    nodes: Arc<MockNodeCollector>,
    usage: Arc<MockUsageCollector>,
    costs: Arc<MockCostCollector>,
    requests: Arc<MockRequestCollector>,
    impact: Arc<MockImpactCollector>,
    intensity_repo: Arc<CountingIntensityRepo>,
    node_repo: Arc<InMemoryNodeRepository>,
    embodied_repo: Arc<InMemoryEmbodiedProfileRepository>,
    config: EngineConfig,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            nodes: Arc::new(MockNodeCollector::default()),
            usage: Arc::new(MockUsageCollector::default()),
            costs: Arc::new(MockCostCollector::default()),
            requests: Arc::new(MockRequestCollector::default()),
            impact: Arc::new(MockImpactCollector::default()),
            intensity_repo: Arc::new(CountingIntensityRepo {
                inner: InMemoryIntensityRepository::new(),
                lookups: AtomicUsize::new(0),
            }),
            node_repo: Arc::new(InMemoryNodeRepository::new()),
            embodied_repo: Arc::new(InMemoryEmbodiedProfileRepository::new()),
            config: EngineConfig::default(),
        }
    }
}

impl Harness {
    async fn seed_intensity(&self, zone: &str, timestamp: DateTime<Utc>, intensity: f64) {
        self.intensity_repo
            .inner
            .insert_history(&[GridIntensityRecord {
                zone: zone.to_string(),
                timestamp,
                intensity,
            }])
            .await;
    }

    fn processor(&self) -> Processor {
        let registry = Arc::new(PowerProfileRegistry::new(
            &self.config.default_instance_profile,
        ));
        let calculator = Arc::new(CarbonCalculator::new(
            self.intensity_repo.clone(),
            self.config.default_pue,
            self.config.normalization_granularity,
        ));
        Processor::new(
            self.config.clone(),
            CollectorSet {
                nodes: self.nodes.clone(),
                usage: self.usage.clone(),
                cost: self.costs.clone(),
                pod_requests: self.requests.clone(),
                embodied_impact: self.impact.clone(),
            },
            RepositorySet {
                intensity: self.intensity_repo.clone(),
                nodes: self.node_repo.clone(),
                embodied: self.embodied_repo.clone(),
            },
            registry,
            calculator,
        )
    }
}

// --- snapshot mode ---------------------------------------------------

#[tokio::test]
async fn test_run_combines_all_sources() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([("node-1".to_string(), aws_node("node-1"))]),
        ..Default::default()
    });
    harness.usage = Arc::new(MockUsageCollector {
        usage: ClusterUsage {
            pod_cpu_usage: vec![
                cpu_row("prod", "api-pod", "app", "node-1", 0.5),
                cpu_row("prod", "api-pod", "sidecar", "node-1", 0.2),
            ],
            pod_memory_usage: vec![PodMemoryUsage {
                namespace: "prod".to_string(),
                pod: "api-pod".to_string(),
                node: "node-1".to_string(),
                memory_usage_bytes: 100 << 20,
            }],
            pod_network_io: vec![PodNetworkIo {
                namespace: "prod".to_string(),
                pod: "api-pod".to_string(),
                node: "node-1".to_string(),
                network_receive_bytes: 1_024_000,
                network_transmit_bytes: 512_000,
            }],
            pod_disk_io: Vec::new(),
            pod_restart_counts: vec![PodRestartCount {
                namespace: "prod".to_string(),
                pod: "api-pod".to_string(),
                container: "app".to_string(),
                restart_count: 3,
            }],
            node_instance_types: vec![NodeInstanceType {
                node: "node-1".to_string(),
                instance_type: "m5.large".to_string(),
            }],
        },
        ..Default::default()
    });
    harness.costs = Arc::new(MockCostCollector {
        costs: vec![CostMetric {
            pod_name: "api-pod".to_string(),
            namespace: "prod".to_string(),
            cpu_cost: 0.10,
            ram_cost: 0.20,
            total_cost: 0.30,
        }],
        ..Default::default()
    });
    harness.requests = Arc::new(MockRequestCollector {
        requests: vec![PodRequest {
            pod_name: "api-pod".to_string(),
            namespace: "prod".to_string(),
            container_name: "app".to_string(),
            cpu_request_millicores: 500.0,
            memory_request_bytes: 256 << 20,
        }],
    });
    harness
        .embodied_repo
        .save_profile(
            "aws",
            "m5.large",
            &EmbodiedProfile {
                gwp_manufacture_kg: 1000.0,
                lifespan_hours: 35_040.0,
            },
        )
        .await
        .unwrap();
    harness
        .seed_intensity("FR", Utc::now() - Duration::hours(2), 100.0)
        .await;

    let metrics = harness.processor().run().await.unwrap();
    assert_eq!(metrics.len(), 1);

    let m = &metrics[0];
    assert_eq!(m.pod_name, "api-pod");
    assert_eq!(m.namespace, "prod");
    assert_eq!(m.emaps_zone, "FR"); // eu-west-3a -> eu-west-3 -> FR
    assert_eq!(m.node_instance_type.as_deref(), Some("m5.large"));

    // 0.7 cores of 2 vcores on m5.large: 3.23 + 0.35 * 33.07 W
    let expected_watts = 3.23 + 0.35 * (36.30 - 3.23);
    let expected_joules = expected_watts * 300.0;
    assert!((m.joules - expected_joules).abs() < 1e-6);

    // AWS PUE profile (1.15), intensity 100
    let expected_co2e = expected_joules / JOULES_PER_KWH * 1.15 * 100.0;
    assert!((m.co2e_grams - expected_co2e).abs() < 1e-9);
    assert_eq!(m.pue, 1.15);
    assert_eq!(m.grid_intensity, Some(100.0));

    assert_eq!(m.total_cost, 0.30);
    assert_eq!(m.cpu_request_millicores, 500.0);
    assert_eq!(m.memory_request_bytes, 256 << 20);
    assert!((m.cpu_usage_millicores.unwrap() - 700.0).abs() < 1e-9);
    assert_eq!(m.memory_usage_bytes, Some(100 << 20));
    assert_eq!(m.network_receive_bytes, Some(1_024_000));
    assert_eq!(m.network_transmit_bytes, Some(512_000));
    assert_eq!(m.restart_count, Some(3));

    // Embodied: (1_000_000 g / 35040 h) * (300 s / 3600) * (0.5 / 2)
    let expected_embodied = (1000.0 * 1000.0 / 35_040.0) * (300.0 / 3600.0) * 0.25;
    assert!((m.embodied_co2e_grams - expected_embodied).abs() < 1e-9);

    // Nothing was missing, so nothing is marked estimated
    assert!(!m.is_estimated, "unexpected reasons: {:?}", m.estimation_reasons);
    assert!(m.estimation_reasons.is_empty());
}

#[tokio::test]
async fn test_run_records_every_fallback_reason() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([(
            "node-1".to_string(),
            NodeInfo {
                name: "node-1".to_string(),
                instance_type: Some("unknown-type".to_string()),
                zone: Some("unknown-zone".to_string()),
                region: Some("unknown-region".to_string()),
                cloud_provider: "unknown-provider".to_string(),
                cpu_capacity_cores: Some(2.0),
                memory_capacity_bytes: Some(1024),
            },
        )]),
        ..Default::default()
    });
    harness.usage = Arc::new(MockUsageCollector {
        usage: ClusterUsage {
            pod_cpu_usage: vec![cpu_row("ns", "pod-1", "c1", "node-1", 0.1)],
            node_instance_types: vec![NodeInstanceType {
                node: "node-1".to_string(),
                instance_type: "unknown-type".to_string(),
            }],
            ..Default::default()
        },
        ..Default::default()
    });
    // No cost data, no embodied data, no intensity history

    let metrics = harness.processor().run().await.unwrap();
    assert_eq!(metrics.len(), 1);

    let m = &metrics[0];
    assert!(m.is_estimated);
    let reasons = m.estimation_reasons.join(" | ");
    assert!(reasons.contains("Unknown instance type"), "{reasons}");
    assert!(reasons.contains("Could not map zone"), "{reasons}");
    assert!(reasons.contains("No cost data"), "{reasons}");
    assert!(reasons.contains("No PUE profile"), "{reasons}");
    assert!(reasons.contains("No grid intensity"), "{reasons}");
    assert!(reasons.contains("No embodied emissions profile"), "{reasons}");

    // Default zone, PUE and intensity all applied
    assert_eq!(m.emaps_zone, "FR");
    assert_eq!(m.pue, 1.5);
    assert_eq!(m.grid_intensity, Some(0.1));
    let expected = m.joules / JOULES_PER_KWH * 1.5 * 0.1;
    assert!((m.co2e_grams - expected).abs() < 1e-12);
    assert_eq!(m.total_cost, 0.0);
    assert_eq!(m.embodied_co2e_grams, 0.0);
}

#[tokio::test]
async fn test_run_survives_collector_failures() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        fail: true,
        ..Default::default()
    });
    harness.usage = Arc::new(MockUsageCollector {
        fail: true,
        ..Default::default()
    });
    harness.costs = Arc::new(MockCostCollector {
        fail: true,
        ..Default::default()
    });

    // Everything down: the run degrades to an empty result, not an error
    let metrics = harness.processor().run().await.unwrap();
    assert!(metrics.is_empty());
}

#[tokio::test]
async fn test_run_uses_default_cost_when_cost_collector_down() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([("node-1".to_string(), aws_node("node-1"))]),
        ..Default::default()
    });
    harness.usage = Arc::new(MockUsageCollector {
        usage: ClusterUsage {
            pod_cpu_usage: vec![cpu_row("ns", "pod-1", "c1", "node-1", 0.5)],
            node_instance_types: vec![NodeInstanceType {
                node: "node-1".to_string(),
                instance_type: "m5.large".to_string(),
            }],
            ..Default::default()
        },
        ..Default::default()
    });
    harness.costs = Arc::new(MockCostCollector {
        fail: true,
        ..Default::default()
    });

    let metrics = harness.processor().run().await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].total_cost, 0.0);
    assert!(metrics[0]
        .estimation_reasons
        .iter()
        .any(|r| r.contains("No cost data")));
}

#[tokio::test]
async fn test_low_usage_substitution_attributes_by_requests() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([("node-1".to_string(), aws_node("node-1"))]),
        ..Default::default()
    });
    // Both pods report essentially zero usage while requesting 500m and
    // 1500m: energy must split 1:3, not collapse onto one pod
    harness.usage = Arc::new(MockUsageCollector {
        usage: ClusterUsage {
            pod_cpu_usage: vec![
                cpu_row("ns", "small-pod", "c", "node-1", 0.00001),
                cpu_row("ns", "large-pod", "c", "node-1", 0.00001),
            ],
            node_instance_types: vec![NodeInstanceType {
                node: "node-1".to_string(),
                instance_type: "m5.large".to_string(),
            }],
            ..Default::default()
        },
        ..Default::default()
    });
    harness.requests = Arc::new(MockRequestCollector {
        requests: vec![
            PodRequest {
                pod_name: "small-pod".to_string(),
                namespace: "ns".to_string(),
                container_name: "c".to_string(),
                cpu_request_millicores: 500.0,
                memory_request_bytes: 0,
            },
            PodRequest {
                pod_name: "large-pod".to_string(),
                namespace: "ns".to_string(),
                container_name: "c".to_string(),
                cpu_request_millicores: 1500.0,
                memory_request_bytes: 0,
            },
        ],
    });

    let metrics = harness.processor().run().await.unwrap();
    assert_eq!(metrics.len(), 2);

    let small = metrics.iter().find(|m| m.pod_name == "small-pod").unwrap();
    let large = metrics.iter().find(|m| m.pod_name == "large-pod").unwrap();
    assert!((large.joules / small.joules - 3.0).abs() < 1e-6);
    assert!(small
        .estimation_reasons
        .iter()
        .any(|r| r.contains("near-zero CPU usage")));
}

#[tokio::test]
async fn test_run_prefetch_collapses_intensity_lookups() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([("node-1".to_string(), aws_node("node-1"))]),
        ..Default::default()
    });
    // Twenty pods on one node: one zone, one time bucket
    let rows: Vec<PodCpuUsage> = (0..20)
        .map(|i| cpu_row("ns", &format!("pod-{i}"), "c", "node-1", 0.05))
        .collect();
    harness.usage = Arc::new(MockUsageCollector {
        usage: ClusterUsage {
            pod_cpu_usage: rows,
            node_instance_types: vec![NodeInstanceType {
                node: "node-1".to_string(),
                instance_type: "m5.large".to_string(),
            }],
            ..Default::default()
        },
        ..Default::default()
    });
    harness
        .seed_intensity("FR", Utc::now() - Duration::hours(2), 80.0)
        .await;

    let metrics = harness.processor().run().await.unwrap();
    assert_eq!(metrics.len(), 20);
    assert_eq!(
        harness.intensity_repo.lookups.load(Ordering::SeqCst),
        1,
        "expected one repository lookup for one (zone, hour) key"
    );
}

#[tokio::test]
async fn test_run_persists_node_snapshots() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([("node-1".to_string(), aws_node("node-1"))]),
        ..Default::default()
    });

    harness.processor().run().await.unwrap();

    let snapshots = harness
        .node_repo
        .get_latest_snapshots_before(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].node.name, "node-1");
}

#[tokio::test]
async fn test_embodied_profile_cached_after_service_lookup() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([("node-1".to_string(), aws_node("node-1"))]),
        ..Default::default()
    });
    harness.usage = Arc::new(MockUsageCollector {
        usage: ClusterUsage {
            pod_cpu_usage: vec![cpu_row("ns", "pod-1", "c", "node-1", 0.5)],
            node_instance_types: vec![NodeInstanceType {
                node: "node-1".to_string(),
                instance_type: "m5.large".to_string(),
            }],
            ..Default::default()
        },
        ..Default::default()
    });
    harness.impact = Arc::new(MockImpactCollector {
        gwp_manufacture_kg: Some(1000.0),
        ..Default::default()
    });

    let metrics = harness.processor().run().await.unwrap();
    assert!(metrics[0].embodied_co2e_grams > 0.0);
    assert_eq!(harness.impact.calls.load(Ordering::SeqCst), 1);

    // Second run hits the repository cache, not the service
    harness.processor().run().await.unwrap();
    assert_eq!(harness.impact.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_embodied_service_failure_degrades_to_zero() {
    let mut harness = Harness::default();
    harness.nodes = Arc::new(MockNodeCollector {
        inventory: HashMap::from([("node-1".to_string(), aws_node("node-1"))]),
        ..Default::default()
    });
    harness.usage = Arc::new(MockUsageCollector {
        usage: ClusterUsage {
            pod_cpu_usage: vec![cpu_row("ns", "pod-1", "c", "node-1", 0.5)],
            node_instance_types: vec![NodeInstanceType {
                node: "node-1".to_string(),
                instance_type: "m5.large".to_string(),
            }],
            ..Default::default()
        },
        ..Default::default()
    });
    harness.impact = Arc::new(MockImpactCollector {
        fail: true,
        ..Default::default()
    });

    let metrics = harness.processor().run().await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].embodied_co2e_grams, 0.0);
    assert!(metrics[0]
        .estimation_reasons
        .iter()
        .any(|r| r.contains("No embodied emissions profile")));
}

// --- range mode ------------------------------------------------------

fn range_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

async fn range_harness() -> Harness {
    let mut harness = Harness::default();
    let start = range_start();

    harness.node_repo = Arc::new(InMemoryNodeRepository::new());
    harness
        .node_repo
        .save_snapshots(&[NodeSnapshot {
            timestamp: start - Duration::days(30),
            node: aws_node("node-1"),
        }])
        .await
        .unwrap();

    harness.nodes = Arc::new(MockNodeCollector {
        instance_types: HashMap::from([("node-1".to_string(), "m5.xlarge".to_string())]),
        ..Default::default()
    });
    harness.usage = Arc::new(MockUsageCollector {
        range: RangeUsage {
            pod_cpu: vec![RangeSeries {
                namespace: "prod".to_string(),
                pod: "api-pod".to_string(),
                node: "node-1".to_string(),
                // Jittered samples in buckets 0 and 1
                points: vec![
                    (start + Duration::seconds(17), 0.5),
                    (start + Duration::seconds(317), 0.5),
                ],
            }],
            pod_memory: Vec::new(),
        },
        ..Default::default()
    });
    harness
        .seed_intensity("FR", start - Duration::hours(1), 120.0)
        .await;
    harness
}

#[tokio::test]
async fn test_run_range_replays_buckets_from_snapshots() {
    let harness = range_harness().await;
    let start = range_start();

    let metrics = harness
        .processor()
        .run_range(start, start + Duration::minutes(10), None, None)
        .await
        .unwrap();

    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].timestamp, Some(start));
    assert_eq!(metrics[1].timestamp, Some(start + Duration::seconds(300)));

    // Zone and provider come from the old snapshot; the instance label
    // comes from the live collector
    for m in &metrics {
        assert_eq!(m.emaps_zone, "FR");
        assert_eq!(m.pue, 1.15);
        assert_eq!(m.node_instance_type.as_deref(), Some("m5.xlarge"));
        assert_eq!(m.grid_intensity, Some(120.0));
        assert_eq!(m.duration_seconds, 300.0);
    }
}

#[tokio::test]
async fn test_run_range_filters_namespace() {
    let harness = range_harness().await;
    let start = range_start();

    let metrics = harness
        .processor()
        .run_range(start, start + Duration::minutes(10), Some("other"), None)
        .await
        .unwrap();
    assert!(metrics.is_empty());

    let metrics = harness
        .processor()
        .run_range(start, start + Duration::minutes(10), Some("prod"), None)
        .await
        .unwrap();
    assert_eq!(metrics.len(), 2);
}

#[tokio::test]
async fn test_run_range_aggregates_hourly() {
    let harness = range_harness().await;
    let start = range_start();

    let metrics = harness
        .processor()
        .run_range(
            start,
            start + Duration::minutes(10),
            None,
            Some(Aggregation::Hourly),
        )
        .await
        .unwrap();

    assert_eq!(metrics.len(), 1);
    let m = &metrics[0];
    assert_eq!(m.period.as_deref(), Some("2026-02-01T00:00"));
    assert!(m.timestamp.is_none());
    assert_eq!(m.duration_seconds, 600.0);
}

#[tokio::test]
async fn test_run_range_rejects_inverted_window() {
    let harness = Harness::default();
    let start = range_start();
    assert!(harness
        .processor()
        .run_range(start, start, None, None)
        .await
        .is_err());
}
