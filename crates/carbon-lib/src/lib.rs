//! Carbon estimation engine for Kubernetes workloads
//!
//! This crate provides the core functionality for:
//! - Power profile resolution for cloud instance types
//! - Per-pod energy estimation from CPU telemetry
//! - CO2e calculation with cached grid-intensity lookups
//! - Pipeline orchestration into combined energy/cost/carbon metrics
//! - Optimization recommendations mined from metric history

pub mod carbon;
pub mod collectors;
pub mod config;
pub mod energy;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod profiles;
pub mod recommend;
pub mod service;
pub mod storage;

pub use carbon::CarbonCalculator;
pub use config::{EngineConfig, NormalizationGranularity};
pub use models::*;
pub use observability::EngineMetrics;
pub use pipeline::{aggregate_metrics, Aggregation, Processor};
pub use recommend::Recommender;
pub use service::EngineServices;
