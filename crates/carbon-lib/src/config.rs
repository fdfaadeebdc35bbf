//! Engine configuration
//!
//! All knobs have defaults so the engine can start from an empty
//! environment. Invalid values are the one failure class that is raised
//! loudly instead of being defaulted away.

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;

/// Granularity used to normalize timestamps before they become
/// intensity cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationGranularity {
    Hour,
    Day,
    None,
}

/// Default power profile applied to nodes whose instance type is not in
/// the built-in table.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultInstanceProfile {
    #[serde(default = "default_instance_vcores")]
    pub vcores: u32,
    #[serde(default = "default_instance_min_watts")]
    pub min_watts: f64,
    #[serde(default = "default_instance_max_watts")]
    pub max_watts: f64,
}

impl Default for DefaultInstanceProfile {
    fn default() -> Self {
        Self {
            vcores: default_instance_vcores(),
            min_watts: default_instance_min_watts(),
            max_watts: default_instance_max_watts(),
        }
    }
}

/// Thresholds driving the recommendation analyzers
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationThresholds {
    /// Minimum total cost for a pod to qualify as a zombie
    #[serde(default = "default_zombie_cost")]
    pub zombie_cost: f64,
    /// Maximum total joules for a pod to qualify as a zombie
    #[serde(default = "default_zombie_energy")]
    pub zombie_energy_joules: f64,
    /// Mean usage / request ratio below which CPU is oversized
    #[serde(default = "default_rightsizing_ratio")]
    pub rightsizing_cpu: f64,
    /// Mean usage / request ratio below which memory is oversized
    #[serde(default = "default_rightsizing_ratio")]
    pub rightsizing_memory: f64,
    /// Headroom multiplier applied to P95 usage when recommending a
    /// new request
    #[serde(default = "default_rightsizing_headroom")]
    pub rightsizing_headroom: f64,
    /// Coefficient of variation above which usage counts as spiky
    #[serde(default = "default_autoscaling_cv")]
    pub autoscaling_cv: f64,
    /// max/mean usage ratio above which usage counts as spiky
    #[serde(default = "default_autoscaling_spike_ratio")]
    pub autoscaling_spike_ratio: f64,
    /// Fraction of the peak hourly mean below which an hour is idle
    #[serde(default = "default_off_peak_idle_fraction")]
    pub off_peak_idle_fraction: f64,
    /// Minimum consecutive idle hours for an off-peak recommendation
    #[serde(default = "default_off_peak_min_idle_hours")]
    pub off_peak_min_idle_hours: u32,
    /// Maximum aggregate joules for a namespace to count as idle
    #[serde(default = "default_idle_namespace_energy")]
    pub idle_namespace_energy_joules: f64,
    /// Pod-to-zone mean intensity ratio above which a workload should
    /// move to a cleaner window
    #[serde(default = "default_carbon_aware_ratio")]
    pub carbon_aware_ratio: f64,
    /// Mean node CPU / capacity ratio below which a node is
    /// overprovisioned
    #[serde(default = "default_node_utilization")]
    pub node_utilization: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            zombie_cost: default_zombie_cost(),
            zombie_energy_joules: default_zombie_energy(),
            rightsizing_cpu: default_rightsizing_ratio(),
            rightsizing_memory: default_rightsizing_ratio(),
            rightsizing_headroom: default_rightsizing_headroom(),
            autoscaling_cv: default_autoscaling_cv(),
            autoscaling_spike_ratio: default_autoscaling_spike_ratio(),
            off_peak_idle_fraction: default_off_peak_idle_fraction(),
            off_peak_min_idle_hours: default_off_peak_min_idle_hours(),
            idle_namespace_energy_joules: default_idle_namespace_energy(),
            carbon_aware_ratio: default_carbon_aware_ratio(),
            node_utilization: default_node_utilization(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Power usage effectiveness applied when the provider has no
    /// specific profile
    #[serde(default = "default_pue")]
    pub default_pue: f64,

    /// Grid zone used when a node's cloud zone cannot be mapped
    #[serde(default = "default_zone")]
    pub default_zone: String,

    /// Intensity (gCO2e/kWh) used when no data exists for a zone
    #[serde(default = "default_grid_intensity")]
    pub default_grid_intensity: f64,

    /// Cost attributed to pods with no cost-allocation record
    #[serde(default)]
    pub default_cost: f64,

    /// Timestamp granularity for intensity cache keys
    #[serde(default = "default_granularity")]
    pub normalization_granularity: NormalizationGranularity,

    /// Duration of one collection slice in seconds
    #[serde(default = "default_query_step")]
    pub query_step_secs: u64,

    /// Below this total node CPU (millicores), declared requests are
    /// substituted for usage to protect against broken metrics agents
    #[serde(default = "default_low_usage_threshold")]
    pub low_usage_substitution_threshold_millicores: f64,

    /// Instance lifespan assumed when the embodied profile omits one
    #[serde(default = "default_lifespan_hours")]
    pub default_lifespan_hours: f64,

    #[serde(default)]
    pub default_instance_profile: DefaultInstanceProfile,

    #[serde(default)]
    pub recommendation: RecommendationThresholds,
}

fn default_pue() -> f64 {
    1.5
}

fn default_zone() -> String {
    "FR".to_string()
}

fn default_grid_intensity() -> f64 {
    0.1
}

fn default_granularity() -> NormalizationGranularity {
    NormalizationGranularity::Hour
}

fn default_query_step() -> u64 {
    300
}

fn default_low_usage_threshold() -> f64 {
    50.0
}

fn default_lifespan_hours() -> f64 {
    // 4 years of continuous operation
    35_040.0
}

fn default_instance_vcores() -> u32 {
    2
}

fn default_instance_min_watts() -> f64 {
    2.0
}

fn default_instance_max_watts() -> f64 {
    12.0
}

fn default_zombie_cost() -> f64 {
    0.01
}

fn default_zombie_energy() -> f64 {
    1000.0
}

fn default_rightsizing_ratio() -> f64 {
    0.2
}

fn default_rightsizing_headroom() -> f64 {
    1.2
}

fn default_autoscaling_cv() -> f64 {
    0.5
}

fn default_autoscaling_spike_ratio() -> f64 {
    2.0
}

fn default_off_peak_idle_fraction() -> f64 {
    0.1
}

fn default_off_peak_min_idle_hours() -> u32 {
    4
}

fn default_idle_namespace_energy() -> f64 {
    1000.0
}

fn default_carbon_aware_ratio() -> f64 {
    1.5
}

fn default_node_utilization() -> f64 {
    0.2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_pue: default_pue(),
            default_zone: default_zone(),
            default_grid_intensity: default_grid_intensity(),
            default_cost: 0.0,
            normalization_granularity: default_granularity(),
            query_step_secs: default_query_step(),
            low_usage_substitution_threshold_millicores: default_low_usage_threshold(),
            default_lifespan_hours: default_lifespan_hours(),
            default_instance_profile: DefaultInstanceProfile::default(),
            recommendation: RecommendationThresholds::default(),
        }
    }
}

/// Configuration errors that cannot be safely defaulted
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("default instance profile must have at least one vcore")]
    ZeroVcoreProfile,
    #[error("default instance profile has min watts {min} above max watts {max}")]
    InvertedWattRange { min: f64, max: f64 },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("query step must be at least 1 second")]
    ZeroQueryStep,
}

impl EngineConfig {
    /// Load configuration from the environment (`CARBON_*` variables),
    /// falling back to defaults for anything unset.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("CARBON").separator("__"))
            .build()?;

        let cfg: EngineConfig = settings
            .try_deserialize()
            .unwrap_or_else(|_| EngineConfig::default());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_instance_profile.vcores == 0 {
            return Err(ConfigError::ZeroVcoreProfile);
        }
        if self.default_instance_profile.min_watts > self.default_instance_profile.max_watts {
            return Err(ConfigError::InvertedWattRange {
                min: self.default_instance_profile.min_watts,
                max: self.default_instance_profile.max_watts,
            });
        }
        if self.query_step_secs == 0 {
            return Err(ConfigError::ZeroQueryStep);
        }
        for (name, value) in [
            ("default_pue", self.default_pue),
            ("rightsizing_headroom", self.recommendation.rightsizing_headroom),
            ("carbon_aware_ratio", self.recommendation.carbon_aware_ratio),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }
}
