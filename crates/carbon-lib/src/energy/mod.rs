//! Energy estimation from CPU utilization and power profiles

mod estimator;

pub use estimator::{EnergyEstimator, NodeUsageMap, PodUsageMap};
