//! Explicit service wiring
//!
//! Builds every engine component exactly once from a validated
//! configuration and the injected collector/repository implementations.
//! This is the composition root front ends call instead of reaching for
//! globals or memoized factories.

use crate::carbon::CarbonCalculator;
use crate::collectors::CollectorSet;
use crate::config::{ConfigError, EngineConfig};
use crate::pipeline::Processor;
use crate::profiles::PowerProfileRegistry;
use crate::recommend::Recommender;
use crate::storage::RepositorySet;
use std::sync::Arc;

/// The engine's long-lived services, constructed once at process start
pub struct EngineServices {
    pub config: EngineConfig,
    pub registry: Arc<PowerProfileRegistry>,
    pub calculator: Arc<CarbonCalculator>,
    pub processor: Arc<Processor>,
    pub recommender: Arc<Recommender>,
}

impl EngineServices {
    /// Validate the configuration and wire up the engine. Configuration
    /// errors are the only failure mode.
    pub fn new(
        config: EngineConfig,
        collectors: CollectorSet,
        repositories: RepositorySet,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(PowerProfileRegistry::new(&config.default_instance_profile));
        let calculator = Arc::new(CarbonCalculator::new(
            repositories.intensity.clone(),
            config.default_pue,
            config.normalization_granularity,
        ));
        let processor = Arc::new(Processor::new(
            config.clone(),
            collectors,
            repositories,
            registry.clone(),
            calculator.clone(),
        ));
        let recommender = Arc::new(Recommender::new(config.recommendation.clone()));

        Ok(Self {
            config,
            registry,
            calculator,
            processor,
            recommender,
        })
    }
}
