//! CO2e calculation from energy and grid intensity

use super::IntensityCache;
use crate::config::NormalizationGranularity;
use crate::models::CarbonCalculationResult;
use crate::storage::CarbonIntensityRepository;
use anyhow::Result;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::sync::Arc;

/// Joules in one kilowatt-hour
pub const JOULES_PER_KWH: f64 = 3.6e6;

/// grams CO2e = kWh * PUE * intensity (gCO2e/kWh)
pub fn co2e_grams(joules: f64, pue: f64, grid_intensity: f64) -> f64 {
    joules / JOULES_PER_KWH * pue * grid_intensity
}

/// Truncate a timestamp to the configured cache-key granularity
pub fn normalize_timestamp(
    timestamp: DateTime<Utc>,
    granularity: NormalizationGranularity,
) -> Result<DateTime<Utc>> {
    let normalized = match granularity {
        NormalizationGranularity::Hour => timestamp.duration_trunc(Duration::hours(1))?,
        NormalizationGranularity::Day => timestamp.duration_trunc(Duration::days(1))?,
        NormalizationGranularity::None => timestamp,
    };
    Ok(normalized)
}

/// Calculates CO2e emissions from energy consumption and grid intensity.
///
/// Intensity lookups go through a per-run single-flight cache keyed by
/// (zone, normalized timestamp); `clear_cache` resets it between runs.
pub struct CarbonCalculator {
    repository: Arc<dyn CarbonIntensityRepository>,
    cache: IntensityCache,
    pue: f64,
    granularity: NormalizationGranularity,
}

impl CarbonCalculator {
    pub fn new(
        repository: Arc<dyn CarbonIntensityRepository>,
        pue: f64,
        granularity: NormalizationGranularity,
    ) -> Self {
        Self {
            repository,
            cache: IntensityCache::new(),
            pue,
            granularity,
        }
    }

    /// Default PUE this calculator was configured with
    pub fn pue(&self) -> f64 {
        self.pue
    }

    /// Calculate emissions for `joules` consumed in `zone` at
    /// `timestamp`, using the configured default PUE.
    pub async fn calculate_emissions(
        &self,
        joules: f64,
        zone: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<CarbonCalculationResult> {
        self.calculate_emissions_with_pue(joules, zone, timestamp, self.pue)
            .await
    }

    /// Like [`calculate_emissions`](Self::calculate_emissions) with a
    /// per-call PUE, used when the caller resolved a provider-specific
    /// value.
    ///
    /// When no intensity is known for the zone the result carries
    /// `grid_intensity: None` and zero grams; the caller decides whether
    /// to fall back to a configured default.
    pub async fn calculate_emissions_with_pue(
        &self,
        joules: f64,
        zone: &str,
        timestamp: DateTime<Utc>,
        pue: f64,
    ) -> Result<CarbonCalculationResult> {
        let normalized = normalize_timestamp(timestamp, self.granularity)?;
        let repository = self.repository.clone();
        let zone_key = zone.to_string();
        let intensity = self
            .cache
            .get_or_fetch(zone, normalized, || async move {
                repository.get_for_zone_at_time(&zone_key, normalized).await
            })
            .await;

        Ok(match intensity {
            Some(intensity) => CarbonCalculationResult {
                co2e_grams: co2e_grams(joules, pue, intensity),
                grid_intensity: Some(intensity),
                grid_intensity_timestamp: Some(normalized),
            },
            None => CarbonCalculationResult {
                co2e_grams: 0.0,
                grid_intensity: None,
                grid_intensity_timestamp: None,
            },
        })
    }

    /// Warm the cache for one (zone, timestamp) key without consuming
    /// the result
    pub async fn prefetch(&self, zone: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let normalized = normalize_timestamp(timestamp, self.granularity)?;
        let repository = self.repository.clone();
        let zone_key = zone.to_string();
        self.cache
            .get_or_fetch(zone, normalized, || async move {
                repository.get_for_zone_at_time(&zone_key, normalized).await
            })
            .await;
        Ok(())
    }

    /// Amortized manufacturing emissions for one time slice.
    ///
    /// Spreads the one-time manufacturing footprint over the instance's
    /// operational lifetime and attributes it to a pod by its share of
    /// the instance's vcores. Non-positive lifespans yield zero.
    pub fn calculate_embodied_emissions(
        &self,
        gwp_manufacture_kg: f64,
        lifespan_hours: f64,
        slice_duration_secs: f64,
        vcore_share: f64,
    ) -> f64 {
        if lifespan_hours <= 0.0 {
            return 0.0;
        }
        (gwp_manufacture_kg * 1000.0 / lifespan_hours) * (slice_duration_secs / 3600.0)
            * vcore_share
    }

    /// Drop every cached intensity entry; intended once per run
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}
