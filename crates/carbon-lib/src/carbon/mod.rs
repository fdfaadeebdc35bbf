//! Carbon emission calculation
//!
//! Converts pod energy (Joules) into CO2-equivalent grams using grid
//! intensity data behind a per-run, single-flight cache, and amortizes
//! embodied (manufacturing) emissions over instance lifetime.

mod calculator;
mod intensity_cache;

pub use calculator::{co2e_grams, normalize_timestamp, CarbonCalculator, JOULES_PER_KWH};
pub use intensity_cache::IntensityCache;
