//! Power profiles for cloud instances
//!
//! Maps instance types to idle/full-load wattage. Every lookup resolves
//! to some profile: unknown types fall back to the configured default
//! (or a core-count-scaled variant of it) and are flagged as estimated
//! so downstream consumers can tell measured from inferred energy.

mod instances;
mod pue;
mod regions;

pub use pue::pue_for_provider;
pub use regions::emaps_zone_for_cloud_zone;

use crate::config::DefaultInstanceProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label suffix used by the processor when it can only infer a node's
/// core count from inventory capacity.
pub const INFERRED_CORES_SUFFIX: &str = " inferred cores";

/// Idle and full-load power draw for one instance type. Wattages are
/// totals for the whole instance, not per core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerProfile {
    pub vcores: u32,
    pub min_watts: f64,
    pub max_watts: f64,
}

/// A resolved profile plus whether a fallback fired
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub profile: PowerProfile,
    pub estimated: bool,
    pub reason: Option<String>,
}

/// Static instance-type -> power profile table, loaded once at startup
pub struct PowerProfileRegistry {
    profiles: HashMap<&'static str, PowerProfile>,
    default_profile: PowerProfile,
}

impl PowerProfileRegistry {
    pub fn new(default_profile: &DefaultInstanceProfile) -> Self {
        Self {
            profiles: instances::builtin_profiles().collect(),
            default_profile: PowerProfile {
                vcores: default_profile.vcores,
                min_watts: default_profile.min_watts,
                max_watts: default_profile.max_watts,
            },
        }
    }

    /// Resolve an instance type to a power profile. Never fails: unknown
    /// types resolve to the default (scaled by core count when the label
    /// encodes one) with `estimated` set.
    pub fn resolve(&self, instance_type: &str) -> ResolvedProfile {
        if let Some(profile) = self.profiles.get(instance_type) {
            return ResolvedProfile {
                profile: *profile,
                estimated: false,
                reason: None,
            };
        }

        if let Some(cores) = parse_inferred_cores(instance_type) {
            return ResolvedProfile {
                profile: self.scaled_default(cores),
                estimated: true,
                reason: Some(format!(
                    "No power profile for '{instance_type}'; scaled default profile to {cores} cores"
                )),
            };
        }

        ResolvedProfile {
            profile: self.default_profile,
            estimated: true,
            reason: Some(format!(
                "Unknown instance type '{instance_type}'; used default power profile"
            )),
        }
    }

    /// Profile applied to nodes with no instance-type signal at all
    pub fn default_profile(&self) -> PowerProfile {
        self.default_profile
    }

    /// Scale the default profile's per-core wattage to `cores`
    fn scaled_default(&self, cores: u32) -> PowerProfile {
        let per_core = self.default_profile.vcores.max(1) as f64;
        PowerProfile {
            vcores: cores,
            min_watts: self.default_profile.min_watts / per_core * cores as f64,
            max_watts: self.default_profile.max_watts / per_core * cores as f64,
        }
    }
}

/// Parse labels of the form "4 inferred cores"
fn parse_inferred_cores(label: &str) -> Option<u32> {
    let count = label.strip_suffix(INFERRED_CORES_SUFFIX)?;
    count.trim().parse::<u32>().ok().filter(|n| *n > 0)
}
