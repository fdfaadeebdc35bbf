//! Built-in power profiles for common cloud instance types
//!
//! Idle and full-load wattage estimates come from the Cloud Carbon
//! Footprint project's published coefficients for AWS, GCP and Azure.

use super::PowerProfile;

/// (instance type, vcores, min watts, max watts)
pub(super) const INSTANCE_PROFILES: &[(&str, u32, f64, f64)] = &[
    // AWS
    ("m5.large", 2, 3.23, 36.30),
    ("m5.xlarge", 4, 5.82, 66.27),
    ("t3.medium", 2, 2.03, 23.41),
    ("t3.large", 2, 2.03, 23.41),
    ("t3.xlarge", 4, 3.42, 40.48),
    // GCP
    ("n1-standard-1", 1, 1.42, 13.56),
    ("n1-standard-2", 2, 2.22, 22.31),
    ("e2-standard-2", 2, 1.34, 11.23),
    ("e2-standard-4", 4, 2.36, 19.94),
    // Azure
    ("Standard_D2s_v3", 2, 2.22, 22.31),
    ("Standard_D4s_v3", 4, 3.82, 39.81),
];

pub(super) fn builtin_profiles() -> impl Iterator<Item = (&'static str, PowerProfile)> {
    INSTANCE_PROFILES
        .iter()
        .map(|&(name, vcores, min_watts, max_watts)| {
            (
                name,
                PowerProfile {
                    vcores,
                    min_watts,
                    max_watts,
                },
            )
        })
}
