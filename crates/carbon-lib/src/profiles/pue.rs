//! Per-provider power usage effectiveness profiles
//!
//! Published fleet-wide PUE figures; regional overrides may land here
//! later once providers break them out per datacenter.

/// Cloud provider -> fleet-wide PUE
const DATACENTER_PUE_PROFILES: &[(&str, f64)] = &[
    ("aws", 1.15),
    ("gcp", 1.09),
    ("azure", 1.18),
    ("ovh", 1.26),
];

/// PUE for a cloud provider, `None` when the provider has no profile
pub fn pue_for_provider(provider: &str) -> Option<f64> {
    let provider = provider.to_ascii_lowercase();
    DATACENTER_PUE_PROFILES
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, pue)| *pue)
}
