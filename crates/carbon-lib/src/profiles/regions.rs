//! Cloud region to grid-intensity zone mapping
//!
//! Grid-intensity data sources key zones by their own codes ("FR",
//! "US-NE-ISNE"), not by cloud region names, so cloud zones have to be
//! translated before any intensity lookup.

/// Region prefix -> Electricity Maps zone code
const CLOUD_REGION_TO_EMAPS_ZONE: &[(&str, &str)] = &[
    // GCP
    ("europe-west9", "FR"),
    ("europe-west1", "BE"),
    ("europe-north1", "FI"),
    ("europe-west2", "GB"),
    ("europe-west3", "DE"),
    ("us-central1", "US-MIDW-MISO"),
    ("us-east1", "US-SE-SOCO"),
    ("asia-southeast1", "SG"),
    // AWS
    ("eu-west-3", "FR"),
    ("eu-central-1", "DE"),
    ("eu-west-2", "GB"),
    ("us-east-1", "US-NE-ISNE"),
    ("us-west-2", "US-NW-PACW"),
    // Azure
    ("francecentral", "FR"),
    ("westeurope", "NL"),
    ("uksouth", "GB"),
    ("eastus", "US-NE-ISNE"),
];

/// Translate a cloud zone (e.g. "europe-west9-a") into a grid zone code
/// (e.g. "FR"). Returns `None` for unmapped regions; the caller decides
/// the fallback.
pub fn emaps_zone_for_cloud_zone(cloud_zone: &str) -> Option<&'static str> {
    let region = strip_zone_suffix(cloud_zone);
    CLOUD_REGION_TO_EMAPS_ZONE
        .iter()
        .find(|(prefix, _)| *prefix == region)
        .map(|(_, zone)| *zone)
}

/// "europe-west9-a" -> "europe-west9"; single-word zones like
/// "francecentral" pass through unchanged.
fn strip_zone_suffix(cloud_zone: &str) -> &str {
    let parts: Vec<&str> = cloud_zone.split('-').collect();
    if parts.len() > 2 {
        let last = parts[parts.len() - 1];
        if last.len() == 1 && last.chars().all(|c| c.is_ascii_alphabetic()) {
            return &cloud_zone[..cloud_zone.len() - 2];
        }
    }
    cloud_zone
}
