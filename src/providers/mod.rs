pub mod couriers;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::ProviderError;
use crate::models::dispatch::OrderContext;
use crate::providers::registry::ProviderProfile;

/// Tracking handle returned by a courier once a delivery has been created.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryHandle {
    pub tracking_id: String,
    pub estimated_delivery: String,
}

/// Capability every third-party courier integration implements.
///
/// Adapters hold no mutable state, so one failing adapter never affects calls
/// to another and the same adapter can serve concurrent requests.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn profile(&self) -> &ProviderProfile;

    fn id(&self) -> &str {
        &self.profile().id
    }

    async fn check_availability(&self, postal_code: &str) -> Result<bool, ProviderError>;

    async fn create_delivery(&self, order: &OrderContext) -> Result<DeliveryHandle, ProviderError>;
}

pub type SharedAdapter = Arc<dyn ProviderAdapter>;

pub fn find_adapter<'a>(adapters: &'a [SharedAdapter], provider_id: &str) -> Option<&'a SharedAdapter> {
    adapters.iter().find(|adapter| adapter.id() == provider_id)
}

/// Trims a postal code and reduces ZIP+4 to the five digit form.
/// Returns `None` when nothing usable is left.
pub fn normalize_postal_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let base = trimmed.split('-').next().unwrap_or(trimmed).trim();
    if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(base.chars().take(5).collect::<String>().to_ascii_uppercase())
}

pub fn matches_coverage(coverage: &[String], postal_code: &str) -> bool {
    match normalize_postal_code(postal_code) {
        Some(code) => coverage.iter().any(|prefix| code.starts_with(prefix.as_str())),
        None => false,
    }
}

pub(crate) fn estimated_arrival(minutes: u32) -> String {
    (Utc::now() + Duration::minutes(i64::from(minutes))).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(prefixes: &[&str]) -> Vec<String> {
        prefixes.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn normalizes_zip_plus_four() {
        assert_eq!(normalize_postal_code(" 94102-1234 "), Some("94102".to_string()));
        assert_eq!(normalize_postal_code("94102"), Some("94102".to_string()));
    }

    #[test]
    fn rejects_blank_or_garbage_postal_codes() {
        assert_eq!(normalize_postal_code(""), None);
        assert_eq!(normalize_postal_code("   "), None);
        assert_eq!(normalize_postal_code("94 102"), None);
        assert_eq!(normalize_postal_code("<script>"), None);
    }

    #[test]
    fn coverage_is_prefix_based() {
        let rules = coverage(&["94", "95"]);
        assert!(matches_coverage(&rules, "94102"));
        assert!(matches_coverage(&rules, "95014"));
        assert!(!matches_coverage(&rules, "10001"));
        assert!(!matches_coverage(&rules, ""));
    }
}
