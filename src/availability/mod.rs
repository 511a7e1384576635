pub mod locator;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::availability::locator::PostalLocator;
use crate::geo::haversine_miles;
use crate::models::geo::GeoPoint;
use crate::models::option::{DeliveryKind, DeliveryOption, LOCAL_DELIVERY_ID, PICKUP_ID};
use crate::observability::metrics::Metrics;
use crate::providers::registry::LocalDeliveryProfile;
use crate::providers::{find_adapter, matches_coverage, SharedAdapter};

/// Flat-rate delivery by the farm itself inside a fixed radius.
/// The fee does not depend on the actual distance.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDeliveryPolicy {
    pub radius_miles: f64,
    pub fee: Decimal,
    pub estimated_time: String,
    pub description: String,
    pub coverage: Vec<String>,
}

impl LocalDeliveryPolicy {
    pub fn new(profile: &LocalDeliveryProfile, radius_miles: f64, fee: Decimal) -> Self {
        Self {
            radius_miles,
            fee,
            estimated_time: profile.estimated_time.clone(),
            description: profile.description.clone(),
            coverage: profile.coverage.clone(),
        }
    }

    pub fn to_option(&self) -> DeliveryOption {
        DeliveryOption {
            id: LOCAL_DELIVERY_ID.to_string(),
            name: "Local Delivery".to_string(),
            kind: DeliveryKind::LocalDelivery,
            estimated_time: self.estimated_time.clone(),
            fee: self.fee,
            description: format!("{} within {} miles", self.description, self.radius_miles),
            is_available: true,
        }
    }
}

/// Decides which providers can serve a destination.
///
/// Courier checks go through the adapter and are bounded by `timeout`; an
/// error or timeout counts as "not serviceable" and is never surfaced.
pub struct ProviderAvailabilityResolver {
    adapters: Vec<SharedAdapter>,
    local: LocalDeliveryPolicy,
    locator: Arc<dyn PostalLocator>,
    timeout: Duration,
    metrics: Metrics,
}

impl ProviderAvailabilityResolver {
    pub fn new(
        adapters: Vec<SharedAdapter>,
        local: LocalDeliveryPolicy,
        locator: Arc<dyn PostalLocator>,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            adapters,
            local,
            locator,
            timeout,
            metrics,
        }
    }

    pub fn adapters(&self) -> &[SharedAdapter] {
        &self.adapters
    }

    pub fn local_policy(&self) -> &LocalDeliveryPolicy {
        &self.local
    }

    /// Coverage check by provider id. Unknown providers are not serviceable.
    ///
    /// For local delivery this only evaluates postal coverage; the radius gate
    /// needs the farm location and lives in [`Self::is_local_delivery_serviceable`].
    pub async fn is_serviceable(&self, provider_id: &str, postal_code: &str) -> bool {
        match provider_id {
            PICKUP_ID => true,
            LOCAL_DELIVERY_ID => matches_coverage(&self.local.coverage, postal_code),
            _ => match find_adapter(&self.adapters, provider_id) {
                Some(adapter) => self.check_adapter(adapter, postal_code).await,
                None => {
                    debug!(provider = provider_id, "availability requested for unknown provider");
                    false
                }
            },
        }
    }

    pub fn is_local_delivery_serviceable(
        &self,
        postal_code: &str,
        farm: &GeoPoint,
        destination: Option<GeoPoint>,
    ) -> bool {
        if !matches_coverage(&self.local.coverage, postal_code) {
            return false;
        }

        let Some(destination) = destination.or_else(|| self.locator.locate(postal_code)) else {
            debug!(postal_code, "cannot locate destination; local delivery unavailable");
            return false;
        };

        let distance = haversine_miles(farm, &destination);
        let in_range = distance <= self.local.radius_miles;
        if !in_range {
            debug!(postal_code, distance, radius = self.local.radius_miles, "outside local delivery radius");
        }
        in_range
    }

    async fn check_adapter(&self, adapter: &SharedAdapter, postal_code: &str) -> bool {
        let provider = adapter.id();
        let start = Instant::now();
        let result = timeout(self.timeout, adapter.check_availability(postal_code)).await;
        self.metrics
            .provider_call_seconds
            .with_label_values(&[provider])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(Ok(available)) => {
                let outcome = if available { "available" } else { "unavailable" };
                self.metrics.record_check(provider, outcome);
                available
            }
            Ok(Err(err)) => {
                warn!(provider, error = %err, "availability check failed");
                self.metrics.record_check(provider, "error");
                false
            }
            Err(_elapsed) => {
                warn!(
                    provider,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "availability check timed out"
                );
                self.metrics.record_check(provider, "timeout");
                false
            }
        }
    }
}
