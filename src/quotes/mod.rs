use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::availability::ProviderAvailabilityResolver;
use crate::config::QuoteOrdering;
use crate::models::geo::GeoPoint;
use crate::models::option::{DeliveryOption, DeliveryQuoteRequest};

/// Assembles the delivery options offered for one destination.
pub struct DeliveryQuoteAggregator {
    resolver: Arc<ProviderAvailabilityResolver>,
    ordering: QuoteOrdering,
}

impl DeliveryQuoteAggregator {
    pub fn new(resolver: Arc<ProviderAvailabilityResolver>, ordering: QuoteOrdering) -> Self {
        Self { resolver, ordering }
    }

    pub async fn quote(&self, request: &DeliveryQuoteRequest) -> Vec<DeliveryOption> {
        self.get_options_to(&request.zip_code, &request.farm_location, request.delivery_location)
            .await
    }

    pub async fn get_options(&self, postal_code: &str, farm_location: &GeoPoint) -> Vec<DeliveryOption> {
        self.get_options_to(postal_code, farm_location, None).await
    }

    /// Pickup is always first and always available. Local delivery and the
    /// couriers follow only when serviceable; courier checks run concurrently.
    pub async fn get_options_to(
        &self,
        postal_code: &str,
        farm_location: &GeoPoint,
        destination: Option<GeoPoint>,
    ) -> Vec<DeliveryOption> {
        let courier_checks = self
            .resolver
            .adapters()
            .iter()
            .map(|adapter| async move {
                let available = self.resolver.is_serviceable(adapter.id(), postal_code).await;
                (adapter, available)
            });
        let courier_results = join_all(courier_checks).await;

        let mut options = vec![DeliveryOption::pickup()];

        if self
            .resolver
            .is_local_delivery_serviceable(postal_code, farm_location, destination)
        {
            options.push(self.resolver.local_policy().to_option());
        }

        options.extend(
            courier_results
                .into_iter()
                .filter(|(_, available)| *available)
                .map(|(adapter, _)| adapter.profile().to_option()),
        );

        if self.ordering == QuoteOrdering::Fee {
            // Stable sort keeps registry order between equal fees.
            options[1..].sort_by(|a, b| a.fee.cmp(&b.fee));
        }

        info!(
            postal_code,
            offered = options.len(),
            "delivery options computed"
        );
        options
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::*;
    use crate::availability::locator::ZipPrefixLocator;
    use crate::availability::LocalDeliveryPolicy;
    use crate::models::option::{DeliveryKind, PICKUP_ID};
    use crate::observability::metrics::Metrics;
    use crate::providers::registry::ProviderRegistry;
    use crate::providers::stub::{Behavior, StubAdapter};
    use crate::providers::SharedAdapter;

    const SAN_FRANCISCO: GeoPoint = GeoPoint {
        lat: 37.7749,
        lng: -122.4194,
    };

    fn aggregator(adapters: Vec<SharedAdapter>, ordering: QuoteOrdering) -> DeliveryQuoteAggregator {
        let registry = ProviderRegistry::default();
        let resolver = ProviderAvailabilityResolver::new(
            adapters,
            LocalDeliveryPolicy::new(&registry.local_delivery, 15.0, Decimal::new(899, 2)),
            Arc::new(ZipPrefixLocator::default()),
            Duration::from_millis(50),
            Metrics::new(),
        );
        DeliveryQuoteAggregator::new(Arc::new(resolver), ordering)
    }

    fn ids(options: &[DeliveryOption]) -> Vec<&str> {
        options.iter().map(|o| o.id.as_str()).collect()
    }

    #[tokio::test]
    async fn san_francisco_gets_every_option() {
        let agg = aggregator(ProviderRegistry::default().build_adapters(), QuoteOrdering::Registry);
        let options = agg.get_options("94102", &SAN_FRANCISCO).await;

        assert_eq!(ids(&options), vec!["pickup", "local_delivery", "doordash", "uber_direct", "roadie"]);
        assert!(options.iter().all(|o| o.is_available));

        let fees: Vec<Decimal> = options.iter().map(|o| o.fee).collect();
        assert_eq!(
            fees,
            vec![
                Decimal::ZERO,
                Decimal::new(899, 2),
                Decimal::new(399, 2),
                Decimal::new(499, 2),
                Decimal::new(599, 2),
            ]
        );
        assert_eq!(options[0].kind, DeliveryKind::Pickup);
        assert_eq!(options[1].kind, DeliveryKind::LocalDelivery);
        assert_eq!(options[2].kind, DeliveryKind::ThirdParty);
    }

    #[tokio::test]
    async fn uncovered_zip_gets_pickup_only() {
        let agg = aggregator(ProviderRegistry::default().build_adapters(), QuoteOrdering::Registry);
        let options = agg.get_options("10001", &SAN_FRANCISCO).await;
        assert_eq!(ids(&options), vec!["pickup"]);
    }

    #[tokio::test]
    async fn far_destination_drops_local_delivery_but_keeps_couriers() {
        let agg = aggregator(ProviderRegistry::default().build_adapters(), QuoteOrdering::Registry);
        let options = agg.get_options("90012", &SAN_FRANCISCO).await;
        assert_eq!(ids(&options), vec!["pickup", "doordash", "uber_direct", "roadie"]);
    }

    #[tokio::test]
    async fn every_provider_failing_still_yields_pickup() {
        let agg = aggregator(
            vec![
                Arc::new(StubAdapter::new("a", 100, Behavior::Fails)),
                Arc::new(StubAdapter::new("b", 100, Behavior::Hangs)),
                Arc::new(StubAdapter::new("c", 100, Behavior::Fails)),
            ],
            QuoteOrdering::Registry,
        );
        let options = agg.get_options("", &SAN_FRANCISCO).await;

        assert_eq!(ids(&options), vec![PICKUP_ID]);
        assert!(options[0].is_available);
        assert_eq!(options[0].fee, Decimal::ZERO);
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_hide_the_others() {
        let agg = aggregator(
            vec![
                Arc::new(StubAdapter::new("first", 300, Behavior::Serves(true))),
                Arc::new(StubAdapter::new("broken", 100, Behavior::Fails)),
                Arc::new(StubAdapter::new("last", 200, Behavior::Serves(true))),
            ],
            QuoteOrdering::Registry,
        );
        let options = agg.get_options("10001", &SAN_FRANCISCO).await;
        assert_eq!(ids(&options), vec!["pickup", "first", "last"]);
    }

    #[tokio::test]
    async fn repeated_quotes_keep_the_same_order() {
        let agg = aggregator(ProviderRegistry::default().build_adapters(), QuoteOrdering::Registry);
        let first = agg.get_options("94110", &SAN_FRANCISCO).await;
        for _ in 0..5 {
            assert_eq!(agg.get_options("94110", &SAN_FRANCISCO).await, first);
        }
    }

    #[tokio::test]
    async fn fee_ordering_keeps_pickup_first() {
        let agg = aggregator(
            vec![
                Arc::new(StubAdapter::new("pricey", 1500, Behavior::Serves(true))),
                Arc::new(StubAdapter::new("cheap", 199, Behavior::Serves(true))),
                Arc::new(StubAdapter::new("also_cheap", 199, Behavior::Serves(true))),
            ],
            QuoteOrdering::Fee,
        );
        let options = agg.get_options("94102", &SAN_FRANCISCO).await;
        assert_eq!(
            ids(&options),
            vec!["pickup", "cheap", "also_cheap", "local_delivery", "pricey"]
        );
    }

    #[tokio::test]
    async fn explicit_destination_overrides_postal_lookup() {
        let agg = aggregator(Vec::new(), QuoteOrdering::Registry);
        let request = DeliveryQuoteRequest {
            zip_code: "94801".to_string(),
            farm_location: SAN_FRANCISCO,
            delivery_location: Some(GeoPoint::new(37.9358, -122.3478)),
        };
        let options = agg.quote(&request).await;
        assert_eq!(ids(&options), vec!["pickup", "local_delivery"]);
    }
}
