use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::warn;

use crate::availability::locator::{PostalLocator, ZipPrefixLocator};
use crate::availability::{LocalDeliveryPolicy, ProviderAvailabilityResolver};
use crate::config::Config;
use crate::dispatch::DeliveryOrderDispatcher;
use crate::models::dispatch::DispatchEvent;
use crate::observability::metrics::Metrics;
use crate::pickup::PickupTokenService;
use crate::providers::registry::ProviderRegistry;
use crate::providers::SharedAdapter;
use crate::quotes::DeliveryQuoteAggregator;

pub struct AppState {
    pub tokens: PickupTokenService,
    pub resolver: Arc<ProviderAvailabilityResolver>,
    pub quotes: DeliveryQuoteAggregator,
    pub dispatcher: DeliveryOrderDispatcher,
    pub registry: ProviderRegistry,
    /// Redeemed pickups, consulted only when single-use pickups are enabled.
    pub redemptions: DashMap<i64, DateTime<Utc>>,
    pub single_use_pickup: bool,
    pub dispatch_events_tx: broadcast::Sender<DispatchEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config, registry: ProviderRegistry) -> Self {
        let adapters = registry.build_adapters();
        Self::with_adapters(config, registry, adapters, Arc::new(ZipPrefixLocator::default()))
    }

    pub fn with_adapters(
        config: &Config,
        registry: ProviderRegistry,
        adapters: Vec<SharedAdapter>,
        locator: Arc<dyn PostalLocator>,
    ) -> Self {
        let metrics = Metrics::new();
        let provider_timeout = Duration::from_millis(config.provider_timeout_ms);
        let tokens = PickupTokenService::new(
            config.pickup_secret.clone(),
            config.pickup_token_ttl,
        );

        let local = LocalDeliveryPolicy::new(
            &registry.local_delivery,
            config.local_delivery_radius_miles,
            config.local_delivery_fee,
        );
        let local_estimate = local.estimated_time.clone();

        let resolver = Arc::new(ProviderAvailabilityResolver::new(
            adapters.clone(),
            local,
            locator,
            provider_timeout,
            metrics.clone(),
        ));
        let quotes = DeliveryQuoteAggregator::new(resolver.clone(), config.quote_ordering);
        let dispatcher = DeliveryOrderDispatcher::new(
            tokens.clone(),
            adapters,
            local_estimate,
            provider_timeout,
            metrics.clone(),
        );
        let (dispatch_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));

        Self {
            tokens,
            resolver,
            quotes,
            dispatcher,
            registry,
            redemptions: DashMap::new(),
            single_use_pickup: config.pickup_single_use,
            dispatch_events_tx,
            metrics,
        }
    }

    /// Records a single-use redemption. Returns `false` when the order was
    /// already redeemed inside the token lifetime.
    pub fn redeem_pickup(&self, order_id: i64, now: DateTime<Utc>) -> bool {
        // Sweep before taking the entry guard; retain locks every shard.
        self.prune_redemptions(now);

        match self.redemptions.entry(order_id) {
            Entry::Occupied(redeemed) => {
                warn!(order_id, redeemed_at = %redeemed.get(), "pickup code presented again");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Drops redemptions older than the token lifetime; an expired code
    /// already fails verification, so its entry is dead weight.
    pub fn prune_redemptions(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.tokens.ttl();
        let before = self.redemptions.len();
        self.redemptions.retain(|_, redeemed_at| now - *redeemed_at <= ttl);
        before - self.redemptions.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn state() -> AppState {
        let config = Config::from_lookup(|key: &str| match key {
            "PICKUP_QR_SECRET" => Some("state-secret".to_string()),
            "PICKUP_SINGLE_USE" => Some("true".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(&config, ProviderRegistry::default())
    }

    #[test]
    fn second_redemption_inside_lifetime_is_refused() {
        let state = state();
        let now = Utc::now();
        assert!(state.redeem_pickup(42, now));
        assert!(!state.redeem_pickup(42, now + TimeDelta::hours(1)));
        assert!(state.redeem_pickup(43, now));
    }

    #[test]
    fn expired_redemptions_are_swept() {
        let state = state();
        let now = Utc::now();
        state.redemptions.insert(1, now - TimeDelta::hours(25));
        state.redemptions.insert(2, now - TimeDelta::hours(1));

        assert_eq!(state.prune_redemptions(now), 1);
        assert!(!state.redemptions.contains_key(&1));
        assert!(state.redemptions.contains_key(&2));
    }

    #[test]
    fn redeeming_sweeps_stale_entries() {
        let state = state();
        let now = Utc::now();
        state.redemptions.insert(7, now - TimeDelta::hours(48));

        assert!(state.redeem_pickup(8, now));
        assert_eq!(state.redemptions.len(), 1);
        assert!(state.redemptions.contains_key(&8));
    }
}
