use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ProviderError;
use crate::models::dispatch::{OrderContext, ProviderAdapterResult};
use crate::models::option::{DeliveryOption, LOCAL_DELIVERY_ID, PICKUP_ID};
use crate::observability::metrics::Metrics;
use crate::pickup::PickupTokenService;
use crate::providers::{find_adapter, SharedAdapter};

pub const UNKNOWN_PROVIDER: &str = "unknown provider";

#[derive(Clone, Copy)]
enum Route<'a> {
    Pickup,
    Local,
    Courier(&'a SharedAdapter),
}

impl Route<'_> {
    fn label(&self) -> &str {
        match self {
            Route::Pickup => PICKUP_ID,
            Route::Local => LOCAL_DELIVERY_ID,
            Route::Courier(adapter) => adapter.id(),
        }
    }
}

fn validate_order(order: &OrderContext) -> Result<(), &'static str> {
    if order.order_id <= 0 {
        return Err("orderId must be > 0");
    }
    if order.total_amount < Decimal::ZERO {
        return Err("totalAmount must be >= 0");
    }
    Ok(())
}

/// Turns a selected option into a concrete pickup code or tracked delivery.
///
/// Every branch reports failure through the returned result; nothing here
/// panics or propagates an error to the caller.
pub struct DeliveryOrderDispatcher {
    tokens: PickupTokenService,
    adapters: Vec<SharedAdapter>,
    local_estimate: String,
    timeout: Duration,
    metrics: Metrics,
}

impl DeliveryOrderDispatcher {
    pub fn new(
        tokens: PickupTokenService,
        adapters: Vec<SharedAdapter>,
        local_estimate: String,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            tokens,
            adapters,
            local_estimate,
            timeout,
            metrics,
        }
    }

    pub async fn dispatch(&self, provider_id: &str, order: &OrderContext) -> ProviderAdapterResult {
        let route = match provider_id {
            PICKUP_ID => Route::Pickup,
            LOCAL_DELIVERY_ID => Route::Local,
            _ => match find_adapter(&self.adapters, provider_id) {
                Some(adapter) => Route::Courier(adapter),
                None => {
                    warn!(provider = provider_id, order_id = order.order_id, "dispatch to unknown provider");
                    self.metrics.record_dispatch("unknown", false);
                    return ProviderAdapterResult::failed(UNKNOWN_PROVIDER);
                }
            },
        };

        let result = match validate_order(order) {
            Err(reason) => ProviderAdapterResult::failed(reason),
            Ok(()) => match route {
                Route::Pickup => self.dispatch_pickup(order),
                Route::Local => self.dispatch_local(order),
                Route::Courier(adapter) => self.dispatch_courier(adapter, order).await,
            },
        };

        self.metrics.record_dispatch(route.label(), result.success);
        result
    }

    fn dispatch_pickup(&self, order: &OrderContext) -> ProviderAdapterResult {
        match self.tokens.issue_qr(order.order_id, order.total_amount) {
            Ok((token, image)) => {
                info!(order_id = order.order_id, issued_at = token.issued_at, "pickup code issued");
                let mut result = ProviderAdapterResult::dispatched(
                    format!("PICKUP-{}", order.order_id),
                    DeliveryOption::pickup().estimated_time,
                );
                result.qr_code = Some(image);
                result
            }
            Err(err) => {
                warn!(order_id = order.order_id, error = %err, "failed to issue pickup code");
                ProviderAdapterResult::failed(err.to_string())
            }
        }
    }

    fn dispatch_local(&self, order: &OrderContext) -> ProviderAdapterResult {
        let id = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        let tracking_id = format!("LOCAL-{}", &id[..10]);
        info!(order_id = order.order_id, tracking_id = %tracking_id, "local delivery scheduled");
        ProviderAdapterResult::dispatched(tracking_id, self.local_estimate.clone())
    }

    async fn dispatch_courier(&self, adapter: &SharedAdapter, order: &OrderContext) -> ProviderAdapterResult {
        let provider = adapter.id();
        let start = Instant::now();
        let outcome = timeout(self.timeout, adapter.create_delivery(order)).await;
        self.metrics
            .provider_call_seconds
            .with_label_values(&[provider])
            .observe(start.elapsed().as_secs_f64());

        let outcome = match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(ProviderError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(handle) => ProviderAdapterResult::dispatched(handle.tracking_id, handle.estimated_delivery),
            Err(err) => {
                warn!(provider, order_id = order.order_id, error = %err, "courier dispatch failed");
                ProviderAdapterResult::failed(err.to_string())
            }
        }
    }
}
