use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::models::dispatch::{DispatchEvent, OrderContext, ProviderAdapterResult};
use crate::models::option::{DeliveryOption, DeliveryQuoteRequest};
use crate::providers::registry::ProviderRegistry;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery/options", post(delivery_options))
        .route("/delivery/dispatch", post(dispatch_delivery))
        .route("/providers", get(list_providers))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub provider_id: String,
    pub order_context: OrderContext,
}

async fn delivery_options(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeliveryQuoteRequest>, JsonRejection>,
) -> Result<Json<Vec<DeliveryOption>>, AppError> {
    let Json(payload) = payload?;
    if !payload.farm_location.is_valid() {
        return Err(AppError::BadRequest("farmLocation is out of range".to_string()));
    }
    if payload.delivery_location.is_some_and(|point| !point.is_valid()) {
        return Err(AppError::BadRequest("deliveryLocation is out of range".to_string()));
    }

    state.metrics.quote_requests_total.inc();
    Ok(Json(state.quotes.quote(&payload).await))
}

async fn dispatch_delivery(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Json<ProviderAdapterResult> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            let reason = rejection.body_text();
            warn!(error = %reason, "unreadable dispatch request");
            state.metrics.record_dispatch("invalid", false);
            return Json(ProviderAdapterResult::failed(format!("invalid dispatch request: {reason}")));
        }
    };

    let order = &payload.order_context;
    let result = state.dispatcher.dispatch(&payload.provider_id, order).await;

    if let (true, Some(tracking_id)) = (result.success, result.tracking_id.as_ref()) {
        let event = DispatchEvent {
            order_id: order.order_id,
            provider_id: payload.provider_id.clone(),
            tracking_id: tracking_id.clone(),
            estimated_delivery: result.estimated_delivery.clone(),
            dispatched_at: Utc::now(),
        };
        // No subscribers is fine.
        let _ = state.dispatch_events_tx.send(event);
    }

    Json(result)
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProviderRegistry> {
    Json(state.registry.clone())
}
