use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pickup/qr", post(create_pickup_qr))
        .route("/pickup/verify", post(verify_pickup))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupQrRequest {
    pub order_id: i64,
    pub order_total: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupQrResponse {
    pub qr_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupVerifyRequest {
    #[serde(default)]
    pub qr_data: Option<String>,
    #[serde(default)]
    pub order_id: Option<i64>,
}

#[derive(Serialize)]
pub struct PickupVerifyResponse {
    pub success: bool,
}

async fn create_pickup_qr(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PickupQrRequest>, JsonRejection>,
) -> Result<Json<PickupQrResponse>, AppError> {
    let Json(payload) = payload?;
    let (token, qr_code) = state.tokens.issue_qr(payload.order_id, payload.order_total)?;
    let expires_at = DateTime::<Utc>::from_timestamp_millis(token.issued_at)
        .and_then(|issued_at| issued_at.checked_add_signed(state.tokens.ttl()))
        .ok_or_else(|| AppError::Internal("pickup token expiry out of range".to_string()))?;

    info!(order_id = token.order_id, "pickup qr generated");
    Ok(Json(PickupQrResponse {
        qr_code,
        expires_at,
    }))
}

async fn verify_pickup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PickupVerifyRequest>, JsonRejection>,
) -> Json<PickupVerifyResponse> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "unreadable pickup verification request");
            record(&state, "malformed");
            return Json(PickupVerifyResponse { success: false });
        }
    };

    let (Some(qr_data), Some(order_id)) = (payload.qr_data, payload.order_id) else {
        record(&state, "malformed");
        return Json(PickupVerifyResponse { success: false });
    };

    if !state.tokens.verify_token(&qr_data, order_id) {
        record(&state, "rejected");
        return Json(PickupVerifyResponse { success: false });
    }

    if state.single_use_pickup && !state.redeem_pickup(order_id, Utc::now()) {
        record(&state, "replayed");
        return Json(PickupVerifyResponse { success: false });
    }

    info!(order_id, "pickup verified");
    record(&state, "verified");
    Json(PickupVerifyResponse { success: true })
}

fn record(state: &AppState, outcome: &str) {
    state
        .metrics
        .pickup_verifications_total
        .with_label_values(&[outcome])
        .inc();
}

