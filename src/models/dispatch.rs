use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::geo::GeoPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Everything a provider needs to turn a selected option into a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderContext {
    pub order_id: i64,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub customer: Contact,
    pub farm: Contact,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAdapterResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<String>,
    /// Data URI of the pickup QR code; only set for pickup dispatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderAdapterResult {
    pub fn dispatched(tracking_id: String, estimated_delivery: String) -> Self {
        Self {
            success: true,
            tracking_id: Some(tracking_id),
            estimated_delivery: Some(estimated_delivery),
            qr_code: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tracking_id: None,
            estimated_delivery: None,
            qr_code: None,
            error: Some(error.into()),
        }
    }
}

/// Broadcast to websocket subscribers after every successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    pub order_id: i64,
    pub provider_id: String,
    pub tracking_id: String,
    pub estimated_delivery: Option<String>,
    pub dispatched_at: DateTime<Utc>,
}
