use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::geo::GeoPoint;

pub const PICKUP_ID: &str = "pickup";
pub const LOCAL_DELIVERY_ID: &str = "local_delivery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Pickup,
    LocalDelivery,
    ThirdParty,
}

/// A fulfillment choice offered to the buyer for one quote request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOption {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeliveryKind,
    pub estimated_time: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
    pub description: String,
    pub is_available: bool,
}

impl DeliveryOption {
    pub fn pickup() -> Self {
        Self {
            id: PICKUP_ID.to_string(),
            name: "Farm Pickup".to_string(),
            kind: DeliveryKind::Pickup,
            estimated_time: "Ready in 2-4 hours".to_string(),
            fee: Decimal::ZERO,
            description: "Collect your order at the farm stand with your pickup QR code"
                .to_string(),
            is_available: true,
        }
    }
}

/// Ephemeral quote input; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryQuoteRequest {
    pub zip_code: String,
    pub farm_location: GeoPoint,
    /// Exact destination, when the caller already geocoded the address.
    #[serde(default)]
    pub delivery_location: Option<GeoPoint>,
}
