use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Signed proof that an order may be released at pickup.
///
/// The serialized form is what gets embedded in the QR code. `order_total` is
/// carried as a decimal string so the signed value survives the round trip exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupToken {
    pub order_id: i64,
    pub order_total: Decimal,
    /// Unix milliseconds, UTC.
    pub issued_at: i64,
    pub signature: String,
}
