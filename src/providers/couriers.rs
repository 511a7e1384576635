//! Courier adapters. Coverage is evaluated from the static registry profile;
//! delivery creation builds each courier's request body and hands back a
//! tracking handle. The outbound HTTP call is not wired up, the request is
//! only logged.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ProviderError;
use crate::models::dispatch::{Contact, OrderContext};
use crate::providers::registry::ProviderProfile;
use crate::providers::{estimated_arrival, matches_coverage, DeliveryHandle, ProviderAdapter};

fn to_cents(amount: Decimal) -> Result<i64, ProviderError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ProviderError::Rejected(format!("amount {amount} out of range")))
}

fn required_address(contact: &Contact, role: &str) -> Result<String, ProviderError> {
    contact
        .address
        .clone()
        .filter(|address| !address.trim().is_empty())
        .ok_or_else(|| ProviderError::Rejected(format!("{role} address is required")))
}

fn required_phone(contact: &Contact, role: &str) -> Result<String, ProviderError> {
    contact
        .phone
        .clone()
        .filter(|phone| !phone.trim().is_empty())
        .ok_or_else(|| ProviderError::Rejected(format!("{role} phone number is required")))
}

fn tracking_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("{prefix}-{}", &id[..12])
}

fn submit<T: Serialize>(
    profile: &ProviderProfile,
    order_id: i64,
    request: &T,
    prefix: &str,
) -> Result<DeliveryHandle, ProviderError> {
    let body = serde_json::to_string(request)
        .map_err(|err| ProviderError::Upstream(format!("failed to encode request: {err}")))?;
    debug!(provider = %profile.id, order_id, %body, "courier delivery request");

    let handle = DeliveryHandle {
        tracking_id: tracking_id(prefix),
        estimated_delivery: estimated_arrival(profile.eta_minutes),
    };
    info!(
        provider = %profile.id,
        order_id,
        tracking_id = %handle.tracking_id,
        "courier delivery created"
    );
    Ok(handle)
}

#[derive(Serialize)]
struct DoorDashItem {
    name: String,
    quantity: u32,
}

#[derive(Serialize)]
struct DoorDashDeliveryRequest {
    external_delivery_id: String,
    pickup_business_name: String,
    pickup_address: String,
    pickup_phone_number: Option<String>,
    dropoff_contact_given_name: String,
    dropoff_address: String,
    dropoff_phone_number: String,
    order_value: i64,
    items: Vec<DoorDashItem>,
}

pub struct DoorDashAdapter {
    profile: ProviderProfile,
}

impl DoorDashAdapter {
    pub fn new(profile: ProviderProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl ProviderAdapter for DoorDashAdapter {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn check_availability(&self, postal_code: &str) -> Result<bool, ProviderError> {
        Ok(matches_coverage(&self.profile.coverage, postal_code))
    }

    async fn create_delivery(&self, order: &OrderContext) -> Result<DeliveryHandle, ProviderError> {
        let request = DoorDashDeliveryRequest {
            external_delivery_id: format!("order-{}", order.order_id),
            pickup_business_name: order.farm.name.clone(),
            pickup_address: required_address(&order.farm, "pickup")?,
            pickup_phone_number: order.farm.phone.clone(),
            dropoff_contact_given_name: order.customer.name.clone(),
            dropoff_address: required_address(&order.customer, "dropoff")?,
            dropoff_phone_number: required_phone(&order.customer, "dropoff")?,
            order_value: to_cents(order.total_amount)?,
            items: order
                .items
                .iter()
                .map(|item| DoorDashItem {
                    name: item.name.clone(),
                    quantity: item.quantity,
                })
                .collect(),
        };

        submit(&self.profile, order.order_id, &request, "DD")
    }
}

#[derive(Serialize)]
struct UberManifestItem {
    name: String,
    quantity: u32,
    price: i64,
}

#[derive(Serialize)]
struct UberDeliveryRequest {
    external_id: String,
    pickup_name: String,
    pickup_address: String,
    pickup_phone_number: String,
    dropoff_name: String,
    dropoff_address: String,
    dropoff_phone_number: String,
    manifest_items: Vec<UberManifestItem>,
    manifest_total_value: i64,
}

pub struct UberDirectAdapter {
    profile: ProviderProfile,
}

impl UberDirectAdapter {
    pub fn new(profile: ProviderProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl ProviderAdapter for UberDirectAdapter {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn check_availability(&self, postal_code: &str) -> Result<bool, ProviderError> {
        Ok(matches_coverage(&self.profile.coverage, postal_code))
    }

    async fn create_delivery(&self, order: &OrderContext) -> Result<DeliveryHandle, ProviderError> {
        let manifest_items = order
            .items
            .iter()
            .map(|item| {
                Ok(UberManifestItem {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    price: to_cents(item.unit_price)?,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        let request = UberDeliveryRequest {
            external_id: format!("order-{}", order.order_id),
            pickup_name: order.farm.name.clone(),
            pickup_address: required_address(&order.farm, "pickup")?,
            pickup_phone_number: required_phone(&order.farm, "pickup")?,
            dropoff_name: order.customer.name.clone(),
            dropoff_address: required_address(&order.customer, "dropoff")?,
            dropoff_phone_number: required_phone(&order.customer, "dropoff")?,
            manifest_items,
            manifest_total_value: to_cents(order.total_amount)?,
        };

        submit(&self.profile, order.order_id, &request, "UBR")
    }
}

#[derive(Serialize)]
struct RoadieContact {
    name: String,
    phone: Option<String>,
}

#[derive(Serialize)]
struct RoadieLocation {
    address: String,
    contact: RoadieContact,
}

#[derive(Serialize)]
struct RoadieShipmentRequest {
    reference_id: String,
    description: String,
    pickup_location: RoadieLocation,
    delivery_location: RoadieLocation,
    #[serde(with = "rust_decimal::serde::float")]
    value: Decimal,
}

pub struct RoadieAdapter {
    profile: ProviderProfile,
}

impl RoadieAdapter {
    pub fn new(profile: ProviderProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl ProviderAdapter for RoadieAdapter {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn check_availability(&self, postal_code: &str) -> Result<bool, ProviderError> {
        Ok(matches_coverage(&self.profile.coverage, postal_code))
    }

    async fn create_delivery(&self, order: &OrderContext) -> Result<DeliveryHandle, ProviderError> {
        let description = order
            .items
            .iter()
            .map(|item| format!("{}x {}", item.quantity, item.name))
            .collect::<Vec<_>>()
            .join(", ");

        let request = RoadieShipmentRequest {
            reference_id: format!("order-{}", order.order_id),
            description,
            pickup_location: RoadieLocation {
                address: required_address(&order.farm, "pickup")?,
                contact: RoadieContact {
                    name: order.farm.name.clone(),
                    phone: order.farm.phone.clone(),
                },
            },
            delivery_location: RoadieLocation {
                address: required_address(&order.customer, "dropoff")?,
                contact: RoadieContact {
                    name: order.customer.name.clone(),
                    phone: order.customer.phone.clone(),
                },
            },
            value: order.total_amount,
        };

        submit(&self.profile, order.order_id, &request, "RD")
    }
}
