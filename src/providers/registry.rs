use std::fs;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::option::{DeliveryKind, DeliveryOption, LOCAL_DELIVERY_ID, PICKUP_ID};
use crate::providers::couriers::{DoorDashAdapter, RoadieAdapter, UberDirectAdapter};
use crate::providers::SharedAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourierKind {
    DoorDash,
    UberDirect,
    Roadie,
}

/// Static description of one third-party courier: who it is, where it
/// delivers and what it charges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub id: String,
    pub name: String,
    pub courier: CourierKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee: Decimal,
    pub estimated_time: String,
    pub eta_minutes: u32,
    pub description: String,
    /// Postal code prefixes the courier serves.
    pub coverage: Vec<String>,
}

impl ProviderProfile {
    pub fn to_option(&self) -> DeliveryOption {
        DeliveryOption {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: DeliveryKind::ThirdParty,
            estimated_time: self.estimated_time.clone(),
            fee: self.fee,
            description: self.description.clone(),
            is_available: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDeliveryProfile {
    pub estimated_time: String,
    pub description: String,
    pub coverage: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRegistry {
    pub local_delivery: LocalDeliveryProfile,
    pub couriers: Vec<ProviderProfile>,
}

fn california_prefixes() -> Vec<String> {
    (90..=96).map(|prefix: u32| prefix.to_string()).collect()
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            local_delivery: LocalDeliveryProfile {
                estimated_time: "Same day".to_string(),
                description: "Delivered by the grower's own vehicle".to_string(),
                coverage: california_prefixes(),
            },
            couriers: vec![
                ProviderProfile {
                    id: "doordash".to_string(),
                    name: "DoorDash".to_string(),
                    courier: CourierKind::DoorDash,
                    fee: Decimal::new(399, 2),
                    estimated_time: "30-45 minutes".to_string(),
                    eta_minutes: 45,
                    description: "On-demand delivery by a DoorDash Dasher".to_string(),
                    coverage: california_prefixes(),
                },
                ProviderProfile {
                    id: "uber_direct".to_string(),
                    name: "Uber Direct".to_string(),
                    courier: CourierKind::UberDirect,
                    fee: Decimal::new(499, 2),
                    estimated_time: "25-40 minutes".to_string(),
                    eta_minutes: 40,
                    description: "On-demand delivery through Uber".to_string(),
                    coverage: california_prefixes(),
                },
                ProviderProfile {
                    id: "roadie".to_string(),
                    name: "Roadie".to_string(),
                    courier: CourierKind::Roadie,
                    fee: Decimal::new(599, 2),
                    estimated_time: "2-4 hours".to_string(),
                    eta_minutes: 240,
                    description: "Scheduled same-day delivery by a Roadie driver".to_string(),
                    coverage: california_prefixes(),
                },
            ],
        }
    }
}

impl ProviderRegistry {
    /// Reads the registry from a JSON file, or returns the built-in one.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read {path}: {err}")))?;
        let mut registry: Self = serde_json::from_str(&raw)
            .map_err(|err| AppError::Config(format!("invalid provider registry {path}: {err}")))?;
        registry.normalize_coverage();
        registry.validate()?;
        Ok(registry)
    }

    /// Trims and uppercases coverage prefixes so they compare against
    /// normalized postal codes.
    pub fn normalize_coverage(&mut self) {
        let rules = std::iter::once(&mut self.local_delivery.coverage)
            .chain(self.couriers.iter_mut().map(|profile| &mut profile.coverage));
        for coverage in rules {
            for prefix in coverage.iter_mut() {
                *prefix = prefix.trim().to_ascii_uppercase();
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.local_delivery.coverage.iter().any(|prefix| prefix.is_empty()) {
            return Err(AppError::Config("local delivery has an empty coverage prefix".to_string()));
        }

        let mut seen: Vec<&str> = vec![PICKUP_ID, LOCAL_DELIVERY_ID];
        for profile in &self.couriers {
            if profile.id.trim().is_empty() {
                return Err(AppError::Config("provider id cannot be empty".to_string()));
            }
            if seen.contains(&profile.id.as_str()) {
                return Err(AppError::Config(format!("duplicate provider id {}", profile.id)));
            }
            if profile.coverage.iter().any(|prefix| prefix.is_empty()) {
                return Err(AppError::Config(format!("provider {} has an empty coverage prefix", profile.id)));
            }
            if profile.fee < Decimal::ZERO {
                return Err(AppError::Config(format!("provider {} has a negative fee", profile.id)));
            }
            seen.push(&profile.id);
        }
        Ok(())
    }

    /// One adapter per configured courier, in registry order.
    pub fn build_adapters(&self) -> Vec<SharedAdapter> {
        self.couriers
            .iter()
            .map(|profile| -> SharedAdapter {
                match profile.courier {
                    CourierKind::DoorDash => Arc::new(DoorDashAdapter::new(profile.clone())),
                    CourierKind::UberDirect => Arc::new(UberDirectAdapter::new(profile.clone())),
                    CourierKind::Roadie => Arc::new(RoadieAdapter::new(profile.clone())),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::matches_coverage;

    #[test]
    fn default_registry_has_three_couriers_in_order() {
        let registry = ProviderRegistry::default();
        let ids: Vec<&str> = registry.couriers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["doordash", "uber_direct", "roadie"]);
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn adapters_follow_registry_order() {
        let adapters = ProviderRegistry::default().build_adapters();
        let ids: Vec<&str> = adapters.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["doordash", "uber_direct", "roadie"]);
    }

    #[test]
    fn duplicate_or_reserved_ids_are_rejected() {
        let mut registry = ProviderRegistry::default();
        registry.couriers[1].id = "doordash".to_string();
        assert!(matches!(registry.validate(), Err(AppError::Config(_))));

        let mut registry = ProviderRegistry::default();
        registry.couriers[0].id = "pickup".to_string();
        assert!(matches!(registry.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn registry_parses_from_json() {
        let raw = serde_json::to_string(&ProviderRegistry::default()).unwrap();
        let parsed: ProviderRegistry = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.couriers[2].fee, Decimal::new(599, 2));
        assert_eq!(parsed.couriers[0].courier, CourierKind::DoorDash);
    }

    #[test]
    fn missing_registry_file_is_a_config_error() {
        let result = ProviderRegistry::load(Some("/nonexistent/providers.json"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn loaded_coverage_prefixes_are_normalized() {
        let mut registry = ProviderRegistry::default();
        registry.local_delivery.coverage = vec![" k1a ".to_string()];
        registry.couriers[0].coverage = vec!["m5v".to_string()];

        let path = std::env::temp_dir().join(format!("providers-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, serde_json::to_string(&registry).unwrap()).unwrap();
        let loaded = ProviderRegistry::load(path.to_str());
        fs::remove_file(&path).unwrap();

        let loaded = loaded.unwrap();
        assert_eq!(loaded.local_delivery.coverage, vec!["K1A".to_string()]);
        assert!(matches_coverage(&loaded.local_delivery.coverage, "k1a0b1"));
        assert!(matches_coverage(&loaded.couriers[0].coverage, "M5V3L9"));
    }

    #[test]
    fn blank_coverage_prefix_is_rejected() {
        let mut registry = ProviderRegistry::default();
        registry.couriers[2].coverage.push("  ".to_string());
        registry.normalize_coverage();
        assert!(matches!(registry.validate(), Err(AppError::Config(msg)) if msg.contains("roadie")));
    }
}
