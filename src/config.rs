use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use rust_decimal::Decimal;

use crate::error::AppError;

/// Signing key used only when `APP_ENV=development` and no secret is configured.
pub const DEVELOPMENT_PICKUP_SECRET: &str = "farm-fulfillment-development-secret";

/// Pickup codes live at most a year.
pub const MAX_PICKUP_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOrdering {
    /// Pickup, local delivery, then couriers in registry order.
    Registry,
    /// Pickup first, everything else by fee ascending.
    Fee,
}

impl FromStr for QuoteOrdering {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "fee" => Ok(Self::Fee),
            other => Err(format!("unknown ordering {other:?}, expected registry or fee")),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub environment: String,
    pub pickup_secret: String,
    pub pickup_token_ttl: TimeDelta,
    pub pickup_single_use: bool,
    pub provider_timeout_ms: u64,
    pub local_delivery_radius_miles: f64,
    pub local_delivery_fee: Decimal,
    pub quote_ordering: QuoteOrdering,
    pub provider_registry_file: Option<String>,
    pub event_buffer_size: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("log_level", &self.log_level)
            .field("environment", &self.environment)
            .field("pickup_secret", &"[redacted]")
            .field("pickup_token_ttl", &self.pickup_token_ttl)
            .field("pickup_single_use", &self.pickup_single_use)
            .field("provider_timeout_ms", &self.provider_timeout_ms)
            .field("local_delivery_radius_miles", &self.local_delivery_radius_miles)
            .field("local_delivery_fee", &self.local_delivery_fee)
            .field("quote_ordering", &self.quote_ordering)
            .field("provider_registry_file", &self.provider_registry_file)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("APP_ENV").unwrap_or_else(|| "production".to_string());
        let pickup_secret = resolve_secret(&environment, lookup("PICKUP_QR_SECRET"))?;
        let pickup_token_ttl =
            resolve_ttl(parse_or_default(&lookup, "PICKUP_TOKEN_TTL_HOURS", 24)?)?;

        let config = Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            environment,
            pickup_secret,
            pickup_token_ttl,
            pickup_single_use: parse_or_default(&lookup, "PICKUP_SINGLE_USE", false)?,
            provider_timeout_ms: parse_or_default(&lookup, "PROVIDER_TIMEOUT_MS", 3000)?,
            local_delivery_radius_miles: parse_or_default(
                &lookup,
                "LOCAL_DELIVERY_RADIUS_MILES",
                15.0,
            )?,
            local_delivery_fee: parse_or_default(
                &lookup,
                "LOCAL_DELIVERY_FEE",
                Decimal::new(899, 2),
            )?,
            quote_ordering: parse_or_default(&lookup, "QUOTE_ORDERING", QuoteOrdering::Registry)?,
            provider_registry_file: lookup("PROVIDER_REGISTRY_FILE"),
            event_buffer_size: parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 1024)?,
        };

        if config.local_delivery_fee < Decimal::ZERO {
            return Err(AppError::Config("LOCAL_DELIVERY_FEE must be >= 0".to_string()));
        }

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn uses_development_secret(&self) -> bool {
        self.pickup_secret == DEVELOPMENT_PICKUP_SECRET
    }
}

fn resolve_secret(environment: &str, configured: Option<String>) -> Result<String, AppError> {
    match configured.filter(|secret| !secret.trim().is_empty()) {
        Some(secret) => Ok(secret),
        None if environment.eq_ignore_ascii_case("development") => {
            Ok(DEVELOPMENT_PICKUP_SECRET.to_string())
        }
        None => Err(AppError::Config(
            "PICKUP_QR_SECRET must be set outside development".to_string(),
        )),
    }
}

fn resolve_ttl(hours: i64) -> Result<TimeDelta, AppError> {
    if !(1..=MAX_PICKUP_TOKEN_TTL_HOURS).contains(&hours) {
        return Err(AppError::Config(format!(
            "PICKUP_TOKEN_TTL_HOURS must be between 1 and {MAX_PICKUP_TOKEN_TTL_HOURS}"
        )));
    }
    TimeDelta::try_hours(hours)
        .ok_or_else(|| AppError::Config(format!("PICKUP_TOKEN_TTL_HOURS {hours} is out of range")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
