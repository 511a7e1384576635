use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use qrcode::render::svg;
use qrcode::QrCode;
use rust_decimal::Decimal;
use sha2::Sha256;
use tracing::debug;

use crate::error::AppError;
use crate::models::token::PickupToken;

type HmacSha256 = Hmac<Sha256>;

/// How far in the future `issuedAt` may be before a token is treated as forged.
const MAX_CLOCK_SKEW_MS: i64 = 5 * 60 * 1000;

/// Issues and verifies HMAC-signed pickup tokens.
///
/// Verification is stateless: the token carries everything needed to check it,
/// so a valid token stays valid for every re-presentation inside its lifetime.
/// Callers that need single-use pickups must record redemption themselves.
#[derive(Clone)]
pub struct PickupTokenService {
    secret: String,
    ttl: Duration,
}

#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    Malformed,
    OrderMismatch,
    Expired,
    IssuedInFuture,
    BadSignature,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Malformed => "malformed payload",
            Rejection::OrderMismatch => "order id mismatch",
            Rejection::Expired => "token expired",
            Rejection::IssuedInFuture => "issued in the future",
            Rejection::BadSignature => "signature mismatch",
        };
        f.write_str(reason)
    }
}

impl PickupTokenService {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue_token(&self, order_id: i64, order_total: Decimal) -> Result<PickupToken, AppError> {
        self.issue_token_at(order_id, order_total, Utc::now())
    }

    pub fn issue_token_at(
        &self,
        order_id: i64,
        order_total: Decimal,
        issued_at: DateTime<Utc>,
    ) -> Result<PickupToken, AppError> {
        if order_id <= 0 {
            return Err(AppError::BadRequest("orderId must be > 0".to_string()));
        }
        if order_total < Decimal::ZERO {
            return Err(AppError::BadRequest("orderTotal must be >= 0".to_string()));
        }

        let order_total = order_total.normalize();
        let issued_at = issued_at.timestamp_millis();
        let mac = self.mac_for(order_id, order_total, issued_at)?;

        Ok(PickupToken {
            order_id,
            order_total,
            issued_at,
            signature: hex::encode(mac.finalize().into_bytes()),
        })
    }

    /// Serializes a token into the string embedded in the QR code.
    pub fn encode(&self, token: &PickupToken) -> Result<String, AppError> {
        serde_json::to_string(token)
            .map_err(|err| AppError::Internal(format!("failed to encode pickup token: {err}")))
    }

    /// Issues a token and renders it as a QR image data URI.
    pub fn issue_qr(&self, order_id: i64, order_total: Decimal) -> Result<(PickupToken, String), AppError> {
        let token = self.issue_token(order_id, order_total)?;
        let payload = self.encode(&token)?;
        let image = render_qr_data_uri(&payload)?;
        Ok((token, image))
    }

    pub fn verify_token(&self, payload: &str, expected_order_id: i64) -> bool {
        self.verify_token_at(payload, expected_order_id, Utc::now())
    }

    pub fn verify_token_at(&self, payload: &str, expected_order_id: i64, now: DateTime<Utc>) -> bool {
        match self.check(payload, expected_order_id, now) {
            Ok(()) => true,
            Err(reason) => {
                debug!(order_id = expected_order_id, %reason, "pickup token rejected");
                false
            }
        }
    }

    fn check(&self, payload: &str, expected_order_id: i64, now: DateTime<Utc>) -> Result<(), Rejection> {
        let token: PickupToken =
            serde_json::from_str(payload.trim()).map_err(|_| Rejection::Malformed)?;

        if token.order_id != expected_order_id {
            return Err(Rejection::OrderMismatch);
        }

        let age_ms = now.timestamp_millis().saturating_sub(token.issued_at);
        if age_ms > self.ttl.num_milliseconds() {
            return Err(Rejection::Expired);
        }
        if age_ms < -MAX_CLOCK_SKEW_MS {
            return Err(Rejection::IssuedInFuture);
        }

        let signature = hex::decode(&token.signature).map_err(|_| Rejection::Malformed)?;
        let mac = self
            .mac_for(token.order_id, token.order_total.normalize(), token.issued_at)
            .map_err(|_| Rejection::BadSignature)?;
        mac.verify_slice(&signature)
            .map_err(|_| Rejection::BadSignature)
    }

    fn mac_for(&self, order_id: i64, order_total: Decimal, issued_at: i64) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|err| AppError::Internal(format!("invalid pickup signing key: {err}")))?;
        mac.update(format!("{order_id}-{order_total}-{issued_at}").as_bytes());
        Ok(mac)
    }
}

pub fn render_qr_data_uri(payload: &str) -> Result<String, AppError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|err| AppError::Internal(format!("failed to build pickup qr code: {err}")))?;

    let image = code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .dark_color(svg::Color("#1f3d2b"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn service() -> PickupTokenService {
        PickupTokenService::new("test-secret", Duration::hours(24))
    }

    fn total(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn mutate(payload: &str, field: &str, value: Value) -> String {
        let mut json: Value = serde_json::from_str(payload).unwrap();
        json[field] = value;
        json.to_string()
    }

    #[test]
    fn freshly_issued_token_verifies() {
        let svc = service();
        for (order_id, cents) in [(1, 0), (42, 2599), (987_654, 1_000_000)] {
            let token = svc.issue_token(order_id, total(cents)).unwrap();
            let payload = svc.encode(&token).unwrap();
            assert!(svc.verify_token(&payload, order_id));
        }
    }

    #[test]
    fn invalid_issue_inputs_are_rejected() {
        let svc = service();
        assert!(matches!(svc.issue_token(0, total(100)), Err(AppError::BadRequest(_))));
        assert!(matches!(svc.issue_token(-3, total(100)), Err(AppError::BadRequest(_))));
        assert!(matches!(svc.issue_token(7, total(-1)), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn tampered_total_fails() {
        let svc = service();
        let payload = svc.encode(&svc.issue_token(42, total(2599)).unwrap()).unwrap();

        let cheaper = mutate(&payload, "orderTotal", Value::from("25.98"));
        assert!(!svc.verify_token(&cheaper, 42));

        let tiny_change = mutate(&payload, "orderTotal", Value::from("25.991"));
        assert!(!svc.verify_token(&tiny_change, 42));
    }

    #[test]
    fn tampered_order_id_fails() {
        let svc = service();
        let payload = svc.encode(&svc.issue_token(42, total(2599)).unwrap()).unwrap();

        let forged = mutate(&payload, "orderId", Value::from(43));
        assert!(!svc.verify_token(&forged, 43));
    }

    #[test]
    fn tampered_issue_time_fails() {
        let svc = service();
        let issued = Utc::now() - Duration::hours(23);
        let payload = svc
            .encode(&svc.issue_token_at(42, total(2599), issued).unwrap())
            .unwrap();

        let refreshed = mutate(&payload, "issuedAt", Value::from(Utc::now().timestamp_millis()));
        assert!(!svc.verify_token(&refreshed, 42));
    }

    #[test]
    fn expired_token_fails_even_with_valid_signature() {
        let svc = service();
        let issued = Utc::now() - Duration::hours(25);
        let payload = svc
            .encode(&svc.issue_token_at(42, total(2599), issued).unwrap())
            .unwrap();
        assert!(!svc.verify_token(&payload, 42));
    }

    #[test]
    fn token_is_valid_until_the_end_of_its_window() {
        let svc = service();
        let issued = Utc::now();
        let payload = svc
            .encode(&svc.issue_token_at(42, total(2599), issued).unwrap())
            .unwrap();

        assert!(svc.verify_token_at(&payload, 42, issued + Duration::hours(24)));
        assert!(!svc.verify_token_at(&payload, 42, issued + Duration::hours(24) + Duration::milliseconds(1)));
    }

    #[test]
    fn token_from_the_future_fails() {
        let svc = service();
        let issued = Utc::now() + Duration::hours(1);
        let payload = svc
            .encode(&svc.issue_token_at(42, total(2599), issued).unwrap())
            .unwrap();
        assert!(!svc.verify_token(&payload, 42));
    }

    #[test]
    fn token_for_another_order_fails() {
        let svc = service();
        let payload = svc.encode(&svc.issue_token(42, total(2599)).unwrap()).unwrap();
        assert!(!svc.verify_token(&payload, 41));
        assert!(!svc.verify_token(&payload, 4200));
    }

    #[test]
    fn token_signed_with_another_secret_fails() {
        let other = PickupTokenService::new("someone-else", Duration::hours(24));
        let payload = other.encode(&other.issue_token(42, total(2599)).unwrap()).unwrap();
        assert!(!service().verify_token(&payload, 42));
    }

    #[test]
    fn malformed_payloads_return_false() {
        let svc = service();
        for payload in [
            "",
            "not json",
            "{}",
            r#"{"orderId":42}"#,
            r#"{"orderId":"x","orderTotal":"1","issuedAt":0,"signature":"00"}"#,
            r#"{"orderId":42,"orderTotal":"25.99","issuedAt":0,"signature":"zz"}"#,
        ] {
            assert!(!svc.verify_token(payload, 42), "accepted {payload:?}");
        }
    }

    #[test]
    fn equivalent_totals_sign_identically() {
        let svc = service();
        let issued = Utc::now();
        let a = svc.issue_token_at(9, Decimal::new(425, 1), issued).unwrap();
        let b = svc.issue_token_at(9, Decimal::new(4250, 2), issued).unwrap();
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn qr_is_an_svg_data_uri() {
        let (token, image) = service().issue_qr(42, total(2599)).unwrap();
        assert_eq!(token.order_id, 42);
        assert!(image.starts_with("data:image/svg+xml;base64,"));

        let encoded = image.trim_start_matches("data:image/svg+xml;base64,");
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }
}
