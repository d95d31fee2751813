//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! Each `v1` is HMAC-SHA256 of `"<t>.<raw body>"` keyed with the endpoint
//! secret. Comparison is constant time.

use chrono::{DateTime, TimeDelta, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::dto::WebhookEventDto;
use crate::domain::PaymentEvent;
use crate::domain::ports::{PaymentEventError, PaymentEventVerifier};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted distance between the signed timestamp and now.
pub const DEFAULT_SIGNATURE_TOLERANCE: TimeDelta = TimeDelta::seconds(300);

/// Verifier keyed with one webhook endpoint secret.
#[derive(Clone)]
pub struct StripeSignatureVerifier {
    keyed: HmacSha256,
    tolerance: TimeDelta,
}

impl StripeSignatureVerifier {
    /// # Errors
    ///
    /// Propagates the HMAC key check; SHA-256 HMAC accepts any key length.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(secret.as_ref())?,
            tolerance: DEFAULT_SIGNATURE_TOLERANCE,
        })
    }

    pub fn with_tolerance(mut self, tolerance: TimeDelta) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Produce a header value for `payload` signed at `timestamp`.
    ///
    /// Used by local tooling and tests to mint notifications.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let digest = self.mac_for(payload, timestamp).finalize().into_bytes();
        format!("t={timestamp},v1={}", hex::encode(digest))
    }

    fn mac_for(&self, payload: &[u8], timestamp: i64) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, PaymentEventError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }
    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(ParsedHeader {
            timestamp,
            signatures,
        }),
        _ => Err(PaymentEventError::missing_signature()),
    }
}

impl PaymentEventVerifier for StripeSignatureVerifier {
    fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentEvent>, PaymentEventError> {
        let header = parse_header(signature)?;

        let mac = self.mac_for(payload, header.timestamp);
        let matched = header
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
        if !matched {
            return Err(PaymentEventError::invalid_signature());
        }

        let age_seconds = now.timestamp() - header.timestamp;
        if age_seconds.abs() > self.tolerance.num_seconds() {
            return Err(PaymentEventError::stale(age_seconds));
        }

        let event: WebhookEventDto = serde_json::from_slice(payload)
            .map_err(|err| PaymentEventError::malformed(err.to_string()))?;
        event
            .into_payment_event()
            .map_err(PaymentEventError::malformed)
    }
}
