//! Stripe wire shapes.

use serde::Deserialize;

use crate::domain::{AccountIdentity, PaymentEvent, PaymentStatus, PurchaseIntentId};

/// Event types that report a settled checkout.
const SETTLED_EVENT_TYPES: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutSessionDto {
    pub(super) id: String,
    #[serde(default)]
    pub(super) url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StripeErrorEnvelopeDto {
    pub(super) error: StripeErrorDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct StripeErrorDto {
    #[serde(default)]
    pub(super) message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WebhookEventDto {
    #[serde(rename = "type")]
    pub(super) event_type: String,
    pub(super) data: WebhookDataDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct WebhookDataDto {
    pub(super) object: CheckoutObjectDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutObjectDto {
    pub(super) id: String,
    #[serde(default)]
    pub(super) client_reference_id: Option<String>,
    #[serde(default)]
    pub(super) payment_status: Option<String>,
}

impl WebhookEventDto {
    /// `Ok(None)` for event types this service ignores.
    pub(super) fn into_payment_event(self) -> Result<Option<PaymentEvent>, String> {
        if !SETTLED_EVENT_TYPES.contains(&self.event_type.as_str()) {
            return Ok(None);
        }
        let object = self.data.object;
        let intent_id = PurchaseIntentId::new(object.id).map_err(|err| err.to_string())?;
        let identity = object
            .client_reference_id
            .ok_or_else(|| "checkout carries no client reference".to_owned())
            .and_then(|raw| AccountIdentity::new(raw).map_err(|err| err.to_string()))?;
        let status = match object.payment_status.as_deref() {
            Some("paid" | "no_payment_required") => PaymentStatus::Paid,
            _ => PaymentStatus::Unpaid,
        };
        Ok(Some(PaymentEvent::new(intent_id, identity, status)))
    }
}
