//! Ports for the external payment provider: opening checkouts and
//! authenticating the provider's server-to-server payment notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AccountIdentity, InitiatedPurchase, PaymentEvent, PurchaseIntentId};

use super::define_port_error;

/// Placeholder the provider substitutes with the checkout id in redirects.
pub const CHECKOUT_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

define_port_error! {
    /// Errors raised when opening a checkout.
    pub enum PaymentProviderError {
        /// The provider refused the checkout request.
        Rejected { message: String } => "payment provider rejected the checkout: {message}",
        /// The provider could not be reached or answered unintelligibly.
        Transport { message: String } => "payment provider unreachable: {message}",
    }
}

define_port_error! {
    /// Errors raised while authenticating a payment notification.
    pub enum PaymentEventError {
        /// The signature header is absent or unparsable.
        MissingSignature => "payment notification carries no usable signature",
        /// No signature matches the payload.
        InvalidSignature => "payment notification signature does not match",
        /// The signed timestamp is outside the accepted window.
        Stale { age_seconds: i64 } => "payment notification is {age_seconds}s outside tolerance",
        /// The payload is not a notification this service understands.
        Malformed { message: String } => "payment notification is malformed: {message}",
    }
}

/// Parameters for a new checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub client_reference: AccountIdentity,
    pub tokens: u32,
    pub amount_minor_units: u64,
    /// May contain [`CHECKOUT_ID_PLACEHOLDER`].
    pub success_url: String,
    pub cancel_url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a checkout and return its id and the URL to send the buyer to.
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<InitiatedPurchase, PaymentProviderError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait PaymentEventVerifier: Send + Sync {
    /// Authenticate `payload` against `signature` and decode it.
    ///
    /// Returns `Ok(None)` for authentic notifications of a kind this service
    /// does not act on.
    fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentEvent>, PaymentEventError>;
}

/// Development payment provider that opens no real checkout.
///
/// The buyer is sent straight to the success URL; the intent only becomes
/// credited once a signed notification arrives.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePaymentProvider;

#[async_trait]
impl PaymentProvider for FixturePaymentProvider {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<InitiatedPurchase, PaymentProviderError> {
        let raw_id = format!("cs_fixture_{}", Uuid::new_v4().simple());
        let intent_id = PurchaseIntentId::new(raw_id.as_str())
            .map_err(|err| PaymentProviderError::rejected(err.to_string()))?;
        Ok(InitiatedPurchase {
            redirect_url: request.success_url.replace(CHECKOUT_ID_PLACEHOLDER, &raw_id),
            intent_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn fixture_checkout_substitutes_the_id() {
        let request = CheckoutRequest {
            client_reference: AccountIdentity::new("u1").expect("identity"),
            tokens: 500,
            amount_minor_units: 999,
            success_url: format!("http://localhost/purchase/intent/{CHECKOUT_ID_PLACEHOLDER}"),
            cancel_url: "http://localhost/".to_owned(),
        };
        let initiated = FixturePaymentProvider
            .create_checkout(&request)
            .await
            .expect("checkout");
        assert!(initiated.intent_id.as_ref().starts_with("cs_fixture_"));
        assert_eq!(
            initiated.redirect_url,
            format!("http://localhost/purchase/intent/{}", initiated.intent_id)
        );
    }
}
