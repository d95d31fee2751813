//! Reqwest-backed Stripe Checkout adapter.
//!
//! Opens a one-item `payment` mode checkout session priced in minor units.
//! The buyer's identity travels as `client_reference_id` so the signed
//! webhook can be matched back to the account.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use zeroize::Zeroizing;

use super::dto::{CheckoutSessionDto, StripeErrorEnvelopeDto};
use crate::domain::ports::{CheckoutRequest, PaymentProvider, PaymentProviderError};
use crate::domain::{InitiatedPurchase, PurchaseIntentId};

/// Stripe's checkout session endpoint.
pub const STRIPE_CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

pub struct StripeCheckoutSettings {
    pub secret_key: Zeroizing<String>,
    /// ISO 4217 code, lower case.
    pub currency: String,
    /// Line item name shown on the checkout page.
    pub product_name: String,
}

pub struct StripeCheckout {
    client: Client,
    endpoint: Url,
    settings: StripeCheckoutSettings,
}

impl StripeCheckout {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        settings: StripeCheckoutSettings,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }
}

fn checkout_form(
    settings: &StripeCheckoutSettings,
    request: &CheckoutRequest,
) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_owned()),
        ("payment_method_types[0]", "card".to_owned()),
        ("client_reference_id", request.client_reference.to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("line_items[0][quantity]", "1".to_owned()),
        (
            "line_items[0][price_data][currency]",
            settings.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            request.amount_minor_units.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            settings.product_name.clone(),
        ),
        ("metadata[tokens]", request.tokens.to_string()),
    ]
}

#[async_trait]
impl PaymentProvider for StripeCheckout {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<InitiatedPurchase, PaymentProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.settings.secret_key.as_str())
            .form(&checkout_form(&self.settings, request))
            .send()
            .await
            .map_err(|err| PaymentProviderError::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| PaymentProviderError::transport(err.to_string()))?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }
        parse_checkout(&body)
    }
}

fn parse_checkout(body: &[u8]) -> Result<InitiatedPurchase, PaymentProviderError> {
    let session: CheckoutSessionDto = serde_json::from_slice(body).map_err(|err| {
        PaymentProviderError::transport(format!("invalid checkout response: {err}"))
    })?;
    let redirect_url = session
        .url
        .ok_or_else(|| PaymentProviderError::transport("checkout response has no url"))?;
    let intent_id = PurchaseIntentId::new(session.id)
        .map_err(|err| PaymentProviderError::transport(err.to_string()))?;
    Ok(InitiatedPurchase {
        intent_id,
        redirect_url,
    })
}

fn map_status_error(status: StatusCode, body: &[u8]) -> PaymentProviderError {
    let detail = serde_json::from_slice::<StripeErrorEnvelopeDto>(body)
        .ok()
        .and_then(|envelope| envelope.error.message);
    let message = match detail {
        Some(detail) => format!("status {}: {detail}", status.as_u16()),
        None => format!("status {}", status.as_u16()),
    };
    if status.is_client_error() {
        PaymentProviderError::rejected(message)
    } else {
        PaymentProviderError::transport(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountIdentity;
    use crate::domain::ports::CHECKOUT_ID_PLACEHOLDER;
    use rstest::rstest;

    fn settings() -> StripeCheckoutSettings {
        StripeCheckoutSettings {
            secret_key: Zeroizing::new("sk_test".to_owned()),
            currency: "usd".to_owned(),
            product_name: "Tokens".to_owned(),
        }
    }

    #[rstest]
    fn form_carries_reference_amount_and_redirects() {
        let request = CheckoutRequest {
            client_reference: AccountIdentity::new("u1").expect("identity"),
            tokens: 500,
            amount_minor_units: 999,
            success_url: format!("https://gate.test/purchase/intent/{CHECKOUT_ID_PLACEHOLDER}"),
            cancel_url: "https://gate.test/purchase/cancelled".to_owned(),
        };
        let form = checkout_form(&settings(), &request);
        let lookup = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(lookup("client_reference_id"), Some("u1"));
        assert_eq!(lookup("line_items[0][price_data][unit_amount]"), Some("999"));
        assert_eq!(lookup("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            lookup("success_url"),
            Some("https://gate.test/purchase/intent/{CHECKOUT_SESSION_ID}")
        );
        assert_eq!(lookup("metadata[tokens]"), Some("500"));
    }

    #[rstest]
    fn checkout_response_yields_id_and_redirect() {
        let purchase = parse_checkout(
            br#"{"id":"cs_test_a1","object":"checkout.session","url":"https://checkout.stripe.com/c/pay/cs_test_a1"}"#,
        )
        .expect("parsed");
        assert_eq!(purchase.intent_id.as_ref(), "cs_test_a1");
        assert!(purchase.redirect_url.starts_with("https://checkout.stripe.com/"));
    }

    #[rstest]
    #[case(StatusCode::BAD_REQUEST, true)]
    #[case(StatusCode::PAYMENT_REQUIRED, true)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, false)]
    fn client_statuses_are_rejections(#[case] status: StatusCode, #[case] rejected: bool) {
        let error = map_status_error(
            status,
            br#"{"error":{"message":"Amount must be at least 50 cents"}}"#,
        );
        assert_eq!(
            matches!(error, PaymentProviderError::Rejected { .. }),
            rejected
        );
        assert!(error.to_string().contains("Amount must be at least 50 cents"));
    }
}
