//! Converts payment confirmations into exactly one balance increment.
//!
//! Only a provider-signed notification reaches [`CreditReconciler::confirm_purchase`].
//! The buyer's browser redirect lands on [`CreditReconciler::intent_status`],
//! which reports progress and never credits.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::ports::{
    AccountRepository, CheckoutRequest, PaymentEventError, PaymentEventVerifier, PaymentProvider,
    PaymentProviderError, PurchaseIntentRepository, RedeemOutcome,
};
use crate::domain::repository_errors::{map_account_error, map_intent_error};
use crate::domain::{
    Account, AccountIdentity, ConfirmationOutcome, Error, InitiatedPurchase, PaymentStatus,
    ProviderKind, PurchaseIntent, PurchaseIntentId, PurchaseRequest,
};

fn map_payment_error(error: PaymentProviderError) -> Error {
    Error::provider(ProviderKind::Payment, error.to_string())
}

fn map_event_error(error: PaymentEventError) -> Error {
    let reason = match &error {
        PaymentEventError::MissingSignature => "missing_signature",
        PaymentEventError::InvalidSignature => "invalid_signature",
        PaymentEventError::Stale { .. } => "stale",
        PaymentEventError::Malformed { .. } => "malformed",
    };
    Error::invalid_request(error.to_string()).with_details(json!({ "reason": reason }))
}

/// Redirect targets handed to the payment provider for each checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRedirects {
    pub success_url: String,
    pub cancel_url: String,
}

/// Intent state reported to the buyer after the checkout redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentStatusReport {
    pub intent: PurchaseIntent,
    pub account: Account,
}

/// Purchase initiation and exactly-once crediting.
#[derive(Clone)]
pub struct CreditReconciler {
    intents: Arc<dyn PurchaseIntentRepository>,
    accounts: Arc<dyn AccountRepository>,
    payments: Arc<dyn PaymentProvider>,
    verifier: Arc<dyn PaymentEventVerifier>,
    clock: Arc<dyn Clock>,
    redirects: PurchaseRedirects,
}

impl CreditReconciler {
    pub fn new(
        intents: Arc<dyn PurchaseIntentRepository>,
        accounts: Arc<dyn AccountRepository>,
        payments: Arc<dyn PaymentProvider>,
        verifier: Arc<dyn PaymentEventVerifier>,
        clock: Arc<dyn Clock>,
        redirects: PurchaseRedirects,
    ) -> Self {
        Self {
            intents,
            accounts,
            payments,
            verifier,
            clock,
            redirects,
        }
    }

    /// Open a checkout with the provider and record the pending intent.
    pub async fn initiate_purchase(
        &self,
        identity: &AccountIdentity,
        request: PurchaseRequest,
    ) -> Result<InitiatedPurchase, Error> {
        let checkout = CheckoutRequest {
            client_reference: identity.clone(),
            tokens: request.tokens().get(),
            amount_minor_units: request.price_minor_units(),
            success_url: self.redirects.success_url.clone(),
            cancel_url: self.redirects.cancel_url.clone(),
        };
        let initiated = self
            .payments
            .create_checkout(&checkout)
            .await
            .map_err(map_payment_error)?;

        let intent = PurchaseIntent::pending(
            initiated.intent_id.clone(),
            identity.clone(),
            request,
            self.clock.utc(),
        );
        self.intents
            .insert(&intent)
            .await
            .map_err(map_intent_error)?;

        info!(
            identity = %identity,
            intent_id = %initiated.intent_id,
            tokens = request.tokens().get(),
            price_minor_units = request.price_minor_units(),
            "purchase initiated"
        );
        Ok(initiated)
    }

    /// Apply a confirmed payment for `intent_id` on behalf of `identity`.
    ///
    /// Repeating a confirmation is a successful no-op reported as
    /// [`ConfirmationOutcome::AlreadyConsumed`].
    pub async fn confirm_purchase(
        &self,
        intent_id: &PurchaseIntentId,
        identity: &AccountIdentity,
    ) -> Result<ConfirmationOutcome, Error> {
        let Some(intent) = self
            .intents
            .find(intent_id)
            .await
            .map_err(map_intent_error)?
        else {
            warn!(intent_id = %intent_id, identity = %identity, "confirmation for unknown intent ignored");
            return Err(Error::unknown_intent(format!("no purchase intent {intent_id}")));
        };

        if intent.identity() != identity {
            warn!(
                intent_id = %intent_id,
                owner = %intent.identity(),
                claimant = %identity,
                "confirmation rejected: account mismatch"
            );
            return Err(Error::account_mismatch(
                "purchase intent belongs to a different account",
            ));
        }

        if intent.consumed_at().is_some() {
            return self.already_consumed(identity).await;
        }

        match self
            .intents
            .redeem(intent_id, self.clock.utc())
            .await
            .map_err(map_intent_error)?
        {
            RedeemOutcome::Credited(account) => {
                info!(
                    intent_id = %intent_id,
                    identity = %identity,
                    tokens = intent.tokens_requested().get(),
                    balance = %account.token_balance(),
                    "purchase credited"
                );
                Ok(ConfirmationOutcome::Credited(account))
            }
            RedeemOutcome::AlreadyRedeemed => self.already_consumed(identity).await,
        }
    }

    async fn already_consumed(&self, identity: &AccountIdentity) -> Result<ConfirmationOutcome, Error> {
        let account = self
            .accounts
            .find(identity)
            .await
            .map_err(map_account_error)?
            .ok_or_else(|| Error::account_not_found(format!("no account for identity {identity}")))?;
        Ok(ConfirmationOutcome::AlreadyConsumed(account))
    }

    /// Authenticate a provider notification and confirm the purchase it
    /// reports.
    ///
    /// Authentic notifications that do not report a completed payment are
    /// acknowledged with `Ok(None)`.
    pub async fn apply_payment_notification(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<ConfirmationOutcome>, Error> {
        let signature = signature.ok_or_else(|| map_event_error(PaymentEventError::MissingSignature))?;
        let event = self
            .verifier
            .verify(payload, signature, self.clock.utc())
            .map_err(|err| {
                warn!(error = %err, "payment notification rejected");
                map_event_error(err)
            })?;

        let Some(event) = event else {
            return Ok(None);
        };
        if event.status() != PaymentStatus::Paid {
            info!(intent_id = %event.intent_id(), "unpaid checkout notification ignored");
            return Ok(None);
        }
        self.confirm_purchase(event.intent_id(), event.identity())
            .await
            .map(Some)
    }

    /// Report an intent's state to its owner. Never credits.
    pub async fn intent_status(
        &self,
        intent_id: &PurchaseIntentId,
        identity: &AccountIdentity,
    ) -> Result<IntentStatusReport, Error> {
        let intent = self
            .intents
            .find(intent_id)
            .await
            .map_err(map_intent_error)?
            .ok_or_else(|| Error::unknown_intent(format!("no purchase intent {intent_id}")))?;
        if intent.identity() != identity {
            return Err(Error::account_mismatch(
                "purchase intent belongs to a different account",
            ));
        }
        let account = self
            .accounts
            .find(identity)
            .await
            .map_err(map_account_error)?
            .ok_or_else(|| Error::account_not_found(format!("no account for identity {identity}")))?;
        Ok(IntentStatusReport { intent, account })
    }
}

#[cfg(test)]
#[path = "credit_reconciler_tests.rs"]
mod tests;
