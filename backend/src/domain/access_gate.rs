//! Per-request authorization and spend decision.
//!
//! The balance check and the debit are one store operation: the gate never
//! reads a balance and then writes it back, so two concurrent requests
//! cannot both pass against the same tokens.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::ports::{AccountRepository, AccountRepositoryError};
use crate::domain::repository_errors::map_account_error;
use crate::domain::{
    AccountIdentity, Error, Operation, OperationPricing, SessionResolution, TokenAmount,
    TokenBalance, TokenDelta,
};

/// A debit applied on behalf of an allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debit {
    pub identity: AccountIdentity,
    pub amount: TokenAmount,
    pub balance_after: TokenBalance,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    InsufficientBalance,
}

impl DenyReason {
    /// Domain error reported to the caller for this refusal.
    pub fn into_error(self) -> Error {
        match self {
            Self::Unauthenticated => Error::unauthenticated("login required"),
            Self::InsufficientBalance => Error::insufficient_balance("token balance too low"),
        }
    }
}

/// Outcome of [`AccessGate::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Allowed; the debit has already been applied.
    Allow(Debit),
    Deny(DenyReason),
}

#[derive(Clone)]
pub struct AccessGate {
    accounts: Arc<dyn AccountRepository>,
    pricing: OperationPricing,
}

impl AccessGate {
    pub fn new(accounts: Arc<dyn AccountRepository>, pricing: OperationPricing) -> Self {
        Self { accounts, pricing }
    }

    pub fn pricing(&self) -> OperationPricing {
        self.pricing
    }

    /// Decide whether the resolved caller may run `operation`, debiting its
    /// cost on allow.
    pub async fn authorize(
        &self,
        resolution: &SessionResolution,
        operation: Operation,
    ) -> Result<AccessDecision, Error> {
        let Some(account) = resolution.account() else {
            return Ok(AccessDecision::Deny(DenyReason::Unauthenticated));
        };
        let cost = self.pricing.cost_of(operation);
        let identity = account.identity();

        match self
            .accounts
            .apply_delta(identity, TokenDelta::Debit(cost))
            .await
        {
            Ok(updated) => {
                info!(
                    identity = %identity,
                    operation = operation.as_str(),
                    cost = cost.get(),
                    balance = %updated.token_balance(),
                    "debit applied"
                );
                Ok(AccessDecision::Allow(Debit {
                    identity: identity.clone(),
                    amount: cost,
                    balance_after: updated.token_balance(),
                }))
            }
            Err(AccountRepositoryError::InsufficientBalance { .. }) => {
                info!(identity = %identity, operation = operation.as_str(), cost = cost.get(), "insufficient balance");
                Ok(AccessDecision::Deny(DenyReason::InsufficientBalance))
            }
            Err(AccountRepositoryError::NotFound { .. }) => {
                warn!(identity = %identity, "authorize for vanished account");
                Ok(AccessDecision::Deny(DenyReason::Unauthenticated))
            }
            Err(err) => Err(map_account_error(err)),
        }
    }

    /// Return a debit's tokens after a failed operation.
    pub async fn refund(&self, debit: &Debit) -> Result<TokenBalance, Error> {
        match self
            .accounts
            .apply_delta(&debit.identity, TokenDelta::Credit(debit.amount))
            .await
        {
            Ok(account) => {
                warn!(
                    identity = %debit.identity,
                    amount = debit.amount.get(),
                    balance = %account.token_balance(),
                    "debit refunded"
                );
                Ok(account.token_balance())
            }
            Err(err) => {
                error!(
                    identity = %debit.identity,
                    amount = debit.amount.get(),
                    error = %err,
                    "refund failed"
                );
                Err(map_account_error(err))
            }
        }
    }
}
