//! Port abstraction for pending purchase intents.
//!
//! Redemption is a single operation on this port rather than a sequence of
//! calls across two ports: marking the intent consumed and crediting the
//! owning account must commit together or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Account, PurchaseIntent, PurchaseIntentId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by purchase intent adapters.
    pub enum PurchaseIntentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "purchase intent repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "purchase intent repository query failed: {message}",
        /// An intent with this id is already recorded.
        DuplicateIntent { intent_id: String } => "purchase intent {intent_id} already exists",
        /// No intent exists for the id.
        UnknownIntent { intent_id: String } => "no purchase intent {intent_id}",
        /// The intent's account no longer exists.
        AccountNotFound { identity: String } => "no account exists for identity {identity}",
    }
}

/// Result of an attempt to redeem an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The intent was pending and its tokens were credited.
    Credited(Account),
    /// The intent had already been redeemed; nothing changed.
    AlreadyRedeemed,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseIntentRepository: Send + Sync {
    /// Record a pending intent.
    async fn insert(&self, intent: &PurchaseIntent) -> Result<(), PurchaseIntentRepositoryError>;

    /// Fetch an intent by id.
    async fn find(
        &self,
        id: &PurchaseIntentId,
    ) -> Result<Option<PurchaseIntent>, PurchaseIntentRepositoryError>;

    /// Mark the intent consumed at `consumed_at` and credit its tokens to the
    /// owning account, atomically.
    async fn redeem(
        &self,
        id: &PurchaseIntentId,
        consumed_at: DateTime<Utc>,
    ) -> Result<RedeemOutcome, PurchaseIntentRepositoryError>;
}
