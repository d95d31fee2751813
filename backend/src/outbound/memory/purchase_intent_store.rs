//! In-memory purchase intents that redeem against a [`MemoryAccountStore`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryAccountStore;
use crate::domain::ports::{
    AccountRepositoryError, PurchaseIntentRepository, PurchaseIntentRepositoryError,
    RedeemOutcome,
};
use crate::domain::{PurchaseIntent, PurchaseIntentId, TokenDelta};

/// Intents keyed by provider id.
///
/// Redemption holds the intent map lock while crediting, so marking an
/// intent consumed and crediting its account form one critical section.
/// Lock order is always intents, then account.
#[derive(Debug)]
pub struct MemoryPurchaseIntentStore {
    intents: Mutex<HashMap<PurchaseIntentId, PurchaseIntent>>,
    accounts: Arc<MemoryAccountStore>,
}

fn poisoned() -> PurchaseIntentRepositoryError {
    PurchaseIntentRepositoryError::query("purchase intent store lock poisoned")
}

impl MemoryPurchaseIntentStore {
    pub fn new(accounts: Arc<MemoryAccountStore>) -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            accounts,
        }
    }
}

#[async_trait]
impl PurchaseIntentRepository for MemoryPurchaseIntentStore {
    async fn insert(&self, intent: &PurchaseIntent) -> Result<(), PurchaseIntentRepositoryError> {
        let mut intents = self.intents.lock().map_err(|_| poisoned())?;
        if intents.contains_key(intent.id()) {
            return Err(PurchaseIntentRepositoryError::duplicate_intent(
                intent.id().as_ref(),
            ));
        }
        intents.insert(intent.id().clone(), intent.clone());
        Ok(())
    }

    async fn find(
        &self,
        id: &PurchaseIntentId,
    ) -> Result<Option<PurchaseIntent>, PurchaseIntentRepositoryError> {
        let intents = self.intents.lock().map_err(|_| poisoned())?;
        Ok(intents.get(id).cloned())
    }

    async fn redeem(
        &self,
        id: &PurchaseIntentId,
        consumed_at: DateTime<Utc>,
    ) -> Result<RedeemOutcome, PurchaseIntentRepositoryError> {
        let mut intents = self.intents.lock().map_err(|_| poisoned())?;
        let intent = intents
            .get_mut(id)
            .ok_or_else(|| PurchaseIntentRepositoryError::unknown_intent(id.as_ref()))?;
        if intent.consumed_at().is_some() {
            return Ok(RedeemOutcome::AlreadyRedeemed);
        }

        let account = self
            .accounts
            .apply_delta_now(
                intent.identity(),
                TokenDelta::Credit(intent.tokens_requested()),
            )
            .map_err(|err| match err {
                AccountRepositoryError::NotFound { identity } => {
                    PurchaseIntentRepositoryError::account_not_found(identity)
                }
                other => PurchaseIntentRepositoryError::query(other.to_string()),
            })?;
        intent.mark_consumed(consumed_at);
        Ok(RedeemOutcome::Credited(account))
    }
}
