//! In-memory account store with one lock per account.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::domain::ports::{AccountRepository, AccountRepositoryError};
use crate::domain::{Account, AccountIdentity, ExternalProfile, TokenBalance, TokenDelta};

type AccountCell = Arc<Mutex<Account>>;

/// Accounts keyed by identity.
///
/// The outer map lock is taken only to find or insert a cell; balance
/// changes lock the single account they touch.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<AccountIdentity, AccountCell>>,
}

fn poisoned() -> AccountRepositoryError {
    AccountRepositoryError::query("account store lock poisoned")
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, identity: &AccountIdentity) -> Result<Option<AccountCell>, AccountRepositoryError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(identity).cloned())
    }

    /// Apply `delta` under the account's lock.
    ///
    /// Synchronous so callers holding other in-memory locks can compose it
    /// into a single critical section.
    pub(crate) fn apply_delta_now(
        &self,
        identity: &AccountIdentity,
        delta: TokenDelta,
    ) -> Result<Account, AccountRepositoryError> {
        let cell = self
            .cell(identity)?
            .ok_or_else(|| AccountRepositoryError::not_found(identity.as_ref()))?;
        let mut account = cell.lock().map_err(|_| poisoned())?;
        let balance = account
            .token_balance()
            .checked_apply(delta)
            .ok_or_else(|| match delta {
                TokenDelta::Debit(_) => AccountRepositoryError::insufficient_balance(identity.as_ref()),
                TokenDelta::Credit(_) => AccountRepositoryError::query("token balance overflow"),
            })?;
        *account = account.clone().with_balance(balance);
        Ok(account.clone())
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountStore {
    async fn get_or_create(
        &self,
        profile: &ExternalProfile,
    ) -> Result<Account, AccountRepositoryError> {
        if let Some(cell) = self.cell(profile.subject())? {
            let account = cell.lock().map_err(|_| poisoned())?;
            return Ok(account.clone());
        }
        let cell = {
            let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
            accounts
                .entry(profile.subject().clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(Account::new(
                        profile.subject().clone(),
                        profile.display_name(),
                        profile.email(),
                        TokenBalance::ZERO,
                    )))
                })
                .clone()
        };
        let account = cell.lock().map_err(|_| poisoned())?;
        Ok(account.clone())
    }

    async fn find(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Option<Account>, AccountRepositoryError> {
        match self.cell(identity)? {
            Some(cell) => {
                let account = cell.lock().map_err(|_| poisoned())?;
                Ok(Some(account.clone()))
            }
            None => Ok(None),
        }
    }

    async fn apply_delta(
        &self,
        identity: &AccountIdentity,
        delta: TokenDelta,
    ) -> Result<Account, AccountRepositoryError> {
        self.apply_delta_now(identity, delta)
    }
}
