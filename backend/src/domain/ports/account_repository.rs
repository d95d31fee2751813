//! Port abstraction for the account store.
//!
//! The account store is the single mutable shared resource and the source of
//! truth for balances. Implementations must make `apply_delta` all-or-nothing
//! and serialise it per account, while leaving different accounts free of
//! contention.

use async_trait::async_trait;

use crate::domain::{Account, AccountIdentity, ExternalProfile, TokenDelta};

use super::define_port_error;

define_port_error! {
    /// Errors raised by account store adapters.
    pub enum AccountRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "account repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "account repository query failed: {message}",
        /// No account exists for the identity.
        NotFound { identity: String } => "no account exists for identity {identity}",
        /// A debit would take the balance below zero.
        InsufficientBalance { identity: String } => "insufficient token balance for identity {identity}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Return the account for the profile's subject, creating it with a zero
    /// balance on first sight.
    ///
    /// Concurrent calls for the same subject must converge on one account.
    async fn get_or_create(
        &self,
        profile: &ExternalProfile,
    ) -> Result<Account, AccountRepositoryError>;

    /// Fetch an account by identity.
    async fn find(
        &self,
        identity: &AccountIdentity,
    ) -> Result<Option<Account>, AccountRepositoryError>;

    /// Atomically apply `delta` and return the updated account.
    ///
    /// Fails with [`AccountRepositoryError::InsufficientBalance`] without
    /// changing anything when a debit exceeds the balance.
    async fn apply_delta(
        &self,
        identity: &AccountIdentity,
        delta: TokenDelta,
    ) -> Result<Account, AccountRepositoryError>;
}
