//! Account data model: identity, descriptive profile and token balance.
//!
//! Balances only move through [`TokenDelta`] values computed on the server.
//! No constructor accepts an absolute balance from a caller other than a
//! persistence adapter rehydrating a stored row.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Longest accepted identity or descriptive field, in characters.
pub const FIELD_MAX: usize = 255;

/// Validation errors for account primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyIdentity,
    InvalidIdentity,
    IdentityTooLong { max: usize },
    ZeroTokenAmount,
    NegativeBalance { stored: i64 },
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIdentity => write!(f, "identity must not be empty"),
            Self::InvalidIdentity => {
                write!(f, "identity must not contain whitespace or control characters")
            }
            Self::IdentityTooLong { max } => write!(f, "identity must be at most {max} characters"),
            Self::ZeroTokenAmount => write!(f, "token amount must be greater than zero"),
            Self::NegativeBalance { stored } => {
                write!(f, "stored token balance {stored} is negative")
            }
        }
    }
}

impl std::error::Error for AccountValidationError {}

/// Stable subject identifier issued by the external OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountIdentity(String);

impl AccountIdentity {
    /// Validate and construct an identity.
    ///
    /// # Examples
    /// ```
    /// use tokengate::domain::AccountIdentity;
    ///
    /// assert!(AccountIdentity::new("109876543210").is_ok());
    /// assert!(AccountIdentity::new(" padded ").is_err());
    /// ```
    pub fn new(identity: impl Into<String>) -> Result<Self, AccountValidationError> {
        let identity = identity.into();
        if identity.is_empty() {
            return Err(AccountValidationError::EmptyIdentity);
        }
        if identity
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(AccountValidationError::InvalidIdentity);
        }
        if identity.chars().count() > FIELD_MAX {
            return Err(AccountValidationError::IdentityTooLong { max: FIELD_MAX });
        }
        Ok(Self(identity))
    }
}

impl AsRef<str> for AccountIdentity {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<AccountIdentity> for String {
    fn from(value: AccountIdentity) -> Self {
        value.0
    }
}

impl TryFrom<String> for AccountIdentity {
    type Error = AccountValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Strictly positive number of tokens moved by a single credit or debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TokenAmount(NonZeroU32);

impl TokenAmount {
    pub const MIN: Self = Self(NonZeroU32::MIN);

    pub fn new(tokens: u32) -> Result<Self, AccountValidationError> {
        NonZeroU32::new(tokens)
            .map(Self)
            .ok_or(AccountValidationError::ZeroTokenAmount)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TokenAmount> for u32 {
    fn from(value: TokenAmount) -> Self {
        value.get()
    }
}

impl TryFrom<u32> for TokenAmount {
    type Error = AccountValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Relative balance change. Credits come from confirmed purchases and
/// refunds; debits come from metered operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDelta {
    Credit(TokenAmount),
    Debit(TokenAmount),
}

impl TokenDelta {
    /// Signed representation used by storage adapters.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Credit(amount) => i64::from(amount.get()),
            Self::Debit(amount) => -i64::from(amount.get()),
        }
    }

    pub fn amount(self) -> TokenAmount {
        match self {
            Self::Credit(amount) | Self::Debit(amount) => amount,
        }
    }
}

/// Non-negative prepaid token balance.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct TokenBalance(u64);

impl TokenBalance {
    pub const ZERO: Self = Self(0);

    /// Rehydrate a balance read from storage.
    pub fn from_stored(stored: i64) -> Result<Self, AccountValidationError> {
        u64::try_from(stored)
            .map(Self)
            .map_err(|_| AccountValidationError::NegativeBalance { stored })
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Whether a debit of `amount` would leave the balance non-negative.
    ///
    /// # Examples
    /// ```
    /// use tokengate::domain::{TokenAmount, TokenBalance, TokenDelta};
    ///
    /// let ten = TokenAmount::new(10).unwrap();
    /// let balance = TokenBalance::ZERO.checked_apply(TokenDelta::Credit(ten)).unwrap();
    /// assert!(balance.covers(ten));
    /// assert!(balance.checked_apply(TokenDelta::Debit(ten)).is_some());
    /// ```
    pub fn covers(self, amount: TokenAmount) -> bool {
        self.0 >= u64::from(amount.get())
    }

    /// Apply `delta`, returning `None` when the result would be negative or
    /// overflow.
    pub fn checked_apply(self, delta: TokenDelta) -> Option<Self> {
        match delta {
            TokenDelta::Credit(amount) => self.0.checked_add(u64::from(amount.get())).map(Self),
            TokenDelta::Debit(amount) => self.0.checked_sub(u64::from(amount.get())).map(Self),
        }
    }
}

impl fmt::Display for TokenBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's prepaid token account.
///
/// ## Invariants
/// - `token_balance` is never negative.
/// - `identity` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    identity: AccountIdentity,
    display_name: String,
    email: String,
    token_balance: TokenBalance,
}

impl Account {
    pub fn new(
        identity: AccountIdentity,
        display_name: impl Into<String>,
        email: impl Into<String>,
        token_balance: TokenBalance,
    ) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            email: email.into(),
            token_balance,
        }
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn token_balance(&self) -> TokenBalance {
        self.token_balance
    }

    /// Copy of this account carrying `balance`. Used by stores after a
    /// successful delta.
    pub(crate) fn with_balance(mut self, balance: TokenBalance) -> Self {
        self.token_balance = balance;
        self
    }
}
