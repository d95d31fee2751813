//! Purchase intents and payment confirmations.
//!
//! An intent is recorded when checkout starts and is keyed by the
//! identifier the payment provider echoes back on success. It can be
//! redeemed exactly once; redemption is the only path that credits an
//! account from a payment.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::account::FIELD_MAX;
use super::{Account, AccountIdentity, TokenAmount};

/// Largest number of tokens a single checkout may request.
pub const MAX_TOKENS_PER_PURCHASE: u32 = 1_000_000;

/// Validation errors for purchase primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseValidationError {
    EmptyIntentId,
    InvalidIntentId,
    IntentIdTooLong { max: usize },
    TokensOutOfRange { min: u32, max: u32 },
    NonPositivePrice,
}

impl fmt::Display for PurchaseValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIntentId => write!(f, "purchase intent id must not be empty"),
            Self::InvalidIntentId => {
                write!(f, "purchase intent id must not contain whitespace or control characters")
            }
            Self::IntentIdTooLong { max } => {
                write!(f, "purchase intent id must be at most {max} characters")
            }
            Self::TokensOutOfRange { min, max } => {
                write!(f, "tokens must be between {min} and {max}")
            }
            Self::NonPositivePrice => write!(f, "price must be greater than zero"),
        }
    }
}

impl std::error::Error for PurchaseValidationError {}

/// Opaque, provider-issued purchase identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PurchaseIntentId(String);

impl PurchaseIntentId {
    /// # Examples
    /// ```
    /// use tokengate::domain::PurchaseIntentId;
    ///
    /// assert!(PurchaseIntentId::new("cs_test_a1b2c3").is_ok());
    /// assert!(PurchaseIntentId::new("").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, PurchaseValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PurchaseValidationError::EmptyIntentId);
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(PurchaseValidationError::InvalidIntentId);
        }
        if id.chars().count() > FIELD_MAX {
            return Err(PurchaseValidationError::IntentIdTooLong { max: FIELD_MAX });
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for PurchaseIntentId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PurchaseIntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PurchaseIntentId> for String {
    fn from(value: PurchaseIntentId) -> Self {
        value.0
    }
}

impl TryFrom<String> for PurchaseIntentId {
    type Error = PurchaseValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Validated checkout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseRequest {
    tokens: TokenAmount,
    price_minor_units: u64,
}

impl PurchaseRequest {
    pub fn new(tokens: u32, price_minor_units: u64) -> Result<Self, PurchaseValidationError> {
        let out_of_range = PurchaseValidationError::TokensOutOfRange {
            min: 1,
            max: MAX_TOKENS_PER_PURCHASE,
        };
        if tokens > MAX_TOKENS_PER_PURCHASE {
            return Err(out_of_range);
        }
        let tokens = TokenAmount::new(tokens).map_err(|_| out_of_range)?;
        if price_minor_units == 0 {
            return Err(PurchaseValidationError::NonPositivePrice);
        }
        Ok(Self {
            tokens,
            price_minor_units,
        })
    }

    pub fn tokens(&self) -> TokenAmount {
        self.tokens
    }

    pub fn price_minor_units(&self) -> u64 {
        self.price_minor_units
    }
}

/// Redemption state of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Consumed,
}

/// A registered, not-yet-confirmed purchase.
///
/// ## Invariants
/// - `consumed_at` transitions from `None` to `Some` at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseIntent {
    id: PurchaseIntentId,
    identity: AccountIdentity,
    tokens_requested: TokenAmount,
    price_minor_units: u64,
    created_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
}

impl PurchaseIntent {
    pub fn pending(
        id: PurchaseIntentId,
        identity: AccountIdentity,
        request: PurchaseRequest,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            identity,
            tokens_requested: request.tokens(),
            price_minor_units: request.price_minor_units(),
            created_at,
            consumed_at: None,
        }
    }

    /// Rebuild a stored intent.
    pub fn restore(
        id: PurchaseIntentId,
        identity: AccountIdentity,
        tokens_requested: TokenAmount,
        price_minor_units: u64,
        created_at: DateTime<Utc>,
        consumed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            identity,
            tokens_requested,
            price_minor_units,
            created_at,
            consumed_at,
        }
    }

    pub fn id(&self) -> &PurchaseIntentId {
        &self.id
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    pub fn tokens_requested(&self) -> TokenAmount {
        self.tokens_requested
    }

    pub fn price_minor_units(&self) -> u64 {
        self.price_minor_units
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn consumed_at(&self) -> Option<DateTime<Utc>> {
        self.consumed_at
    }

    pub fn status(&self) -> IntentStatus {
        if self.consumed_at.is_some() {
            IntentStatus::Consumed
        } else {
            IntentStatus::Pending
        }
    }

    pub(crate) fn mark_consumed(&mut self, at: DateTime<Utc>) {
        self.consumed_at.get_or_insert(at);
    }
}

/// Payment state reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

/// Authenticated payment notification from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    intent_id: PurchaseIntentId,
    identity: AccountIdentity,
    status: PaymentStatus,
}

impl PaymentEvent {
    pub fn new(intent_id: PurchaseIntentId, identity: AccountIdentity, status: PaymentStatus) -> Self {
        Self {
            intent_id,
            identity,
            status,
        }
    }

    pub fn intent_id(&self) -> &PurchaseIntentId {
        &self.intent_id
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }
}

/// Checkout session opened with the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedPurchase {
    pub intent_id: PurchaseIntentId,
    pub redirect_url: String,
}

/// Successful outcome of a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The intent was redeemed by this call.
    Credited(Account),
    /// The intent had already been redeemed; nothing changed.
    AlreadyConsumed(Account),
}

impl ConfirmationOutcome {
    pub fn account(&self) -> &Account {
        match self {
            Self::Credited(account) | Self::AlreadyConsumed(account) => account,
        }
    }

    pub fn into_account(self) -> Account {
        match self {
            Self::Credited(account) | Self::AlreadyConsumed(account) => account,
        }
    }
}
