//! Domain ports defining the edges of the hexagon.
//!
//! Driven adapters (databases, OAuth, payments, the completion API) implement
//! these traits. Each exposes a typed error enum so adapters map their
//! failures into predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod account_repository;
mod completion_provider;
mod identity_provider;
mod payment_provider;
mod purchase_intent_repository;
mod session_repository;

#[cfg(test)]
pub use account_repository::MockAccountRepository;
pub use account_repository::{AccountRepository, AccountRepositoryError};
#[cfg(test)]
pub use completion_provider::MockCompletionProvider;
pub use completion_provider::{
    CompletionProvider, CompletionProviderError, FixtureCompletionProvider,
};
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{FixtureIdentityProvider, IdentityProvider, IdentityProviderError};
#[cfg(test)]
pub use payment_provider::{MockPaymentEventVerifier, MockPaymentProvider};
pub use payment_provider::{
    CHECKOUT_ID_PLACEHOLDER, CheckoutRequest, FixturePaymentProvider, PaymentEventError,
    PaymentEventVerifier, PaymentProvider, PaymentProviderError,
};
#[cfg(test)]
pub use purchase_intent_repository::MockPurchaseIntentRepository;
pub use purchase_intent_repository::{
    PurchaseIntentRepository, PurchaseIntentRepositoryError, RedeemOutcome,
};
#[cfg(test)]
pub use session_repository::MockSessionRepository;
pub use session_repository::{SessionRepository, SessionRepositoryError};
