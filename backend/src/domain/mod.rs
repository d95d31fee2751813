//! Domain primitives, services and ports.
//!
//! Purpose: hold the token-account invariants independent of transport and
//! storage. Inbound adapters call the services; outbound adapters implement
//! the ports.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Account, Session, PurchaseIntent and their value types.
//! - SessionAuthenticator, CreditReconciler, AccessGate,
//!   CompletionDispatcher: the services.

pub mod access_gate;
pub mod account;
pub mod completion;
pub mod completion_dispatcher;
pub mod credit_reconciler;
pub mod error;
pub mod ports;
pub mod purchase;
mod repository_errors;
pub mod session;
pub mod session_authenticator;
pub mod trace_id;

pub use self::access_gate::{AccessDecision, AccessGate, Debit, DenyReason};
pub use self::account::{
    Account, AccountIdentity, AccountValidationError, TokenAmount, TokenBalance, TokenDelta,
};
pub use self::completion::{
    CompletionReceipt, Operation, OperationPricing, Prompt, PromptValidationError,
};
pub use self::completion_dispatcher::{
    CompletionDispatcher, DEFAULT_COMPLETION_TIMEOUT, RefundRetry,
};
pub use self::credit_reconciler::{CreditReconciler, IntentStatusReport, PurchaseRedirects};
pub use self::error::{Error, ErrorCode, ErrorValidationError, ProviderKind};
pub use self::purchase::{
    ConfirmationOutcome, InitiatedPurchase, IntentStatus, MAX_TOKENS_PER_PURCHASE, PaymentEvent,
    PaymentStatus, PurchaseIntent, PurchaseIntentId, PurchaseRequest, PurchaseValidationError,
};
pub use self::session::{
    ExternalProfile, OAuthState, Session, SessionId, SessionResolution, SessionValidationError,
};
pub use self::session_authenticator::{DEFAULT_SESSION_TTL, LoginOutcome, SessionAuthenticator};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use tokengate::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::unauthenticated("login required"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
