//! In-process stores used when no database is configured and in tests.
//!
//! State is lost on restart. Locks are held only for in-memory work, never
//! across an `.await`.

mod account_store;
mod purchase_intent_store;
mod session_store;

pub use account_store::MemoryAccountStore;
pub use purchase_intent_store::MemoryPurchaseIntentStore;
pub use session_store::MemorySessionStore;
