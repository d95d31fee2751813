//! PostgreSQL persistence adapters using Diesel.
//!
//! Repositories translate between Diesel rows and domain types and nothing
//! more. Row structs and the schema stay private to this module; database
//! failures are mapped to the port error of each repository.

mod diesel_account_repository;
mod diesel_error_mapping;
mod diesel_purchase_intent_repository;
mod diesel_session_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_account_repository::DieselAccountRepository;
pub use diesel_purchase_intent_repository::DieselPurchaseIntentRepository;
pub use diesel_session_repository::DieselSessionRepository;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
