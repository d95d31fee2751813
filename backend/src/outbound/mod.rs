//! Outbound adapters implementing the domain ports.
//!
//! - **persistence**: PostgreSQL repositories using Diesel
//! - **memory**: in-process repositories for database-less runs and tests
//! - **oauth**, **payments**, **completion**: reqwest clients for the
//!   identity, payment and completion providers
//!
//! Adapters translate between domain types and wire or row formats. They
//! hold no business rules.

pub mod completion;
pub mod memory;
pub mod oauth;
pub mod payments;
pub mod persistence;
