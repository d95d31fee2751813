//! Session-gated, prepaid-token access to a metered completion API.
//!
//! The crate is organised as a hexagon: [`domain`] holds the account,
//! session and purchase invariants and the ports they need; [`inbound`]
//! exposes them over HTTP; [`outbound`] implements the ports against
//! PostgreSQL, OAuth, payment and completion providers.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[cfg(test)]
mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
