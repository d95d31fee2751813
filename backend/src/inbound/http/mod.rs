//! HTTP inbound adapter exposing the token-gate endpoints.

pub mod account;
pub mod completion;
pub mod error;
pub mod health;
pub mod purchases;
pub mod routes;
pub mod session;
pub mod session_config;
pub mod sessions;
pub mod state;
#[cfg(test)]
pub mod test_utils;

pub use error::ApiResult;
