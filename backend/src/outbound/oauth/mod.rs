//! OAuth 2.0 authorization-code identity provider over HTTP.

mod dto;
mod http_identity_provider;

pub use http_identity_provider::{HttpIdentityProvider, OAuthClientSettings, OAuthEndpoints};
