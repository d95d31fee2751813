//! Port for the external OAuth identity provider.
//!
//! The provider owns the authorization-code exchange. This service only
//! builds the consent redirect and turns a returned code into a verified
//! [`ExternalProfile`].

use async_trait::async_trait;

use crate::domain::{AccountIdentity, ExternalProfile, OAuthState};

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity provider adapters.
    pub enum IdentityProviderError {
        /// The provider rejected the code or returned an unusable profile.
        AuthFailed { message: String } => "identity provider rejected the login: {message}",
        /// The provider could not be reached.
        Transport { message: String } => "identity provider unreachable: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent URL the browser is redirected to, carrying `state`.
    fn authorization_url(&self, state: &OAuthState) -> String;

    /// Exchange an authorization code for the caller's verified profile.
    async fn resolve(&self, code: &str) -> Result<ExternalProfile, IdentityProviderError>;
}

/// Development identity provider that trusts the code as the subject.
///
/// The consent step is skipped: the authorization URL points straight back
/// at the callback with `code=demo`. Anyone can log in as any subject, so
/// the server only wires it in debug builds or behind an explicit opt-in.
#[derive(Debug, Clone)]
pub struct FixtureIdentityProvider {
    callback_url: String,
}

impl FixtureIdentityProvider {
    pub fn new(callback_url: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
        }
    }
}

impl Default for FixtureIdentityProvider {
    fn default() -> Self {
        Self::new("/session/login-callback")
    }
}

#[async_trait]
impl IdentityProvider for FixtureIdentityProvider {
    fn authorization_url(&self, state: &OAuthState) -> String {
        format!("{}?code=demo&state={}", self.callback_url, state.as_str())
    }

    async fn resolve(&self, code: &str) -> Result<ExternalProfile, IdentityProviderError> {
        let subject = AccountIdentity::new(code)
            .map_err(|err| IdentityProviderError::auth_failed(err.to_string()))?;
        Ok(ExternalProfile::new(
            subject,
            format!("Fixture user {code}"),
            format!("{code}@example.test"),
        ))
    }
}
