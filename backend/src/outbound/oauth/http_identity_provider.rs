//! Reqwest-backed OAuth identity provider.
//!
//! Builds the consent redirect, exchanges the returned code at the token
//! endpoint and reads the caller's profile from the userinfo endpoint.
//! Defaults target Google's OpenID Connect endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use zeroize::Zeroizing;

use super::dto::{TokenResponseDto, UserInfoDto};
use crate::domain::ports::{IdentityProvider, IdentityProviderError};
use crate::domain::{ExternalProfile, OAuthState};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const DEFAULT_SCOPE: &str = "openid email profile";

/// Provider endpoints.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize: Url,
    pub token: Url,
    pub userinfo: Url,
}

impl OAuthEndpoints {
    /// Google's OpenID Connect endpoints.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the constants are valid URLs.
    pub fn google() -> Result<Self, url::ParseError> {
        Ok(Self {
            authorize: Url::parse(GOOGLE_AUTHORIZE_URL)?,
            token: Url::parse(GOOGLE_TOKEN_URL)?,
            userinfo: Url::parse(GOOGLE_USERINFO_URL)?,
        })
    }
}

/// Registered client credentials and callback.
#[derive(Clone)]
pub struct OAuthClientSettings {
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    /// Absolute URL of `/session/login-callback`.
    pub redirect_url: Url,
}

pub struct HttpIdentityProvider {
    client: Client,
    endpoints: OAuthEndpoints,
    settings: OAuthClientSettings,
}

impl HttpIdentityProvider {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoints: OAuthEndpoints,
        settings: OAuthClientSettings,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoints,
            settings,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, IdentityProviderError> {
        let response = self
            .client
            .post(self.endpoints.token.clone())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("redirect_uri", self.settings.redirect_url.as_str()),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error("token exchange", status));
        }
        let token: TokenResponseDto = serde_json::from_slice(&body).map_err(|err| {
            IdentityProviderError::transport(format!("invalid token response: {err}"))
        })?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, IdentityProviderError> {
        let response = self
            .client
            .get(self.endpoints.userinfo.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error("userinfo", status));
        }
        parse_profile(&body)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn authorization_url(&self, state: &OAuthState) -> String {
        let mut url = self.endpoints.authorize.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", self.settings.redirect_url.as_str())
            .append_pair("scope", DEFAULT_SCOPE)
            .append_pair("state", state.as_str());
        url.into()
    }

    async fn resolve(&self, code: &str) -> Result<ExternalProfile, IdentityProviderError> {
        if code.trim().is_empty() {
            return Err(IdentityProviderError::auth_failed("authorization code is empty"));
        }
        let access_token = Zeroizing::new(self.exchange_code(code).await?);
        self.fetch_profile(&access_token).await
    }
}

fn parse_profile(body: &[u8]) -> Result<ExternalProfile, IdentityProviderError> {
    let info: UserInfoDto = serde_json::from_slice(body).map_err(|err| {
        IdentityProviderError::transport(format!("invalid userinfo response: {err}"))
    })?;
    info.into_profile().map_err(IdentityProviderError::auth_failed)
}

fn map_transport_error(error: reqwest::Error) -> IdentityProviderError {
    IdentityProviderError::transport(error.to_string())
}

/// 4xx from the provider means the code or credentials were refused.
fn map_status_error(step: &str, status: StatusCode) -> IdentityProviderError {
    let message = format!("{step} returned status {}", status.as_u16());
    if status.is_client_error() {
        IdentityProviderError::auth_failed(message)
    } else {
        IdentityProviderError::transport(message)
    }
}
