//! Wire shapes for the token and userinfo endpoints.

use serde::Deserialize;

use crate::domain::{AccountIdentity, ExternalProfile};

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponseDto {
    pub(super) access_token: String,
}

/// OpenID Connect userinfo claims.
#[derive(Debug, Deserialize)]
pub(super) struct UserInfoDto {
    pub(super) sub: String,
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) email: Option<String>,
}

impl UserInfoDto {
    pub(super) fn into_profile(self) -> Result<ExternalProfile, String> {
        let subject = AccountIdentity::new(self.sub).map_err(|err| err.to_string())?;
        let email = self.email.unwrap_or_default();
        let display_name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        Ok(ExternalProfile::new(subject, display_name, email))
    }
}
