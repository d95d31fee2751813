//! Application settings loaded via OrthoConfig, and the resolved server
//! configuration built from them.

use std::net::SocketAddr;
use std::time::Duration;

use actix_web::cookie::{Key, SameSite};
use chrono::TimeDelta;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use tokengate::domain::{DEFAULT_COMPLETION_TIMEOUT, DEFAULT_SESSION_TTL, TokenAmount};
use tokengate::inbound::http::session_config::BuildMode;
use tokengate::inbound::http::state::DEFAULT_AFTER_LOGIN_URL;
use tokengate::middleware::{AllowedOrigins, OriginParseError};
use tokengate::outbound::completion::DEFAULT_COMPLETION_MODEL;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4000";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:4000";
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_PRODUCT_NAME: &str = "API tokens";

/// Settings read from `TOKENGATE_*` environment variables, CLI flags and
/// configuration files.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TOKENGATE")]
pub struct AppSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// Externally visible base URL; OAuth and checkout redirects hang off it.
    pub public_base_url: Option<String>,
    /// PostgreSQL URL. In-memory stores are used when absent.
    pub database_url: Option<String>,
    /// Server-side session lifetime in days.
    pub session_ttl_days: Option<u32>,
    /// Where the browser lands after a successful login.
    pub after_login_url: Option<String>,
    /// Token cost of one completion call.
    pub completion_cost: Option<u32>,
    /// Upper bound on one completion call, in seconds.
    pub completion_timeout_secs: Option<u64>,
    pub completion_model: Option<String>,
    pub completion_endpoint: Option<String>,
    pub completion_api_key: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub oauth_redirect_url: Option<String>,
    pub payment_secret_key: Option<String>,
    pub payment_webhook_secret: Option<String>,
    /// ISO 4217 currency for checkout line items.
    pub payment_currency: Option<String>,
    pub payment_product_name: Option<String>,
    /// Comma separated `scheme://host[:port]` origins allowed to call the API.
    pub allowed_origins: Option<String>,
    /// Timeout for OAuth and payment provider calls, in seconds.
    pub provider_timeout_secs: Option<u64>,
    /// Permit the in-process identity, payment and completion stand-ins in
    /// release builds. They trust the caller, so this is for demos only.
    pub allow_fixture_providers: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error(transparent)]
    Origins(#[from] OriginParseError),
}

fn invalid(name: &'static str, err: impl ToString) -> SettingsError {
    SettingsError::Invalid {
        name,
        message: err.to_string(),
    }
}

impl AppSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .map_err(|err| invalid("bind_addr", err))
    }

    pub fn public_base_url(&self) -> Result<Url, SettingsError> {
        Url::parse(
            self.public_base_url
                .as_deref()
                .unwrap_or(DEFAULT_PUBLIC_BASE_URL),
        )
        .map_err(|err| invalid("public_base_url", err))
    }

    /// Resolve a path against the public base URL.
    pub fn public_url(&self, path: &str) -> Result<Url, SettingsError> {
        self.public_base_url()?
            .join(path)
            .map_err(|err| invalid("public_base_url", err))
    }

    pub fn session_ttl(&self) -> TimeDelta {
        self.session_ttl_days
            .filter(|days| *days > 0)
            .map_or(DEFAULT_SESSION_TTL, |days| TimeDelta::days(i64::from(days)))
    }

    pub fn after_login_url(&self) -> &str {
        self.after_login_url
            .as_deref()
            .unwrap_or(DEFAULT_AFTER_LOGIN_URL)
    }

    pub fn completion_cost(&self) -> Result<TokenAmount, SettingsError> {
        TokenAmount::new(self.completion_cost.unwrap_or(1))
            .map_err(|err| invalid("completion_cost", err))
    }

    pub fn completion_timeout(&self) -> Duration {
        self.completion_timeout_secs
            .map_or(DEFAULT_COMPLETION_TIMEOUT, Duration::from_secs)
    }

    pub fn completion_model(&self) -> &str {
        self.completion_model
            .as_deref()
            .unwrap_or(DEFAULT_COMPLETION_MODEL)
    }

    pub fn payment_currency(&self) -> String {
        self.payment_currency
            .as_deref()
            .unwrap_or(DEFAULT_CURRENCY)
            .to_ascii_lowercase()
    }

    pub fn payment_product_name(&self) -> &str {
        self.payment_product_name
            .as_deref()
            .unwrap_or(DEFAULT_PRODUCT_NAME)
    }

    pub fn allowed_origins(&self) -> Result<AllowedOrigins, SettingsError> {
        Ok(AllowedOrigins::parse(
            self.allowed_origins.as_deref().unwrap_or_default(),
        )?)
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout_secs
            .map_or(DEFAULT_PROVIDER_TIMEOUT, Duration::from_secs)
    }

    /// Debug builds always allow the stand-in providers; release builds only
    /// with an explicit opt-in.
    pub fn fixture_providers_allowed(&self, mode: BuildMode) -> bool {
        mode == BuildMode::Debug || self.allow_fixture_providers == Some(true)
    }
}

/// Resolved inputs for [`super::create_server`].
pub struct ServerConfig {
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) allowed_origins: AllowedOrigins,
}

impl ServerConfig {
    #[must_use]
    pub fn new(key: Key, cookie_secure: bool, same_site: SameSite, bind_addr: SocketAddr) -> Self {
        Self {
            key,
            cookie_secure,
            same_site,
            bind_addr,
            allowed_origins: AllowedOrigins::default(),
        }
    }

    #[must_use]
    pub fn with_allowed_origins(mut self, origins: AllowedOrigins) -> Self {
        self.allowed_origins = origins;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "TOKENGATE_BIND_ADDR",
        "TOKENGATE_DATABASE_URL",
        "TOKENGATE_COMPLETION_COST",
        "TOKENGATE_SESSION_TTL_DAYS",
        "TOKENGATE_ALLOWED_ORIGINS",
        "TOKENGATE_PAYMENT_CURRENCY",
    ];

    fn load() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("tokengate")]).expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));
        let settings = load();
        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            "0.0.0.0:4000".parse().expect("socket addr")
        );
        assert!(settings.database_url.is_none());
        assert_eq!(settings.completion_cost().expect("cost").get(), 1);
        assert_eq!(settings.session_ttl(), DEFAULT_SESSION_TTL);
        assert!(settings.allowed_origins().expect("origins").is_empty());
        assert_eq!(settings.payment_currency(), "usd");
        assert_eq!(settings.completion_model(), DEFAULT_COMPLETION_MODEL);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("TOKENGATE_BIND_ADDR", Some("127.0.0.1:9000".to_owned())),
            (
                "TOKENGATE_DATABASE_URL",
                Some("postgres://localhost/tokengate".to_owned()),
            ),
            ("TOKENGATE_COMPLETION_COST", Some("3".to_owned())),
            ("TOKENGATE_SESSION_TTL_DAYS", Some("7".to_owned())),
            (
                "TOKENGATE_ALLOWED_ORIGINS",
                Some("https://app.example.com,http://localhost:3000".to_owned()),
            ),
            ("TOKENGATE_PAYMENT_CURRENCY", Some("EUR".to_owned())),
        ]);
        let settings = load();
        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            "127.0.0.1:9000".parse().expect("socket addr")
        );
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/tokengate")
        );
        assert_eq!(settings.completion_cost().expect("cost").get(), 3);
        assert_eq!(settings.session_ttl(), TimeDelta::days(7));
        assert!(
            settings
                .allowed_origins()
                .expect("origins")
                .admits("http://localhost:3000")
        );
        assert_eq!(settings.payment_currency(), "eur");
    }

    #[rstest]
    fn release_builds_require_opt_in_for_fixture_providers() {
        let settings = AppSettings::default();
        assert!(settings.fixture_providers_allowed(BuildMode::Debug));
        assert!(!settings.fixture_providers_allowed(BuildMode::Release));

        let opted_in = AppSettings {
            allow_fixture_providers: Some(true),
            ..AppSettings::default()
        };
        assert!(opted_in.fixture_providers_allowed(BuildMode::Release));
    }

    #[rstest]
    fn zero_completion_cost_is_rejected() {
        let _guard = lock_env([("TOKENGATE_COMPLETION_COST", Some("0".to_owned()))]);
        assert!(load().completion_cost().is_err());
    }

    #[rstest]
    fn callback_url_resolves_against_public_base() {
        let settings = AppSettings {
            public_base_url: Some("https://api.example.com".to_owned()),
            ..AppSettings::default()
        };
        assert_eq!(
            settings
                .public_url("/session/login-callback")
                .expect("url")
                .as_str(),
            "https://api.example.com/session/login-callback"
        );
    }
}
