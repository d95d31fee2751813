//! Builders wiring adapters into the HTTP state.
//!
//! Each external collaborator falls back to an in-process stand-in when its
//! settings are absent so the service can run locally without credentials.
//! The stand-ins trust whatever the caller sends, so release builds refuse
//! them unless `allow_fixture_providers` is set.

use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use mockable::Clock;
use rand::RngCore;
use tracing::{info, warn};
use url::Url;
use zeroize::Zeroizing;

use tokengate::domain::ports::{
    AccountRepository, CompletionProvider, FixtureCompletionProvider, FixtureIdentityProvider,
    FixturePaymentProvider, IdentityProvider, PaymentProvider, PurchaseIntentRepository,
    SessionRepository,
};
use tokengate::domain::{
    AccessGate, CompletionDispatcher, CreditReconciler, OperationPricing, PurchaseRedirects,
    SessionAuthenticator,
};
use tokengate::inbound::http::session_config::BuildMode;
use tokengate::inbound::http::state::HttpState;
use tokengate::outbound::completion::{DEFAULT_CHAT_COMPLETIONS_URL, HttpCompletionProvider};
use tokengate::outbound::memory::{
    MemoryAccountStore, MemoryPurchaseIntentStore, MemorySessionStore,
};
use tokengate::outbound::oauth::{HttpIdentityProvider, OAuthClientSettings, OAuthEndpoints};
use tokengate::outbound::payments::{
    STRIPE_CHECKOUT_SESSIONS_URL, StripeCheckout, StripeCheckoutSettings,
    StripeSignatureVerifier,
};
use tokengate::outbound::persistence::{
    DbPool, DieselAccountRepository, DieselPurchaseIntentRepository, DieselSessionRepository,
};

use super::config::AppSettings;

const LOGIN_CALLBACK_PATH: &str = "/session/login-callback";
const CHECKOUT_SUCCESS_PATH: &str = "/purchase/intent/{CHECKOUT_SESSION_ID}";
const CHECKOUT_CANCEL_PATH: &str = "/purchase/cancelled";

struct Stores {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    intents: Arc<dyn PurchaseIntentRepository>,
}

fn build_stores(pool: Option<&DbPool>) -> Stores {
    match pool {
        Some(pool) => Stores {
            accounts: Arc::new(DieselAccountRepository::new(pool.clone())),
            sessions: Arc::new(DieselSessionRepository::new(pool.clone())),
            intents: Arc::new(DieselPurchaseIntentRepository::new(pool.clone())),
        },
        None => {
            warn!("no database configured; accounts and sessions are kept in memory");
            let accounts = Arc::new(MemoryAccountStore::new());
            Stores {
                intents: Arc::new(MemoryPurchaseIntentStore::new(accounts.clone())),
                accounts,
                sessions: Arc::new(MemorySessionStore::new()),
            }
        }
    }
}

fn fixture_fallback(settings: &AppSettings, mode: BuildMode, missing: &str) -> Result<()> {
    if !settings.fixture_providers_allowed(mode) {
        return Err(eyre!(
            "{missing} not configured; release builds need real provider credentials \
             or TOKENGATE_ALLOW_FIXTURE_PROVIDERS=true"
        ));
    }
    warn!(?mode, "{missing} not configured; using an in-process stand-in");
    Ok(())
}

fn build_identity_provider(
    settings: &AppSettings,
    mode: BuildMode,
) -> Result<Arc<dyn IdentityProvider>> {
    let callback = match settings.oauth_redirect_url.as_deref() {
        Some(url) => Url::parse(url).wrap_err("invalid oauth_redirect_url")?,
        None => settings.public_url(LOGIN_CALLBACK_PATH)?,
    };
    let (Some(client_id), Some(client_secret)) = (
        settings.oauth_client_id.clone(),
        settings.oauth_client_secret.clone(),
    ) else {
        fixture_fallback(settings, mode, "OAuth client")?;
        return Ok(Arc::new(FixtureIdentityProvider::new(callback.as_str())));
    };
    let endpoints = OAuthEndpoints::google().wrap_err("invalid OAuth endpoints")?;
    let provider = HttpIdentityProvider::new(
        endpoints,
        OAuthClientSettings {
            client_id,
            client_secret: Zeroizing::new(client_secret),
            redirect_url: callback,
        },
        settings.provider_timeout(),
    )
    .wrap_err("failed to build OAuth client")?;
    Ok(Arc::new(provider))
}

fn build_payment_provider(
    settings: &AppSettings,
    mode: BuildMode,
) -> Result<Arc<dyn PaymentProvider>> {
    let Some(secret_key) = settings.payment_secret_key.clone() else {
        fixture_fallback(settings, mode, "payment secret")?;
        return Ok(Arc::new(FixturePaymentProvider));
    };
    let endpoint =
        Url::parse(STRIPE_CHECKOUT_SESSIONS_URL).wrap_err("invalid checkout endpoint")?;
    let checkout = StripeCheckout::new(
        endpoint,
        StripeCheckoutSettings {
            secret_key: Zeroizing::new(secret_key),
            currency: settings.payment_currency(),
            product_name: settings.payment_product_name().to_owned(),
        },
        settings.provider_timeout(),
    )
    .wrap_err("failed to build payment client")?;
    Ok(Arc::new(checkout))
}

/// Webhook verifier. Without a configured secret a random one is used, so
/// no notification can be forged but none will verify either.
fn build_verifier(settings: &AppSettings) -> Result<StripeSignatureVerifier> {
    let secret = match settings.payment_webhook_secret.clone() {
        Some(secret) => Zeroizing::new(secret),
        None => {
            warn!("webhook secret not configured; payment notifications will be rejected");
            let mut bytes = [0_u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            Zeroizing::new(hex::encode(bytes))
        }
    };
    StripeSignatureVerifier::new(secret.as_bytes())
        .map_err(|err| eyre!("invalid webhook secret: {err}"))
}

fn build_completion_provider(
    settings: &AppSettings,
    mode: BuildMode,
) -> Result<Arc<dyn CompletionProvider>> {
    let Some(api_key) = settings.completion_api_key.clone() else {
        fixture_fallback(settings, mode, "completion API key")?;
        return Ok(Arc::new(FixtureCompletionProvider));
    };
    let endpoint = Url::parse(
        settings
            .completion_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_CHAT_COMPLETIONS_URL),
    )
    .wrap_err("invalid completion_endpoint")?;
    let provider = HttpCompletionProvider::new(
        endpoint,
        Zeroizing::new(api_key),
        settings.completion_model(),
        settings.completion_timeout(),
    )
    .wrap_err("failed to build completion client")?;
    Ok(Arc::new(provider))
}

/// Wire stores, providers and services into the shared handler state.
///
/// # Errors
///
/// Fails on invalid settings, or when a provider is unconfigured and `mode`
/// does not permit its stand-in.
pub fn build_http_state(
    settings: &AppSettings,
    pool: Option<&DbPool>,
    clock: Arc<dyn Clock>,
    mode: BuildMode,
) -> Result<HttpState> {
    let Stores {
        accounts,
        sessions,
        intents,
    } = build_stores(pool);

    let authenticator = SessionAuthenticator::new(
        accounts.clone(),
        sessions,
        build_identity_provider(settings, mode)?,
        clock.clone(),
    )
    .with_ttl(settings.session_ttl());

    let redirects = PurchaseRedirects {
        // The placeholder must survive URL encoding, so join by string.
        success_url: format!(
            "{}{CHECKOUT_SUCCESS_PATH}",
            settings.public_base_url()?.as_str().trim_end_matches('/')
        ),
        cancel_url: settings.public_url(CHECKOUT_CANCEL_PATH)?.to_string(),
    };
    let reconciler = CreditReconciler::new(
        intents,
        accounts.clone(),
        build_payment_provider(settings, mode)?,
        Arc::new(build_verifier(settings)?),
        clock,
        redirects,
    );

    let gate = AccessGate::new(accounts, OperationPricing::new(settings.completion_cost()?));
    let dispatcher = CompletionDispatcher::new(gate, build_completion_provider(settings, mode)?)
        .with_timeout(settings.completion_timeout());

    info!(
        persistent = pool.is_some(),
        session_ttl_days = settings.session_ttl().num_days(),
        "handler state ready"
    );
    Ok(HttpState::new(authenticator, reconciler, dispatcher)
        .with_after_login_url(settings.after_login_url()))
}
