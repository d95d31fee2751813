//! In-process application wiring shared by the token flow scenarios.
//!
//! Stores are in memory, the identity and payment providers are the
//! built-in fixtures, and webhooks are signed with a known secret.

use std::sync::Arc;

use actix_http::Request;
use actix_session::SessionMiddleware;
use actix_session::config::CookieContentSecurity;
use actix_session::storage::CookieSessionStore;
use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header;
use actix_web::test;
use mockable::{Clock, DefaultClock};
use serde_json::{Value, json};
use url::Url;

use tokengate::domain::ports::{FixtureIdentityProvider, FixturePaymentProvider};
use tokengate::domain::{
    AccessGate, CompletionDispatcher, CreditReconciler, OperationPricing, PurchaseRedirects,
    SessionAuthenticator, TokenAmount,
};
use tokengate::inbound::http::purchases::PAYMENT_SIGNATURE_HEADER;
use tokengate::inbound::http::state::HttpState;
use tokengate::middleware::AllowedOrigins;
use tokengate::outbound::memory::{
    MemoryAccountStore, MemoryPurchaseIntentStore, MemorySessionStore,
};
use tokengate::outbound::payments::StripeSignatureVerifier;

use crate::doubles::ScriptedCompletionProvider;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const ALLOWED_ORIGIN: &str = "https://app.example.com";

pub struct Harness {
    pub state: HttpState,
    pub completions: Arc<ScriptedCompletionProvider>,
    pub verifier: StripeSignatureVerifier,
    pub origins: AllowedOrigins,
}

impl Harness {
    /// Wire the app with a flat completion price of `cost` tokens.
    pub fn with_completion_cost(cost: u32) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
        let accounts = Arc::new(MemoryAccountStore::new());
        let intents = Arc::new(MemoryPurchaseIntentStore::new(accounts.clone()));
        let verifier = StripeSignatureVerifier::new(WEBHOOK_SECRET).expect("verifier");
        let completions = Arc::new(ScriptedCompletionProvider::default());

        let authenticator = SessionAuthenticator::new(
            accounts.clone(),
            Arc::new(MemorySessionStore::new()),
            Arc::new(FixtureIdentityProvider::default()),
            clock.clone(),
        );
        let reconciler = CreditReconciler::new(
            intents,
            accounts.clone(),
            Arc::new(FixturePaymentProvider),
            Arc::new(verifier.clone()),
            clock,
            PurchaseRedirects {
                success_url: "http://localhost/purchase/intent/{CHECKOUT_SESSION_ID}".to_owned(),
                cancel_url: "http://localhost/purchase/cancelled".to_owned(),
            },
        );
        let pricing = OperationPricing::new(TokenAmount::new(cost).expect("positive cost"));
        let dispatcher =
            CompletionDispatcher::new(AccessGate::new(accounts, pricing), completions.clone());

        Self {
            state: HttpState::new(authenticator, reconciler, dispatcher),
            completions,
            verifier,
            origins: AllowedOrigins::parse(ALLOWED_ORIGIN).expect("origins"),
        }
    }

    /// A `checkout.session.completed` event signed with the webhook secret.
    pub fn paid_webhook(&self, intent_id: &str, identity: &str) -> test::TestRequest {
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": intent_id,
                "client_reference_id": identity,
                "payment_status": "paid",
            }}
        })
        .to_string()
        .into_bytes();
        let signature = self
            .verifier
            .sign(&payload, chrono::Utc::now().timestamp());
        test::TestRequest::post()
            .uri("/purchase/confirm")
            .insert_header((PAYMENT_SIGNATURE_HEADER, signature))
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload(payload)
    }
}

pub fn session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .cookie_content_security(CookieContentSecurity::Private)
        .build()
}

/// Build the full app: trace ids, origin admission, session cookie, routes.
macro_rules! init_app {
    ($harness:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($harness.state.clone()))
                .configure(tokengate::inbound::http::routes::configure)
                .wrap($crate::harness::session_middleware())
                .wrap(tokengate::middleware::OriginGate::new($harness.origins.clone()))
                .wrap(tokengate::middleware::Trace),
        )
        .await
    };
}

fn session_cookie<B>(res: &ServiceResponse<B>) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|c| c.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie")
}

fn redirect_state<B>(res: &ServiceResponse<B>) -> String {
    let location = res
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header");
    Url::parse("http://localhost")
        .and_then(|base| base.join(location))
        .expect("location url")
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter")
}

/// Log in as `subject` through the fixture identity provider.
pub async fn log_in<S, B>(app: &S, subject: &str) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let start =
        test::call_service(app, test::TestRequest::get().uri("/session/login").to_request()).await;
    let callback = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/session/login-callback")
            .cookie(session_cookie(&start))
            .set_json(json!({ "code": subject, "state": redirect_state(&start) }))
            .to_request(),
    )
    .await;
    assert!(callback.status().is_success(), "login failed: {}", callback.status());
    session_cookie(&callback)
}

pub async fn balance<S, B>(app: &S, cookie: &Cookie<'static>) -> u64
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(
        app,
        test::TestRequest::get()
            .uri("/account/balance")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert!(res.status().is_success(), "balance failed: {}", res.status());
    let body: Value = test::read_body_json(res).await;
    body["tokenBalance"].as_u64().expect("numeric balance")
}

/// Create a purchase intent and return its id.
pub async fn start_purchase<S, B>(app: &S, cookie: &Cookie<'static>, tokens: u32) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/purchase/intent")
            .cookie(cookie.clone())
            .set_json(json!({ "tokens": tokens, "priceMinorUnits": 999 }))
            .to_request(),
    )
    .await;
    assert!(res.status().is_success(), "intent failed: {}", res.status());
    let body: Value = test::read_body_json(res).await;
    body["intentId"].as_str().expect("intent id").to_owned()
}
