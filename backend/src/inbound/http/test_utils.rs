//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_http::Request;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header;
use actix_web::test;
use mockable::Clock;
use url::Url;

use crate::domain::ports::{
    FixtureCompletionProvider, FixtureIdentityProvider, FixturePaymentProvider,
};
use crate::domain::{
    AccessGate, CompletionDispatcher, CreditReconciler, OperationPricing, PurchaseRedirects,
    SessionAuthenticator,
};
use crate::inbound::http::state::HttpState;
use crate::outbound::memory::{MemoryAccountStore, MemoryPurchaseIntentStore, MemorySessionStore};
use crate::outbound::payments::StripeSignatureVerifier;
use crate::test_support::MutableClock;

pub const WEBHOOK_SECRET: &str = "whsec_unit_test";

/// Session middleware with a fresh key, cookie `session`, no `Secure` flag.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// In-memory wiring shared by handler tests.
pub struct TestHarness {
    pub state: HttpState,
    pub accounts: Arc<MemoryAccountStore>,
    pub clock: Arc<MutableClock>,
    pub verifier: StripeSignatureVerifier,
}

impl TestHarness {
    pub fn new() -> Self {
        let clock = Arc::new(MutableClock::new(chrono::Utc::now()));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let accounts = Arc::new(MemoryAccountStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let intents = Arc::new(MemoryPurchaseIntentStore::new(accounts.clone()));
        let verifier = StripeSignatureVerifier::new(WEBHOOK_SECRET).expect("verifier");

        let authenticator = SessionAuthenticator::new(
            accounts.clone(),
            sessions,
            Arc::new(FixtureIdentityProvider::default()),
            clock_dyn.clone(),
        );
        let reconciler = CreditReconciler::new(
            intents,
            accounts.clone(),
            Arc::new(FixturePaymentProvider),
            Arc::new(verifier.clone()),
            clock_dyn,
            PurchaseRedirects {
                success_url: "http://localhost/purchase/intent/{CHECKOUT_SESSION_ID}".to_owned(),
                cancel_url: "http://localhost/purchase/cancelled".to_owned(),
            },
        );
        let gate = AccessGate::new(accounts.clone(), OperationPricing::default());
        let dispatcher = CompletionDispatcher::new(gate, Arc::new(FixtureCompletionProvider));

        Self {
            state: HttpState::new(authenticator, reconciler, dispatcher),
            accounts,
            clock,
            verifier,
        }
    }
}

/// The `session` cookie set by a response.
pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|c| c.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie")
}

/// The `state` query parameter of a redirect's `Location`.
pub fn redirect_state<B>(res: &ServiceResponse<B>) -> String {
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

/// Drive `/session/login` and the JSON callback, returning the logged-in
/// cookie. The fixture identity provider uses `code` as the subject.
pub async fn log_in<S, B>(app: &S, code: &str) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let start = test::call_service(app, test::TestRequest::get().uri("/session/login").to_request()).await;
    let nonce = redirect_state(&start);
    let callback = test::call_service(
        app,
        test::TestRequest::post()
            .uri("/session/login-callback")
            .cookie(session_cookie(&start))
            .set_json(serde_json::json!({ "code": code, "state": nonce }))
            .to_request(),
    )
    .await;
    assert!(callback.status().is_success(), "login failed: {}", callback.status());
    session_cookie(&callback)
}
