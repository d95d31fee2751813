//! Session cookie helpers that keep handlers free of framework details.
//!
//! The private cookie carries only the opaque session id and, while a login
//! is pending, the OAuth `state` nonce. Everything else lives server-side.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{
    Account, Error, OAuthState, SessionAuthenticator, SessionId, SessionResolution,
};

pub(crate) const SESSION_ID_KEY: &str = "session_id";
pub(crate) const OAUTH_STATE_KEY: &str = "oauth_state";

/// Newtype wrapper exposing the cookie operations handlers need.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Bind `session_id` to the cookie, rotating the cookie first.
    pub fn persist_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.0.renew();
        self.0
            .insert(SESSION_ID_KEY, session_id.as_str())
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    /// Session id carried by the cookie; malformed values read as absent.
    pub fn session_id(&self) -> Result<Option<SessionId>, Error> {
        let raw = self
            .0
            .get::<String>(SESSION_ID_KEY)
            .map_err(|error| Error::internal(format!("failed to read session: {error}")))?;
        Ok(raw.and_then(|raw| match SessionId::parse(&raw) {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(%error, "malformed session id in cookie");
                None
            }
        }))
    }

    /// Enter the pending login state.
    pub fn persist_oauth_state(&self, state: &OAuthState) -> Result<(), Error> {
        self.0
            .insert(OAUTH_STATE_KEY, state.as_str())
            .map_err(|error| Error::internal(format!("failed to persist login state: {error}")))
    }

    /// Remove and return the pending login nonce. A nonce is single use.
    pub fn take_oauth_state(&self) -> Option<OAuthState> {
        let raw = self.0.remove_as::<String>(OAUTH_STATE_KEY)?.ok()?;
        OAuthState::parse(&raw).ok()
    }

    /// Drop everything and expire the cookie.
    pub fn clear(&self) {
        self.0.purge();
    }

    /// Resolve the cookie's session to an account or `Unauthenticated`.
    pub async fn resolve(
        &self,
        authenticator: &SessionAuthenticator,
    ) -> Result<SessionResolution, Error> {
        let session_id = self.session_id()?;
        authenticator.resolve(session_id.as_ref()).await
    }

    /// Resolve the caller or fail with `401 unauthenticated`.
    pub async fn require_account(
        &self,
        authenticator: &SessionAuthenticator,
    ) -> Result<Account, Error> {
        match self.resolve(authenticator).await? {
            SessionResolution::Authenticated(account) => Ok(account),
            SessionResolution::Unauthenticated => Err(Error::unauthenticated("login required")),
        }
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionContext::new) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::test_utils::test_session_middleware;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};
    use rstest::rstest;

    fn session_cookie(
        res: &actix_web::dev::ServiceResponse,
    ) -> actix_web::cookie::Cookie<'static> {
        res.response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .map(|cookie| cookie.into_owned())
            .expect("session cookie set")
    }

    #[rstest]
    #[actix_web::test]
    async fn round_trips_session_id() {
        let id = SessionId::generate();
        let expected = id.as_str().to_owned();
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .route(
                    "/set",
                    web::get().to(move |session: SessionContext| {
                        let id = id.clone();
                        async move {
                            session.persist_session(&id)?;
                            Ok::<_, Error>(HttpResponse::Ok())
                        }
                    }),
                )
                .route(
                    "/get",
                    web::get().to(|session: SessionContext| async move {
                        let id = session.session_id()?.ok_or_else(|| Error::unauthenticated("none"))?;
                        Ok::<_, Error>(HttpResponse::Ok().body(id.as_str().to_owned()))
                    }),
                ),
        )
        .await;

        let set = test::call_service(&app, test::TestRequest::get().uri("/set").to_request()).await;
        let cookie = session_cookie(&set);
        let got = test::call_service(
            &app,
            test::TestRequest::get().uri("/get").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(got.status(), StatusCode::OK);
        assert_eq!(test::read_body(got).await, expected);
    }

    #[rstest]
    #[actix_web::test]
    async fn oauth_state_is_single_use() {
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .route(
                    "/begin",
                    web::get().to(|session: SessionContext| async move {
                        session.persist_oauth_state(&OAuthState::generate())?;
                        Ok::<_, Error>(HttpResponse::Ok())
                    }),
                )
                .route(
                    "/take",
                    web::get().to(|session: SessionContext| async move {
                        let first = session.take_oauth_state().is_some();
                        let second = session.take_oauth_state().is_some();
                        HttpResponse::Ok().body(format!("{first},{second}"))
                    }),
                ),
        )
        .await;

        let begin =
            test::call_service(&app, test::TestRequest::get().uri("/begin").to_request()).await;
        let cookie = session_cookie(&begin);
        let take = test::call_service(
            &app,
            test::TestRequest::get().uri("/take").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(test::read_body(take).await, "true,false");
    }

    #[rstest]
    #[actix_web::test]
    async fn tampered_session_id_reads_as_absent() {
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .route(
                    "/set-invalid",
                    web::get().to(|session: Session| async move {
                        session
                            .insert(SESSION_ID_KEY, "not-hex")
                            .expect("insert");
                        HttpResponse::Ok()
                    }),
                )
                .route(
                    "/get",
                    web::get().to(|session: SessionContext| async move {
                        let present = session.session_id()?.is_some();
                        Ok::<_, Error>(HttpResponse::Ok().body(present.to_string()))
                    }),
                ),
        )
        .await;

        let set = test::call_service(
            &app,
            test::TestRequest::get().uri("/set-invalid").to_request(),
        )
        .await;
        let cookie = session_cookie(&set);
        let got = test::call_service(
            &app,
            test::TestRequest::get().uri("/get").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(test::read_body(got).await, "false");
    }
}
