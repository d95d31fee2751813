//! Login, OAuth callback and logout handlers.
//!
//! ```text
//! GET  /session/login                 -> 302 to the identity provider
//! GET  /session/login-callback?code&state
//! POST /session/login-callback {"code":"..","state":".."}
//! POST /session/logout
//! ```

use actix_web::{HttpResponse, get, http::header, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Error, LoginOutcome, OAuthState};
use crate::inbound::http::ApiResult;
use crate::inbound::http::account::AccountView;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Authorization code returned by the identity provider.
#[derive(Debug, Deserialize, Serialize, ToSchema, IntoParams)]
pub struct LoginCallback {
    pub code: String,
    pub state: String,
}

/// Start a login: remember a fresh `state` nonce and redirect to consent.
#[utoipa::path(
    get,
    path = "/session/login",
    responses(
        (status = 302, description = "Redirect to the identity provider"),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["session"],
    operation_id = "login"
)]
#[get("/login")]
pub async fn login(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let nonce = OAuthState::generate();
    session.persist_oauth_state(&nonce)?;
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, state.authenticator.authorization_url(&nonce)))
        .finish())
}

async fn finish_login(
    state: &HttpState,
    session: &SessionContext,
    callback: LoginCallback,
) -> ApiResult<LoginOutcome> {
    let expected = session.take_oauth_state();
    if expected.as_ref().map(OAuthState::as_str) != Some(callback.state.as_str()) {
        warn!(pending = expected.is_some(), "login callback with mismatched state");
        return Err(Error::unauthenticated("login state mismatch")
            .with_details(json!({ "reason": "state_mismatch" })));
    }
    if callback.code.trim().is_empty() {
        return Err(Error::invalid_request("code must not be empty")
            .with_details(json!({ "field": "code" })));
    }
    let outcome = state.authenticator.complete_login(&callback.code).await?;
    session.persist_session(outcome.session.id())?;
    Ok(outcome)
}

/// Browser redirect target of the identity provider.
#[utoipa::path(
    get,
    path = "/session/login-callback",
    params(LoginCallback),
    responses(
        (status = 303, description = "Logged in; redirect to the application", headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 401, description = "State mismatch or code refused", body = Error),
        (status = 502, description = "Identity provider failure", body = Error)
    ),
    tags = ["session"],
    operation_id = "loginCallbackRedirect"
)]
#[get("/login-callback")]
pub async fn login_callback_redirect(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<LoginCallback>,
) -> ApiResult<HttpResponse> {
    finish_login(&state, &session, query.into_inner()).await?;
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, state.after_login_url.as_str()))
        .finish())
}

/// Programmatic variant of the callback returning the account.
#[utoipa::path(
    post,
    path = "/session/login-callback",
    request_body = LoginCallback,
    responses(
        (status = 200, description = "Logged in", body = AccountView, headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "State mismatch or code refused", body = Error),
        (status = 502, description = "Identity provider failure", body = Error)
    ),
    tags = ["session"],
    operation_id = "loginCallback"
)]
#[post("/login-callback")]
pub async fn login_callback(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<LoginCallback>,
) -> ApiResult<web::Json<AccountView>> {
    let outcome = finish_login(&state, &session, payload.into_inner()).await?;
    Ok(web::Json(AccountView::from(&outcome.account)))
}

/// End the caller's session. Always succeeds.
#[utoipa::path(
    post,
    path = "/session/logout",
    responses(
        (status = 204, description = "Logged out"),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["session"],
    operation_id = "logout"
)]
#[post("/logout")]
pub async fn logout(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    if let Some(id) = session.session_id()? {
        state.authenticator.end_login(&id).await?;
    }
    session.clear();
    Ok(HttpResponse::NoContent().finish())
}
