//! Account read handlers.
//!
//! ```text
//! GET /account/balance -> {"tokenBalance":490}
//! GET /account/me      -> {"identity":"..","displayName":"..","email":"..","tokenBalance":490}
//! ```

use actix_web::{get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Account, Error, TokenBalance};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Current prepaid balance.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub token_balance: TokenBalance,
}

/// The logged-in account.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub identity: String,
    pub display_name: String,
    pub email: String,
    pub token_balance: TokenBalance,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            identity: account.identity().to_string(),
            display_name: account.display_name().to_owned(),
            email: account.email().to_owned(),
            token_balance: account.token_balance(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/account/balance",
    responses(
        (status = 200, description = "Balance", body = BalanceView),
        (status = 401, description = "Not logged in", body = Error)
    ),
    tags = ["account"],
    operation_id = "getBalance"
)]
#[get("/balance")]
pub async fn balance(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<BalanceView>> {
    let account = session.require_account(&state.authenticator).await?;
    Ok(web::Json(BalanceView {
        token_balance: account.token_balance(),
    }))
}

#[utoipa::path(
    get,
    path = "/account/me",
    responses(
        (status = 200, description = "Account profile", body = AccountView),
        (status = 401, description = "Not logged in", body = Error)
    ),
    tags = ["account"],
    operation_id = "getAccount"
)]
#[get("/me")]
pub async fn me(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<AccountView>> {
    let account = session.require_account(&state.authenticator).await?;
    Ok(web::Json(AccountView::from(&account)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountIdentity, TokenAmount, TokenDelta};
    use crate::inbound::http::routes;
    use crate::inbound::http::test_utils::{TestHarness, log_in, test_session_middleware};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use rstest::rstest;

    #[rstest]
    #[actix_web::test]
    async fn balance_requires_a_session() {
        let harness = TestHarness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(harness.state.clone()))
                .wrap(test_session_middleware())
                .configure(routes::configure),
        )
        .await;

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/account/balance").to_request())
                .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[rstest]
    #[actix_web::test]
    async fn balance_reflects_credits() {
        let harness = TestHarness::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(harness.state.clone()))
                .wrap(test_session_middleware())
                .configure(routes::configure),
        )
        .await;
        let cookie = log_in(&app, "u1").await;
        harness
            .accounts
            .apply_delta_now(
                &AccountIdentity::new("u1").expect("identity"),
                TokenDelta::Credit(TokenAmount::new(42).expect("amount")),
            )
            .expect("credit");

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/account/balance")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        let view: BalanceView = test::read_body_json(res).await;
        assert_eq!(view.token_balance.value(), 42);

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/account/me").cookie(cookie).to_request(),
        )
        .await;
        let view: AccountView = test::read_body_json(res).await;
        assert_eq!(view.identity, "u1");
        assert_eq!(view.email, "u1@example.test");
    }
}
