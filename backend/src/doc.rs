//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] collects every HTTP endpoint and its payload schemas. The
//! document backs Swagger UI in debug builds and is exported by the
//! `openapi-dump` binary.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{Error, ErrorCode, IntentStatus, TokenBalance};
use crate::inbound::http::account::{AccountView, BalanceView};
use crate::inbound::http::completion::{CompletionRequest, CompletionResponse};
use crate::inbound::http::purchases::{
    ConfirmationAck, ConfirmationResult, PurchaseIntentCreated, PurchaseIntentRequest,
    PurchaseIntentView,
};
use crate::inbound::http::sessions::LoginCallback;

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Encrypted session cookie issued by the login callback.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "tokengate API",
        description = "Session-gated, prepaid-token access to a metered completion API."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::sessions::login,
        crate::inbound::http::sessions::login_callback_redirect,
        crate::inbound::http::sessions::login_callback,
        crate::inbound::http::sessions::logout,
        crate::inbound::http::account::balance,
        crate::inbound::http::account::me,
        crate::inbound::http::purchases::create_intent,
        crate::inbound::http::purchases::intent_status,
        crate::inbound::http::purchases::confirm,
        crate::inbound::http::purchases::cancelled,
        crate::inbound::http::completion::complete,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        TokenBalance,
        IntentStatus,
        LoginCallback,
        AccountView,
        BalanceView,
        PurchaseIntentRequest,
        PurchaseIntentCreated,
        PurchaseIntentView,
        ConfirmationResult,
        ConfirmationAck,
        CompletionRequest,
        CompletionResponse,
    )),
    tags(
        (name = "session", description = "Login and logout"),
        (name = "account", description = "Balance and profile of the logged-in account"),
        (name = "purchase", description = "Token purchases and payment confirmation"),
        (name = "completion", description = "Metered completion calls"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
