//! Purchase handlers.
//!
//! ```text
//! POST /purchase/intent {"tokens":500,"priceMinorUnits":999}
//! GET  /purchase/intent/{intentId}    (client redirect target, never credits)
//! POST /purchase/confirm              (signed provider webhook)
//! GET  /purchase/cancelled
//! ```

use actix_web::{HttpRequest, HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{
    ConfirmationOutcome, Error, IntentStatus, PurchaseIntentId, PurchaseRequest,
    PurchaseValidationError, TokenBalance,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Header carrying the provider's webhook signature.
pub const PAYMENT_SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseIntentRequest {
    #[schema(minimum = 1, maximum = 1_000_000, example = 500)]
    pub tokens: u32,
    #[schema(minimum = 1, example = 999)]
    pub price_minor_units: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseIntentCreated {
    pub intent_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseIntentView {
    pub intent_id: String,
    pub status: IntentStatus,
    pub tokens_requested: u32,
    pub token_balance: TokenBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationResult {
    Credited,
    AlreadyConsumed,
    Ignored,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmationAck {
    pub received: bool,
    pub result: ConfirmationResult,
}

fn map_purchase_validation_error(err: PurchaseValidationError) -> Error {
    let field = match err {
        PurchaseValidationError::TokensOutOfRange { .. } => "tokens",
        PurchaseValidationError::NonPositivePrice => "priceMinorUnits",
        PurchaseValidationError::EmptyIntentId
        | PurchaseValidationError::InvalidIntentId
        | PurchaseValidationError::IntentIdTooLong { .. } => "intentId",
    };
    Error::invalid_request(err.to_string()).with_details(json!({ "field": field }))
}

/// Open a checkout and record a pending intent for the caller.
#[utoipa::path(
    post,
    path = "/purchase/intent",
    request_body = PurchaseIntentRequest,
    responses(
        (status = 201, description = "Checkout opened", body = PurchaseIntentCreated),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Not logged in", body = Error),
        (status = 502, description = "Payment provider failure", body = Error)
    ),
    tags = ["purchase"],
    operation_id = "createPurchaseIntent"
)]
#[post("/intent")]
pub async fn create_intent(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<PurchaseIntentRequest>,
) -> ApiResult<HttpResponse> {
    let account = session.require_account(&state.authenticator).await?;
    let request = PurchaseRequest::new(payload.tokens, payload.price_minor_units)
        .map_err(map_purchase_validation_error)?;
    let initiated = state
        .reconciler
        .initiate_purchase(account.identity(), request)
        .await?;
    Ok(HttpResponse::Created().json(PurchaseIntentCreated {
        intent_id: initiated.intent_id.to_string(),
        redirect_url: initiated.redirect_url,
    }))
}

/// Report an intent's status to its owner. Does not credit.
#[utoipa::path(
    get,
    path = "/purchase/intent/{intent_id}",
    params(("intent_id" = String, Path, description = "Provider checkout id")),
    responses(
        (status = 200, description = "Intent status", body = PurchaseIntentView),
        (status = 401, description = "Not logged in", body = Error),
        (status = 403, description = "Intent belongs to another account", body = Error),
        (status = 404, description = "Unknown intent", body = Error)
    ),
    tags = ["purchase"],
    operation_id = "getPurchaseIntent"
)]
#[get("/intent/{intent_id}")]
pub async fn intent_status(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<PurchaseIntentView>> {
    let account = session.require_account(&state.authenticator).await?;
    let intent_id = PurchaseIntentId::new(path.into_inner()).map_err(map_purchase_validation_error)?;
    let report = state
        .reconciler
        .intent_status(&intent_id, account.identity())
        .await?;
    Ok(web::Json(PurchaseIntentView {
        intent_id: report.intent.id().to_string(),
        status: report.intent.status(),
        tokens_requested: report.intent.tokens_requested().get(),
        token_balance: report.account.token_balance(),
    }))
}

/// Provider webhook. Only a correctly signed notification credits tokens.
#[utoipa::path(
    post,
    path = "/purchase/confirm",
    request_body(content = String, content_type = "application/json", description = "Raw provider event"),
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Notification processed", body = ConfirmationAck),
        (status = 400, description = "Unsigned, forged, stale or malformed", body = Error),
        (status = 403, description = "Intent belongs to another account", body = Error),
        (status = 404, description = "Unknown intent", body = Error)
    ),
    tags = ["purchase"],
    operation_id = "confirmPurchase"
)]
#[post("/confirm")]
pub async fn confirm(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Bytes,
) -> ApiResult<web::Json<ConfirmationAck>> {
    let signature = req
        .headers()
        .get(PAYMENT_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state
        .reconciler
        .apply_payment_notification(&body, signature)
        .await?;
    let result = match outcome {
        Some(ConfirmationOutcome::Credited(_)) => ConfirmationResult::Credited,
        Some(ConfirmationOutcome::AlreadyConsumed(_)) => ConfirmationResult::AlreadyConsumed,
        None => ConfirmationResult::Ignored,
    };
    Ok(web::Json(ConfirmationAck {
        received: true,
        result,
    }))
}

/// Landing page for an abandoned checkout.
#[utoipa::path(
    get,
    path = "/purchase/cancelled",
    responses((status = 200, description = "Checkout abandoned; nothing was charged")),
    tags = ["purchase"],
    operation_id = "purchaseCancelled"
)]
#[get("/cancelled")]
pub async fn cancelled() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "cancelled" }))
}

#[cfg(test)]
#[path = "purchases_tests.rs"]
mod tests;
