//! Metered completion handler.
//!
//! ```text
//! POST /completion {"prompt":"..."} -> {"response":"..","tokensCharged":1,"tokenBalance":489}
//! ```

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{DenyReason, Error, Prompt, SessionResolution, TokenBalance};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionRequest {
    #[schema(example = "Summarise the plot of Hamlet in one sentence.")]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub response: String,
    pub tokens_charged: u32,
    pub token_balance: TokenBalance,
}

/// Debit the caller and forward the prompt. Failed calls are refunded.
#[utoipa::path(
    post,
    path = "/completion",
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Completion text", body = CompletionResponse),
        (status = 400, description = "Invalid prompt", body = Error),
        (status = 401, description = "Not logged in", body = Error),
        (status = 402, description = "Insufficient balance", body = Error),
        (status = 502, description = "Completion provider failure; debit refunded", body = Error)
    ),
    tags = ["completion"],
    operation_id = "complete"
)]
#[post("/completion")]
pub async fn complete(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CompletionRequest>,
) -> ApiResult<web::Json<CompletionResponse>> {
    let resolution = session.resolve(&state.authenticator).await?;
    if matches!(resolution, SessionResolution::Unauthenticated) {
        return Err(DenyReason::Unauthenticated.into_error());
    }
    let prompt = Prompt::new(payload.into_inner().prompt).map_err(|err| {
        Error::invalid_request(err.to_string()).with_details(json!({ "field": "prompt" }))
    })?;
    let receipt = state.dispatcher.dispatch(resolution, prompt).await?;
    Ok(web::Json(CompletionResponse {
        response: receipt.text,
        tokens_charged: receipt.tokens_charged.get(),
        token_balance: receipt.balance_after,
    }))
}
