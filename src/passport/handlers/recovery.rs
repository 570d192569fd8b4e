use super::require_payload;
use crate::error::Result;
use crate::passport::AppState;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct RecoveryEmailRequest {
    email: String,
}

#[derive(ToSchema, Deserialize)]
pub struct ExchangeRequest {
    email: String,
    code: String,
}

#[derive(ToSchema, Serialize)]
pub struct ExchangeResponse {
    code: String,
}

#[derive(ToSchema, Deserialize)]
pub struct ResetRequest {
    email: String,
    code: String,
    password: String,
}

#[utoipa::path(
    post,
    path= "/password-recovery/email",
    request_body = RecoveryEmailRequest,
    responses (
        (status = 202, description = "If the email is registered, a recovery code is on its way"),
        (status = 400, description = "Missing payload"),
    ),
    tag= "recovery"
)]
pub async fn initiate(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<RecoveryEmailRequest>>,
) -> Result<impl IntoResponse> {
    let request = require_payload(payload)?;
    state.recovery.initiate(&request.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        "If the email is registered, a recovery code has been sent",
    ))
}

#[utoipa::path(
    post,
    path= "/password-recovery/exchange",
    request_body = ExchangeRequest,
    responses (
        (status = 200, description = "Resetting code", body = ExchangeResponse),
        (status = 400, description = "Recovery not initiated or code does not match"),
    ),
    tag= "recovery"
)]
pub async fn exchange(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<ExchangeRequest>>,
) -> Result<Json<ExchangeResponse>> {
    let request = require_payload(payload)?;
    let code = state
        .recovery
        .exchange(&request.email, &request.code)
        .await?;
    Ok(Json(ExchangeResponse { code }))
}

#[utoipa::path(
    post,
    path= "/password-recovery/reset",
    request_body = ResetRequest,
    responses (
        (status = 204, description = "Password changed"),
        (status = 400, description = "Recovery not in the resetting stage, code mismatch or empty password"),
    ),
    tag= "recovery"
)]
pub async fn reset(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<ResetRequest>>,
) -> Result<StatusCode> {
    let request = require_payload(payload)?;
    state
        .recovery
        .reset(&request.email, &request.code, &request.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
