use crate::authz::bearer_token;
use crate::error::{Error, Result};
use crate::passport::AppState;
use crate::token::{Principal, ACCESS_TOKEN_TTL_SECONDS};
use axum::{
    extract::{Extension, Query},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

pub const REFRESH_TOKEN_TYPE: &str = "refresh_token";

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// `refresh_token` to exchange the bearer refresh token for a new access token.
    #[serde(rename = "type")]
    grant: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    token_type: String,
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    expires_in: i64,
    expires_at: i64,
}

/// Decode `Authorization: Basic base64(username:password)`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = Base64::decode_vec(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[utoipa::path(
    post,
    path= "/token",
    params(TokenQuery),
    responses (
        (status = 200, description = "Access token, plus a refresh token on password sign-in", body = TokenResponse),
        (status = 400, description = "Unsupported token type"),
        (status = 401, description = "Bad credentials or invalid refresh token"),
    ),
    security(("basic" = []), ("bearer" = [])),
    tag= "token"
)]
#[instrument(skip(state, headers))]
pub async fn token(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>> {
    match query.grant.as_deref() {
        None => {
            let (username, password) = basic_credentials(&headers).ok_or(Error::Unauthorized)?;
            let identity = state
                .identities
                .authenticate_password(&username, &password)
                .await?;
            let pair = state
                .tokens
                .issue_token_pair(&Principal::for_identity(&identity))?;
            debug!(identity_id = %identity.id, "issued token pair");
            Ok(Json(TokenResponse {
                token_type: "Bearer".to_string(),
                access_token: pair.access.token,
                refresh_token: Some(pair.refresh_token),
                expires_in: ACCESS_TOKEN_TTL_SECONDS,
                expires_at: pair.access.expires_at,
            }))
        }
        Some(REFRESH_TOKEN_TYPE) => {
            let refresh_token = bearer_token(&headers).ok_or(Error::Unauthorized)?;
            let access = state.tokens.refresh(refresh_token)?;
            Ok(Json(TokenResponse {
                token_type: "Bearer".to_string(),
                access_token: access.token,
                refresh_token: None,
                expires_in: ACCESS_TOKEN_TTL_SECONDS,
                expires_at: access.expires_at,
            }))
        }
        Some(other) => Err(Error::validation(format!("unsupported token type: {other}"))),
    }
}
