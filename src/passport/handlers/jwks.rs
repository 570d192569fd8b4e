use crate::error::Result;
use crate::passport::AppState;
use access_token::Jwks;
use axum::{extract::Extension, Json};
use std::sync::Arc;

#[utoipa::path(
    get,
    path= "/.well-known/jwks.json",
    responses (
        (status = 200, description = "Public signing key as a JSON Web Key Set"),
        (status = 500, description = "Public key file could not be read"),
    ),
    tag= "token"
)]
pub async fn jwks(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Jwks>> {
    Ok(Json(state.tokens.public_key()?))
}
