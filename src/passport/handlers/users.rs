use super::require_payload;
use crate::authz::AuthContext;
use crate::error::Result;
use crate::identity::{IdentityUpdate, IdentityView, NewIdentity, Provisioning};
use crate::passport::AppState;
use crate::permissions::ADMIN_ROLE;
use crate::token::{Principal, ACCESS_TOKEN_TTL_SECONDS};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    rights: Vec<String>,
}

impl std::fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("rights", &self.rights)
            .finish_non_exhaustive()
    }
}

impl From<SignUpRequest> for NewIdentity {
    fn from(request: SignUpRequest) -> Self {
        Self {
            username: request.username,
            email: request.email,
            password: request.password,
            role: request.role,
            rights: request.rights,
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    id: Uuid,
    token_type: String,
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    expires_at: i64,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    email: Option<String>,
    username: Option<String>,
    is_active: Option<bool>,
    /// Send the identity a password recovery code.
    #[serde(default)]
    should_change_password: bool,
}

#[derive(ToSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminRequest {
    username: String,
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path= "/users",
    request_body = SignUpRequest,
    responses (
        (status = 201, description = "Identity created; a verification email is queued", body = SignUpResponse),
        (status = 400, description = "Invalid input or unknown role/right"),
        (status = 403, description = "The admin role cannot be self-assigned"),
        (status = 409, description = "Username or email already exists"),
    ),
    tag= "users"
)]
#[instrument(skip(state))]
pub async fn sign_up(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<SignUpRequest>>,
) -> Result<impl IntoResponse> {
    let request = require_payload(payload)?;
    let identity = state.identities.sign_up(request.into()).await?;
    let pair = state
        .tokens
        .issue_token_pair(&Principal::for_identity(&identity))?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            id: identity.id,
            token_type: "Bearer".to_string(),
            access_token: pair.access.token,
            refresh_token: pair.refresh_token,
            expires_in: ACCESS_TOKEN_TTL_SECONDS,
            expires_at: pair.access.expires_at,
        }),
    ))
}

#[utoipa::path(
    post,
    path= "/verify/{token}",
    params(("token" = String, Path, description = "Token from the verification email")),
    responses (
        (status = 204, description = "Email verified"),
        (status = 400, description = "Unknown or already used token"),
    ),
    tag= "users"
)]
pub async fn verify_email(
    Extension(state): Extension<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    state.identities.verify_email(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path= "/users",
    responses (
        (status = 200, description = "All identities", body = [IdentityView]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller is not an admin"),
    ),
    security(("bearer" = [])),
    tag= "users"
)]
pub async fn list_users(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<IdentityView>>> {
    let mut views = Vec::new();
    for identity in state.identities.list().await? {
        views.push(state.identities.describe(&identity).await?);
    }
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path= "/users/{id}",
    params(("id" = Uuid, Path, description = "Identity id")),
    responses (
        (status = 200, description = "Identity with role and right names", body = IdentityView),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such identity"),
    ),
    security(("bearer" = [])),
    tag= "users"
)]
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<IdentityView>> {
    let identity = state.identities.get(id).await?;
    Ok(Json(state.identities.describe(&identity).await?))
}

#[utoipa::path(
    patch,
    path= "/users/{id}",
    params(("id" = Uuid, Path, description = "Identity id")),
    request_body = UpdateUserRequest,
    responses (
        (status = 200, description = "Updated identity", body = IdentityView),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "No such identity"),
        (status = 409, description = "Username or email already exists"),
    ),
    security(("bearer" = [])),
    tag= "users"
)]
#[instrument(skip(state, ctx))]
pub async fn update_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateUserRequest>>,
) -> Result<Json<IdentityView>> {
    let request = require_payload(payload)?;
    let identity = state
        .identities
        .update_identity(
            id,
            IdentityUpdate {
                email: request.email,
                username: request.username,
                is_active: request.is_active,
            },
        )
        .await?;

    if request.should_change_password {
        info!(admin_id = %ctx.identity_id, identity_id = %id, "password change requested by admin");
        state.recovery.initiate(&identity.email).await?;
    }

    Ok(Json(state.identities.describe(&identity).await?))
}

#[utoipa::path(
    delete,
    path= "/users/{id}",
    params(("id" = Uuid, Path, description = "Identity id")),
    responses (
        (status = 204, description = "Identity deleted"),
        (status = 404, description = "No such identity"),
    ),
    security(("bearer" = [])),
    tag= "users"
)]
pub async fn delete_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.identities.delete_identity(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path= "/admins",
    request_body = CreateAdminRequest,
    responses (
        (status = 201, description = "Verified admin identity created", body = IdentityView),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already exists"),
    ),
    security(("bearer" = [])),
    tag= "users"
)]
pub async fn create_admin(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<CreateAdminRequest>>,
) -> Result<impl IntoResponse> {
    let request = require_payload(payload)?;
    let identity = state
        .identities
        .create_identity(
            NewIdentity {
                username: request.username,
                email: request.email,
                password: request.password,
                role: Some(ADMIN_ROLE.to_string()),
                rights: Vec::new(),
            },
            Provisioning::PreVerified,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(state.identities.describe(&identity).await?),
    ))
}
