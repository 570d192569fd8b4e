use super::require_payload;
use crate::error::Result;
use crate::passport::AppState;
use crate::permissions::{Right, Role};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Deserialize, Debug)]
pub struct NameRequest {
    name: String,
}

#[utoipa::path(
    post,
    path= "/roles",
    request_body = NameRequest,
    responses (
        (status = 201, description = "Role created", body = Role),
        (status = 400, description = "Empty name"),
        (status = 409, description = "Role already exists"),
    ),
    security(("bearer" = [])),
    tag= "permissions"
)]
pub async fn create_role(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<NameRequest>>,
) -> Result<impl IntoResponse> {
    let request = require_payload(payload)?;
    let role = state.permissions.create_role(&request.name).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path= "/roles",
    responses ((status = 200, description = "All roles", body = [Role])),
    security(("bearer" = [])),
    tag= "permissions"
)]
pub async fn list_roles(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Vec<Role>>> {
    Ok(Json(state.permissions.list_roles().await?))
}

#[utoipa::path(
    put,
    path= "/roles/{id}",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = NameRequest,
    responses (
        (status = 200, description = "Role renamed", body = Role),
        (status = 404, description = "No such role"),
        (status = 409, description = "Role already exists"),
    ),
    security(("bearer" = [])),
    tag= "permissions"
)]
pub async fn rename_role(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<NameRequest>>,
) -> Result<Json<Role>> {
    let request = require_payload(payload)?;
    Ok(Json(state.permissions.rename_role(id, &request.name).await?))
}

#[utoipa::path(
    post,
    path= "/rights",
    request_body = NameRequest,
    responses (
        (status = 201, description = "Right created", body = Right),
        (status = 400, description = "Empty name"),
        (status = 409, description = "Right already exists"),
    ),
    security(("bearer" = [])),
    tag= "permissions"
)]
pub async fn create_right(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<NameRequest>>,
) -> Result<impl IntoResponse> {
    let request = require_payload(payload)?;
    let right = state.permissions.create_right(&request.name).await?;
    Ok((StatusCode::CREATED, Json(right)))
}

#[utoipa::path(
    get,
    path= "/rights",
    responses ((status = 200, description = "All rights", body = [Right])),
    security(("bearer" = [])),
    tag= "permissions"
)]
pub async fn list_rights(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Vec<Right>>> {
    Ok(Json(state.permissions.list_rights().await?))
}

#[utoipa::path(
    put,
    path= "/rights/{id}",
    params(("id" = Uuid, Path, description = "Right id")),
    request_body = NameRequest,
    responses (
        (status = 200, description = "Right renamed", body = Right),
        (status = 404, description = "No such right"),
        (status = 409, description = "Right already exists"),
    ),
    security(("bearer" = [])),
    tag= "permissions"
)]
pub async fn rename_right(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<NameRequest>>,
) -> Result<Json<Right>> {
    let request = require_payload(payload)?;
    Ok(Json(state.permissions.rename_right(id, &request.name).await?))
}
