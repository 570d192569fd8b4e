use crate::authz::AuthContext;
use crate::error::{Error, Result};
use crate::notifications::Notification;
use crate::passport::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    get,
    path= "/notifications",
    responses (
        (status = 200, description = "Caller's unread notifications", body = [Notification]),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    security(("bearer" = [])),
    tag= "notifications"
)]
pub async fn unread(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(state.notifications.unread_for(ctx.identity_id).await?))
}

#[utoipa::path(
    post,
    path= "/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses (
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "No such notification for the caller"),
    ),
    security(("bearer" = [])),
    tag= "notifications"
)]
pub async fn mark_read(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    // Someone else's notification is reported exactly like a missing one.
    let mut notification = state
        .notifications
        .get_by_id(id)
        .await?
        .filter(|notification| notification.identity_id == ctx.identity_id)
        .ok_or(Error::NotFound("notification"))?;

    if !notification.is_read {
        notification.mark_read();
        state.notifications.save_read(&notification).await?;
    }
    Ok(Json(notification))
}
