use crate::passport::{AppState, GIT_COMMIT_HASH};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    started_at: DateTime<Utc>,
    uptime_seconds: i64,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Service is up", body = Health),
    ),
    tag= "health"
)]
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.context.started_at,
        uptime_seconds: state.context.uptime_seconds(),
    };

    (x_app(&health), Json(health))
}

/// `X-App: name:version:shortcommit`, empty when the value is not a valid header.
fn x_app(health: &Health) -> HeaderMap {
    let short_hash = health.commit.get(..7).unwrap_or_default();
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&format!("{}:{}:{short_hash}", health.name, health.version)) {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("invalid X-App header: {err}"),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(commit: &str) -> Health {
        Health {
            commit: commit.to_string(),
            name: "passport".to_string(),
            version: "0.1.0".to_string(),
            started_at: Utc::now(),
            uptime_seconds: 0,
        }
    }

    #[test]
    fn x_app_carries_the_short_commit() {
        let headers = x_app(&health("0123456789abcdef"));
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("passport:0.1.0:0123456")
        );

        let headers = x_app(&health("unknown"));
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("passport:0.1.0:unknown")
        );
    }
}
