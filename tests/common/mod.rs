//! Shared helpers for the HTTP integration tests.
#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64ct::{Base64, Encoding};
use passport::{
    passport::{router, AppContext, AppState},
    store::MemoryBackend,
    token::TokenService,
};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tower::ServiceExt;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// In-memory state with the bootstrap roles in place.
pub async fn state() -> Result<Arc<AppState>> {
    let tokens = TokenService::new(fixture("signing_key.pem"), fixture("signing_key.pub.pem"));
    let state = AppState::new(
        AppContext::new("https://passport.test"),
        tokens,
        &MemoryBackend,
    );
    state.permissions.ensure_bootstrap_roles().await?;
    Ok(Arc::new(state))
}

pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

impl Response {
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).with_context(|| format!("not JSON: {}", self.body))
    }
}

pub enum Auth<'a> {
    None,
    Basic(&'a str, &'a str),
    Bearer(&'a str),
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Auth<'_>,
    body: Option<Value>,
) -> Result<Response> {
    let mut request = Request::builder().method(method).uri(uri);
    match auth {
        Auth::None => {}
        Auth::Basic(username, password) => {
            let encoded = Base64::encode_string(format!("{username}:{password}").as_bytes());
            request = request.header(header::AUTHORIZATION, format!("Basic {encoded}"));
        }
        Auth::Bearer(token) => {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(Response {
        status,
        body: String::from_utf8(bytes.to_vec())?,
    })
}

pub fn app(state: &Arc<AppState>) -> Router {
    router(state.clone())
}

/// Body of the newest queued email on `topic`.
pub async fn last_email(state: &AppState, topic: &str) -> Result<String> {
    state
        .notifications
        .pending_email()
        .await?
        .into_iter()
        .filter(|notification| notification.topic == topic)
        .last()
        .map(|notification| notification.body)
        .with_context(|| format!("no queued {topic} email"))
}

/// Sign up and verify through the API, returning the new identity id.
pub async fn verified_user(
    app: &Router,
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<String> {
    let response = send(
        app,
        Method::POST,
        "/users",
        Auth::None,
        Some(serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        })),
    )
    .await?;
    anyhow::ensure!(
        response.status == StatusCode::CREATED,
        "signup failed: {} {}",
        response.status,
        response.body
    );
    let id = response.json()?["id"]
        .as_str()
        .context("signup response has no id")?
        .to_string();

    let link = last_email(state, "email_verification").await?;
    let token = link.rsplit('/').next().context("no token in link")?;
    let response = send(
        app,
        Method::POST,
        &format!("/verify/{token}"),
        Auth::None,
        None,
    )
    .await?;
    anyhow::ensure!(
        response.status == StatusCode::NO_CONTENT,
        "verification failed: {}",
        response.status
    );
    Ok(id)
}

/// Password sign-in; returns the access token.
pub async fn sign_in(app: &Router, username: &str, password: &str) -> Result<String> {
    let response = send(
        app,
        Method::POST,
        "/token",
        Auth::Basic(username, password),
        None,
    )
    .await?;
    anyhow::ensure!(
        response.status == StatusCode::OK,
        "sign in failed: {} {}",
        response.status,
        response.body
    );
    Ok(response.json()?["accessToken"]
        .as_str()
        .context("no access token")?
        .to_string())
}
