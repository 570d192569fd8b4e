use crate::{
    authz::{require_admin, require_identity},
    identity::{IdentityRepository, IdentityService},
    notifications::{NotificationPublisher, NotificationRepository},
    permissions::PermissionResolver,
    recovery::RecoveryFlow,
    store::StoreFactory,
    token::TokenService,
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn,
    routing::{get, patch, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Process-wide facts fixed at startup.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub started_at: DateTime<Utc>,
    /// Base for links placed in outgoing email, e.g. `https://id.example.com`.
    pub public_base_url: String,
}

impl AppContext {
    #[must_use]
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            started_at: Utc::now(),
            public_base_url: public_base_url.into(),
        }
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Everything a handler can reach, shared behind an `Arc` extension.
#[derive(Clone)]
pub struct AppState {
    pub context: AppContext,
    pub tokens: TokenService,
    pub identities: IdentityService,
    pub identity_repo: IdentityRepository,
    pub permissions: PermissionResolver,
    pub recovery: RecoveryFlow,
    pub notifications: NotificationRepository,
}

impl AppState {
    /// Wire services over stores created by `backend`.
    #[must_use]
    pub fn new(context: AppContext, tokens: TokenService, backend: &impl StoreFactory) -> Self {
        let identity_repo = IdentityRepository::new(backend.store());
        let notifications = NotificationRepository::new(backend.store());
        let permissions = PermissionResolver::new(backend.store(), backend.store());
        let publisher = NotificationPublisher::new(notifications.clone());

        Self {
            identities: IdentityService::new(
                identity_repo.clone(),
                permissions.clone(),
                publisher.clone(),
                context.public_base_url.clone(),
            ),
            recovery: RecoveryFlow::new(identity_repo.clone(), publisher),
            context,
            tokens,
            identity_repo,
            permissions,
            notifications,
        }
    }
}

/// All routes with their gates and the shared middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    use handlers::{health, jwks, notifications, permissions, recovery, token, users};

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/users", post(users::sign_up))
        .route("/verify/:token", post(users::verify_email))
        .route("/token", post(token::token))
        .route("/.well-known/jwks.json", get(jwks::jwks))
        .route("/password-recovery/email", post(recovery::initiate))
        .route("/password-recovery/exchange", post(recovery::exchange))
        .route("/password-recovery/reset", post(recovery::reset));

    let authenticated = Router::new()
        .route("/users/:id", get(users::get_user))
        .route("/notifications", get(notifications::unread))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route_layer(from_fn(require_identity));

    let admin = Router::new()
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            patch(users::update_user).delete(users::delete_user),
        )
        .route("/admins", post(users::create_admin))
        .route(
            "/roles",
            post(permissions::create_role).get(permissions::list_roles),
        )
        .route("/roles/:id", put(permissions::rename_role))
        .route(
            "/rights",
            post(permissions::create_right).get(permissions::list_rights),
        )
        .route("/rights/:id", put(permissions::rename_right))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn(require_identity));

    public.merge(authenticated).merge(admin).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state)),
    )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
