//! Request gates: authenticate the bearer, then authorize its role or rights.
//!
//! The plain functions do the work and are what tests call. `require_identity`,
//! `require_roles` and `require_rights` wrap them as axum middleware;
//! `require_identity` stores an [`AuthContext`] in the request extensions for the
//! later stages and handlers. The role and right gates take their accepted names
//! as router state:
//!
//! ```ignore
//! router
//!     .route_layer(from_fn_with_state(Allowed(&["export"]), require_rights))
//!     .route_layer(from_fn(require_identity))
//! ```
use crate::error::{Error, Result};
use crate::identity::IdentityRepository;
use crate::passport::AppState;
use crate::permissions::{PermissionResolver, ADMIN_ROLE};
use crate::token::TokenService;
use axum::{
    extract::{Extension, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Authenticated caller, taken from the token and confirmed against the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub identity_id: Uuid,
    pub role_id: Uuid,
    pub right_ids: Vec<Uuid>,
}

/// Extract the token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// # Errors
/// `Unauthorized` if the bearer is missing or invalid, or the identity it names is
/// gone, inactive or unverified.
pub async fn authenticate(
    tokens: &TokenService,
    identities: &IdentityRepository,
    headers: &HeaderMap,
) -> Result<AuthContext> {
    let token = bearer_token(headers).ok_or(Error::Unauthorized)?;
    let claims = tokens.validate_token(token)?;

    let identity = identities
        .get_by_id(claims.principal.subject)
        .await?
        .ok_or(Error::Unauthorized)?;
    if !identity.can_authenticate() {
        debug!(identity_id = %identity.id, "identity may not authenticate");
        return Err(Error::Unauthorized);
    }

    // Role and rights come from the token, not the stored identity.
    Ok(AuthContext {
        identity_id: identity.id,
        role_id: claims.principal.role,
        right_ids: claims.principal.rights,
    })
}

/// # Errors
/// `Forbidden` unless the caller's role is one of `allowed`.
pub async fn authorize(
    permissions: &PermissionResolver,
    ctx: &AuthContext,
    allowed: &[&str],
) -> Result<()> {
    let role = permissions
        .role_by_id(ctx.role_id)
        .await?
        .ok_or(Error::Forbidden)?;
    if allowed.contains(&role.name.as_str()) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

/// # Errors
/// `Forbidden` unless the caller holds at least one right in `required`.
pub async fn authorize_specific(
    permissions: &PermissionResolver,
    ctx: &AuthContext,
    required: &[&str],
) -> Result<()> {
    let rights = permissions.rights_by_ids(&ctx.right_ids).await?;
    if rights
        .iter()
        .any(|right| required.contains(&right.name.as_str()))
    {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

/// Middleware: any active, verified identity.
pub async fn require_identity(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state.tokens, &state.identity_repo, request.headers()).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Role or right names a gate accepts.
#[derive(Clone, Copy, Debug)]
pub struct Allowed(pub &'static [&'static str]);

const ADMIN_ONLY: Allowed = Allowed(&[ADMIN_ROLE]);

#[derive(Clone, Copy)]
enum Gate {
    Roles,
    Rights,
}

async fn gate(
    kind: Gate,
    Allowed(names): Allowed,
    state: &AppState,
    request: Request,
    next: Next,
) -> Response {
    let Some(ctx) = request.extensions().get::<AuthContext>().cloned() else {
        return Error::Unauthorized.into_response();
    };
    let decision = match kind {
        Gate::Roles => authorize(&state.permissions, &ctx, names).await,
        Gate::Rights => authorize_specific(&state.permissions, &ctx, names).await,
    };
    match decision {
        Ok(()) => next.run(request).await,
        Err(err) => {
            debug!(identity_id = %ctx.identity_id, ?names, "gate refused request");
            err.into_response()
        }
    }
}

/// Middleware: the caller's role is one of the allowed names. Runs after
/// `require_identity`.
pub async fn require_roles(
    State(allowed): State<Allowed>,
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    gate(Gate::Roles, allowed, &state, request, next).await
}

/// Middleware: the caller holds at least one of the allowed rights. Runs after
/// `require_identity`.
pub async fn require_rights(
    State(allowed): State<Allowed>,
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    gate(Gate::Rights, allowed, &state, request, next).await
}

/// Middleware: the admin role.
pub async fn require_admin(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    require_roles(State(ADMIN_ONLY), Extension(state), request, next).await
}
