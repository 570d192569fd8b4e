use super::handlers::{health, jwks, notifications, permissions, recovery, token, users};
use crate::identity::IdentityView;
use crate::notifications::{DeliveryFlow, Notification};
use crate::permissions::{Right, Role};
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, InfoBuilder, License,
    },
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        jwks::jwks,
        token::token,
        users::sign_up,
        users::verify_email,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::create_admin,
        recovery::initiate,
        recovery::exchange,
        recovery::reset,
        permissions::create_role,
        permissions::list_roles,
        permissions::rename_role,
        permissions::create_right,
        permissions::list_rights,
        permissions::rename_right,
        notifications::unread,
        notifications::mark_read,
    ),
    components(schemas(
        health::Health,
        token::TokenResponse,
        users::SignUpRequest,
        users::SignUpResponse,
        users::UpdateUserRequest,
        users::CreateAdminRequest,
        recovery::RecoveryEmailRequest,
        recovery::ExchangeRequest,
        recovery::ExchangeResponse,
        recovery::ResetRequest,
        permissions::NameRequest,
        IdentityView,
        Role,
        Right,
        Notification,
        DeliveryFlow,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "token", description = "Token issuance and the public signing key"),
        (name = "users", description = "Signup, verification and identity administration"),
        (name = "recovery", description = "Password recovery"),
        (name = "permissions", description = "Roles and rights"),
        (name = "notifications", description = "In-app notifications"),
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "basic",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
        );
    }
}

/// The API description, with info taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });
    doc.info = info;

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(s: &str) -> Option<&str> {
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    }

    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_comes_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact.unwrap_or_default();
        assert_eq!(contact.name.as_deref(), Some("Team Passport"));
        assert_eq!(contact.email.as_deref(), Some("team@passport.dev"));
        assert_eq!(
            spec.info.license.map(|license| license.name).as_deref(),
            Some("BSD-3-Clause")
        );
    }

    #[test]
    fn documents_every_route() {
        let spec = openapi();
        for path in [
            "/health",
            "/token",
            "/.well-known/jwks.json",
            "/users",
            "/users/{id}",
            "/admins",
            "/verify/{token}",
            "/password-recovery/email",
            "/password-recovery/exchange",
            "/password-recovery/reset",
            "/roles",
            "/roles/{id}",
            "/rights",
            "/rights/{id}",
            "/notifications",
            "/notifications/{id}/read",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = spec
            .components
            .map(|components| components.security_schemes)
            .unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
        assert!(schemes.contains_key("basic"));
    }

    #[test]
    fn parses_authors() {
        assert_eq!(
            parse_author("Team Passport <team@passport.dev>"),
            (Some("Team Passport"), Some("team@passport.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author(""), (None, None));
    }
}
