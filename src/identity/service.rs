use super::models::Identity;
use super::repo::IdentityRepository;
use super::secrets::{
    generate_verification_token, hash_secret, hash_verification_token, normalize_email,
    normalize_name, valid_email, verify_secret,
};
use crate::error::{Error, Result};
use crate::notifications::{DeliveryFlow, Message, NotificationPublisher};
use crate::permissions::{PermissionResolver, ADMIN_ROLE, DEFAULT_ROLE};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Input for creating an identity. `role` defaults to [`DEFAULT_ROLE`].
#[derive(Clone, Debug, Default)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub rights: Vec<String>,
}

/// How a new identity enters the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provisioning {
    /// Unverified until the emailed token is consumed.
    SelfSignup,
    /// Admin-created, social login, or the bootstrap account.
    PreVerified,
}

#[derive(Clone, Debug, Default)]
pub struct IdentityUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_active: Option<bool>,
}

/// Identity as shown to API clients: names instead of ids, no secrets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub rights: Vec<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_on: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct IdentityService {
    identities: IdentityRepository,
    permissions: PermissionResolver,
    publisher: NotificationPublisher,
    public_base_url: String,
}

impl IdentityService {
    #[must_use]
    pub fn new(
        identities: IdentityRepository,
        permissions: PermissionResolver,
        publisher: NotificationPublisher,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            identities,
            permissions,
            publisher,
            public_base_url: public_base_url.into(),
        }
    }

    #[must_use]
    pub fn repository(&self) -> &IdentityRepository {
        &self.identities
    }

    /// Public signup: never grants the admin role.
    ///
    /// # Errors
    /// `Forbidden` when the admin role is requested; otherwise see
    /// [`IdentityService::create_identity`].
    pub async fn sign_up(&self, new: NewIdentity) -> Result<Identity> {
        if new
            .role
            .as_deref()
            .is_some_and(|role| normalize_name(role) == ADMIN_ROLE)
        {
            return Err(Error::Forbidden);
        }
        self.create_identity(new, Provisioning::SelfSignup).await
    }

    /// # Errors
    /// - `Validation` for malformed input or unknown role/right names,
    /// - `Conflict` if the username or email is taken,
    /// - `Internal` on storage or hashing failures.
    pub async fn create_identity(
        &self,
        new: NewIdentity,
        provisioning: Provisioning,
    ) -> Result<Identity> {
        let username = normalize_name(&new.username);
        if username.is_empty() {
            return Err(Error::validation("username is required"));
        }
        let email = normalize_email(&new.email);
        if !valid_email(&email) {
            return Err(Error::validation("invalid email"));
        }
        if new.password.is_empty() {
            return Err(Error::validation("password is required"));
        }

        if self.identities.find_by_username(&username).await?.is_some() {
            return Err(Error::conflict("username already exists"));
        }
        if self.identities.find_by_email(&email).await?.is_some() {
            return Err(Error::conflict("email already exists"));
        }

        let role = self
            .permissions
            .role_by_name(new.role.as_deref().unwrap_or(DEFAULT_ROLE))
            .await?;
        let rights = self.permissions.rights_by_names(&new.rights).await?;

        let verification_token = match provisioning {
            Provisioning::SelfSignup => Some(generate_verification_token()?),
            Provisioning::PreVerified => None,
        };

        let identity = Identity {
            id: Uuid::now_v7(),
            username,
            email,
            password_hash: hash_secret(&new.password)?,
            is_active: true,
            is_verified: provisioning == Provisioning::PreVerified,
            verification_token_hash: verification_token.as_deref().map(hash_verification_token),
            recovery: None,
            role_id: role.id,
            right_ids: rights.iter().map(|right| right.id).collect(),
            created_on: Utc::now(),
            updated_on: None,
        };
        self.identities.create(&identity).await?;
        info!(identity_id = %identity.id, role = %role.name, "identity created");

        if let Some(token) = verification_token {
            let base = self.public_base_url.trim_end_matches('/');
            let message = Message::new(
                "email_verification",
                "Email Verification",
                format!("Verification link: {base}/verify/{token}"),
            )
            .with_param("email", identity.email.clone());
            self.publisher
                .publish(DeliveryFlow::Email, identity.id, message)
                .await?;
        }

        Ok(identity)
    }

    /// Consume a verification token. Tokens are single use.
    ///
    /// # Errors
    /// `Validation` if no identity holds the token.
    pub async fn verify_email(&self, token: &str) -> Result<Identity> {
        let token_hash = hash_verification_token(token.trim());
        let mut identity = self
            .identities
            .find_by_verification_token_hash(&token_hash)
            .await?
            .ok_or_else(|| Error::validation("invalid verification token"))?;

        identity.is_verified = true;
        identity.verification_token_hash = None;
        identity.touch();
        self.identities.save_verification(&identity).await?;
        info!(identity_id = %identity.id, "email verified");
        Ok(identity)
    }

    /// Check a username/password pair.
    ///
    /// # Errors
    /// `Unauthorized` for an unknown username or wrong password.
    pub async fn authenticate_password(&self, username: &str, password: &str) -> Result<Identity> {
        let identity = self
            .identities
            .find_by_username(&normalize_name(username))
            .await?
            .ok_or(Error::Unauthorized)?;
        if !verify_secret(password, &identity.password_hash) {
            return Err(Error::Unauthorized);
        }
        Ok(identity)
    }

    /// Re-entry point for social login once the provider vouched for `email`.
    ///
    /// No route calls this: the OAuth exchange lives in the front end that embeds
    /// the library, which hands over the provider-verified address.
    ///
    /// # Errors
    /// `Validation` for an invalid email, `Internal` on storage failures.
    pub async fn federated_sign_in(&self, verified_email: &str) -> Result<Identity> {
        let email = normalize_email(verified_email);
        if let Some(identity) = self.identities.find_by_email(&email).await? {
            return Ok(identity);
        }
        let new = NewIdentity {
            username: email.clone(),
            email,
            // Unusable password; these identities sign in through their provider.
            password: generate_verification_token()?,
            role: None,
            rights: Vec::new(),
        };
        self.create_identity(new, Provisioning::PreVerified).await
    }

    /// Create the configured admin account unless the username already exists.
    ///
    /// # Errors
    /// See [`IdentityService::create_identity`].
    pub async fn ensure_admin_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity> {
        if let Some(existing) = self
            .identities
            .find_by_username(&normalize_name(username))
            .await?
        {
            return Ok(existing);
        }
        let new = NewIdentity {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Some(ADMIN_ROLE.to_string()),
            rights: Vec::new(),
        };
        self.create_identity(new, Provisioning::PreVerified).await
    }

    /// # Errors
    /// `NotFound` if no identity has that id.
    pub async fn get(&self, id: Uuid) -> Result<Identity> {
        self.identities
            .get_by_id(id)
            .await?
            .ok_or(Error::NotFound("identity"))
    }

    pub async fn list(&self) -> Result<Vec<Identity>> {
        Ok(self.identities.list().await?)
    }

    /// # Errors
    /// `NotFound`, `Validation` for a malformed email or empty username, `Conflict` if
    /// the new username or email belongs to someone else.
    pub async fn update_identity(&self, id: Uuid, update: IdentityUpdate) -> Result<Identity> {
        let mut identity = self.get(id).await?;

        if let Some(email) = update.email {
            let email = normalize_email(&email);
            if !valid_email(&email) {
                return Err(Error::validation("invalid email"));
            }
            if email != identity.email {
                if self.identities.find_by_email(&email).await?.is_some() {
                    return Err(Error::conflict("email already exists"));
                }
                identity.email = email;
            }
        }

        if let Some(username) = update.username {
            let username = normalize_name(&username);
            if username.is_empty() {
                return Err(Error::validation("username is required"));
            }
            if username != identity.username {
                if self.identities.find_by_username(&username).await?.is_some() {
                    return Err(Error::conflict("username already exists"));
                }
                identity.username = username;
            }
        }

        if let Some(is_active) = update.is_active {
            identity.is_active = is_active;
        }

        identity.touch();
        if !self.identities.save_profile(&identity).await? {
            return Err(Error::NotFound("identity"));
        }
        Ok(identity)
    }

    /// Hard delete.
    ///
    /// # Errors
    /// `NotFound` if no identity has that id.
    pub async fn delete_identity(&self, id: Uuid) -> Result<()> {
        if !self.identities.delete_by_id(id).await? {
            return Err(Error::NotFound("identity"));
        }
        info!(identity_id = %id, "identity deleted");
        Ok(())
    }

    /// Resolve role and right ids to names for display.
    ///
    /// # Errors
    /// `Internal` on storage failures.
    pub async fn describe(&self, identity: &Identity) -> Result<IdentityView> {
        let role = match self.permissions.role_by_id(identity.role_id).await? {
            Some(role) => role.name,
            None => {
                warn!(identity_id = %identity.id, role_id = %identity.role_id, "identity references a missing role");
                String::new()
            }
        };
        let rights = self
            .permissions
            .rights_by_ids(&identity.right_ids)
            .await?
            .into_iter()
            .map(|right| right.name)
            .collect();

        Ok(IdentityView {
            id: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            role,
            rights,
            is_active: identity.is_active,
            is_verified: identity.is_verified,
            created_on: identity.created_on,
            updated_on: identity.updated_on,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::notifications::NotificationRepository;
    use crate::store::{MemoryBackend, StoreFactory};

    pub struct Harness {
        pub service: IdentityService,
        pub permissions: PermissionResolver,
        pub notifications: NotificationRepository,
    }

    pub async fn harness() -> Result<Harness> {
        let permissions = PermissionResolver::new(MemoryBackend.store(), MemoryBackend.store());
        permissions.ensure_bootstrap_roles().await?;
        let notifications = NotificationRepository::new(MemoryBackend.store());
        let service = IdentityService::new(
            IdentityRepository::new(MemoryBackend.store()),
            permissions.clone(),
            NotificationPublisher::new(notifications.clone()),
            "https://passport.test/",
        );
        Ok(Harness {
            service,
            permissions,
            notifications,
        })
    }

    pub fn new_identity(username: &str, email: &str) -> NewIdentity {
        NewIdentity {
            username: username.to_string(),
            email: email.to_string(),
            password: "OldPass!1".to_string(),
            ..NewIdentity::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{harness, new_identity};
    use super::*;

    #[tokio::test]
    async fn signup_creates_unverified_identity_and_queues_verification() -> Result<()> {
        let h = harness().await?;
        let identity = h
            .service
            .sign_up(new_identity("Bob", " Bob@Example.com "))
            .await?;

        assert_eq!(identity.username, "bob");
        assert_eq!(identity.email, "bob@example.com");
        assert!(!identity.is_verified);
        assert!(identity.is_active);
        assert!(identity.verification_token_hash.is_some());
        assert_ne!(identity.password_hash, "OldPass!1");

        let queued = h.notifications.pending_email().await?;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].identity_id, identity.id);
        assert_eq!(queued[0].topic, "email_verification");
        assert_eq!(queued[0].recipient(), Some("bob@example.com"));
        assert!(queued[0]
            .body
            .starts_with("Verification link: https://passport.test/verify/"));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_a_conflict() -> Result<()> {
        let h = harness().await?;
        h.service
            .sign_up(new_identity("bob", "bob@example.com"))
            .await?;

        let err = h
            .service
            .sign_up(new_identity("BOB", "other@example.com"))
            .await;
        assert!(matches!(err, Err(Error::Conflict(m)) if m == "username already exists"));

        let err = h
            .service
            .sign_up(new_identity("robert", "BOB@example.com"))
            .await;
        assert!(matches!(err, Err(Error::Conflict(m)) if m == "email already exists"));

        h.service
            .sign_up(new_identity("alice", "alice@example.com"))
            .await?;
        assert_eq!(h.service.list().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn signup_cannot_request_admin() -> Result<()> {
        let h = harness().await?;
        let mut new = new_identity("mallory", "mallory@example.com");
        new.role = Some(" Admin".to_string());
        assert!(matches!(h.service.sign_up(new).await, Err(Error::Forbidden)));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_invalid_input() -> Result<()> {
        let h = harness().await?;
        for new in [
            new_identity("", "a@example.com"),
            new_identity("a", "not-an-email"),
            NewIdentity {
                password: String::new(),
                ..new_identity("a", "a@example.com")
            },
            NewIdentity {
                role: Some("ghost".to_string()),
                ..new_identity("a", "a@example.com")
            },
            NewIdentity {
                rights: vec!["export".to_string()],
                ..new_identity("a", "a@example.com")
            },
        ] {
            assert!(matches!(
                h.service.sign_up(new).await,
                Err(Error::Validation(_))
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn verification_token_is_single_use() -> Result<()> {
        let h = harness().await?;
        let identity = h
            .service
            .sign_up(new_identity("bob", "bob@example.com"))
            .await?;
        let body = h.notifications.pending_email().await?[0].body.clone();
        let token = body.rsplit('/').next().unwrap_or_default().to_string();

        let verified = h.service.verify_email(&token).await?;
        assert_eq!(verified.id, identity.id);
        assert!(verified.is_verified);
        assert!(verified.verification_token_hash.is_none());

        assert!(matches!(
            h.service.verify_email(&token).await,
            Err(Error::Validation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn password_authentication() -> Result<()> {
        let h = harness().await?;
        h.service
            .sign_up(new_identity("bob", "bob@example.com"))
            .await?;

        assert!(h.service.authenticate_password("Bob", "OldPass!1").await.is_ok());
        assert!(matches!(
            h.service.authenticate_password("bob", "wrong").await,
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            h.service.authenticate_password("nobody", "OldPass!1").await,
            Err(Error::Unauthorized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn admin_account_and_federated_identities_are_pre_verified() -> Result<()> {
        let h = harness().await?;
        let admin = h
            .service
            .ensure_admin_account("root", "root@example.com", "secret")
            .await?;
        assert!(admin.is_verified);
        let again = h
            .service
            .ensure_admin_account("root", "root@example.com", "secret")
            .await?;
        assert_eq!(admin.id, again.id);
        assert_eq!(h.service.describe(&admin).await?.role, ADMIN_ROLE);

        let social = h.service.federated_sign_in("Carol@Example.com").await?;
        assert!(social.is_verified);
        assert_eq!(social.email, "carol@example.com");
        assert_eq!(
            h.service.federated_sign_in("carol@example.com").await?.id,
            social.id
        );
        // Neither path sends a verification email.
        assert!(h.notifications.pending_email().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn update_and_delete() -> Result<()> {
        let h = harness().await?;
        let bob = h
            .service
            .sign_up(new_identity("bob", "bob@example.com"))
            .await?;
        h.service
            .sign_up(new_identity("alice", "alice@example.com"))
            .await?;

        let conflict = h
            .service
            .update_identity(
                bob.id,
                IdentityUpdate {
                    email: Some("alice@example.com".to_string()),
                    ..IdentityUpdate::default()
                },
            )
            .await;
        assert!(matches!(conflict, Err(Error::Conflict(_))));

        let updated = h
            .service
            .update_identity(
                bob.id,
                IdentityUpdate {
                    email: Some("robert@example.com".to_string()),
                    username: Some("robert".to_string()),
                    is_active: Some(false),
                },
            )
            .await?;
        assert_eq!(updated.username, "robert");
        assert_eq!(updated.email, "robert@example.com");
        assert!(!updated.is_active);
        assert!(updated.updated_on.is_some());

        h.service.delete_identity(bob.id).await?;
        assert!(matches!(
            h.service.get(bob.id).await,
            Err(Error::NotFound("identity"))
        ));
        assert!(matches!(
            h.service.delete_identity(bob.id).await,
            Err(Error::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn describe_resolves_names() -> Result<()> {
        let h = harness().await?;
        h.permissions.create_right("export").await?;
        let mut new = new_identity("bob", "bob@example.com");
        new.rights = vec!["Export".to_string()];
        let bob = h.service.sign_up(new).await?;

        let view = h.service.describe(&bob).await?;
        assert_eq!(view.role, DEFAULT_ROLE);
        assert_eq!(view.rights, vec!["export".to_string()]);
        Ok(())
    }
}
