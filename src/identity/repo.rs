use super::models::Identity;
use crate::store::{DocumentStore, Filter, SharedStore, StoreResult};
use uuid::Uuid;

/// Identity lookups on top of the generic document store.
#[derive(Clone)]
pub struct IdentityRepository {
    store: SharedStore<Identity>,
}

impl IdentityRepository {
    #[must_use]
    pub fn new(store: SharedStore<Identity>) -> Self {
        Self { store }
    }

    pub async fn create(&self, identity: &Identity) -> StoreResult<()> {
        self.store.create(identity).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        self.store.get_by_id(id).await
    }

    /// Persist the recovery challenge only.
    pub async fn save_recovery(&self, identity: &Identity) -> StoreResult<bool> {
        self.store
            .save_fields(identity, &["recovery", "updatedOn"])
            .await
    }

    /// Persist a new password hash together with the cleared challenge.
    pub async fn save_password(&self, identity: &Identity) -> StoreResult<bool> {
        self.store
            .save_fields(identity, &["passwordHash", "recovery", "updatedOn"])
            .await
    }

    pub async fn save_verification(&self, identity: &Identity) -> StoreResult<bool> {
        self.store
            .save_fields(
                identity,
                &["isVerified", "verificationTokenHash", "updatedOn"],
            )
            .await
    }

    /// Persist the admin-editable fields.
    pub async fn save_profile(&self, identity: &Identity) -> StoreResult<bool> {
        self.store
            .save_fields(identity, &["username", "email", "isActive", "updatedOn"])
            .await
    }

    pub async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        self.store.delete_by_id(id).await
    }

    pub async fn list(&self) -> StoreResult<Vec<Identity>> {
        self.store.find(&Filter::All).await
    }

    /// `username` must already be normalized.
    pub async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        self.store
            .find_one(&Filter::eq("username", username))
            .await
    }

    /// `email` must already be normalized.
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        self.store.find_one(&Filter::eq("email", email)).await
    }

    pub async fn find_by_verification_token_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<Identity>> {
        self.store
            .find_one(&Filter::eq("verificationTokenHash", token_hash))
            .await
    }
}
