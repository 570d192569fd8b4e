use super::models::Permission;
use crate::store::{DocumentStore, Filter, SharedStore, StoreResult};
use uuid::Uuid;

/// Roles and rights share one repository shape.
pub struct PermissionRepository<T> {
    store: SharedStore<T>,
}

impl<T> Clone for PermissionRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: Permission> PermissionRepository<T> {
    #[must_use]
    pub fn new(store: SharedStore<T>) -> Self {
        Self { store }
    }

    pub async fn create(&self, permission: &T) -> StoreResult<()> {
        self.store.create(permission).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>> {
        self.store.get_by_id(id).await
    }

    pub async fn save_name(&self, permission: &T) -> StoreResult<bool> {
        self.store
            .save_fields(permission, &["name", "updatedOn"])
            .await
    }

    pub async fn list(&self) -> StoreResult<Vec<T>> {
        self.store.find(&Filter::All).await
    }

    /// `name` must already be normalized.
    pub async fn find_by_name(&self, name: &str) -> StoreResult<Option<T>> {
        self.store.find_one(&Filter::eq("name", name)).await
    }

    pub async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<T>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        self.store
            .find(&Filter::is_in("name", names.iter().map(String::as_str)))
            .await
    }

    pub async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.iter().map(Uuid::to_string);
        self.store.find(&Filter::is_in("id", ids)).await
    }
}
