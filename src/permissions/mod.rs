//! Roles and rights.
//!
//! `PermissionResolver` is the only way the rest of the crate turns role/right ids
//! into names and back. Names are trimmed and lowercased before they are stored or
//! looked up.
use crate::error::{Error, Result};
use crate::identity::secrets::normalize_name;
use crate::store::{SharedStore, StoreError};
use tracing::info;
use uuid::Uuid;

pub mod models;
pub mod repo;

pub use self::models::{Permission, Right, Role};
pub use self::repo::PermissionRepository;

/// Role every deployment starts with.
pub const ADMIN_ROLE: &str = "admin";

/// Role assigned on self-signup when none is requested.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Clone)]
pub struct PermissionResolver {
    roles: PermissionRepository<Role>,
    rights: PermissionRepository<Right>,
}

impl PermissionResolver {
    #[must_use]
    pub fn new(roles: SharedStore<Role>, rights: SharedStore<Right>) -> Self {
        Self {
            roles: PermissionRepository::new(roles),
            rights: PermissionRepository::new(rights),
        }
    }

    /// Make sure the bootstrap roles exist. Safe to call concurrently and repeatedly.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn ensure_bootstrap_roles(&self) -> Result<Role> {
        ensure(&self.roles, DEFAULT_ROLE).await?;
        ensure(&self.roles, ADMIN_ROLE).await
    }

    pub async fn create_role(&self, name: &str) -> Result<Role> {
        create(&self.roles, name).await
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.list().await?)
    }

    pub async fn rename_role(&self, id: Uuid, name: &str) -> Result<Role> {
        rename(&self.roles, id, name).await
    }

    pub async fn role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        Ok(self.roles.get_by_id(id).await?)
    }

    /// # Errors
    /// Returns `Validation` if no role has that name.
    pub async fn role_by_name(&self, name: &str) -> Result<Role> {
        self.roles
            .find_by_name(&normalize_name(name))
            .await?
            .ok_or_else(|| Error::validation(format!("role not found: {}", name.trim())))
    }

    pub async fn create_right(&self, name: &str) -> Result<Right> {
        create(&self.rights, name).await
    }

    pub async fn list_rights(&self) -> Result<Vec<Right>> {
        Ok(self.rights.list().await?)
    }

    pub async fn rename_right(&self, id: Uuid, name: &str) -> Result<Right> {
        rename(&self.rights, id, name).await
    }

    /// Resolve right ids; ids that no longer exist are skipped.
    pub async fn rights_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Right>> {
        Ok(self.rights.find_by_ids(ids).await?)
    }

    /// Resolve right names to rights.
    ///
    /// # Errors
    /// Returns `Validation` naming the first right that does not exist.
    pub async fn rights_by_names(&self, names: &[String]) -> Result<Vec<Right>> {
        let names: Vec<String> = names.iter().map(|name| normalize_name(name)).collect();
        let rights = self.rights.find_by_names(&names).await?;
        if let Some(missing) = names
            .iter()
            .find(|name| !rights.iter().any(|right| &right.name == *name))
        {
            return Err(Error::validation(format!("right not found: {missing}")));
        }
        Ok(rights)
    }
}

async fn ensure<T: Permission>(repo: &PermissionRepository<T>, name: &str) -> Result<T> {
    if let Some(existing) = repo.find_by_name(name).await? {
        return Ok(existing);
    }
    let permission = T::new(name.to_string());
    match repo.create(&permission).await {
        Ok(()) => {
            info!(kind = T::KIND, name, "created bootstrap {}", T::KIND);
            Ok(permission)
        }
        // Lost a race with another instance; theirs is as good as ours.
        Err(StoreError::Duplicate(_)) => repo
            .find_by_name(name)
            .await?
            .ok_or(Error::NotFound(T::KIND)),
        Err(err) => Err(err.into()),
    }
}

fn valid_name<T: Permission>(name: &str) -> Result<String> {
    let name = normalize_name(name);
    if name.is_empty() {
        return Err(Error::validation(format!("{} name is required", T::KIND)));
    }
    Ok(name)
}

async fn create<T: Permission>(repo: &PermissionRepository<T>, name: &str) -> Result<T> {
    let name = valid_name::<T>(name)?;
    if repo.find_by_name(&name).await?.is_some() {
        return Err(Error::conflict(format!("{} already exists: {name}", T::KIND)));
    }
    let permission = T::new(name);
    repo.create(&permission).await?;
    Ok(permission)
}

async fn rename<T: Permission>(repo: &PermissionRepository<T>, id: Uuid, name: &str) -> Result<T> {
    let name = valid_name::<T>(name)?;
    let mut permission = repo.get_by_id(id).await?.ok_or(Error::NotFound(T::KIND))?;
    if permission.name() == name {
        return Ok(permission);
    }
    if repo.find_by_name(&name).await?.is_some() {
        return Err(Error::conflict(format!("{} already exists: {name}", T::KIND)));
    }
    permission.rename(name);
    if !repo.save_name(&permission).await? {
        return Err(Error::NotFound(T::KIND));
    }
    Ok(permission)
}
