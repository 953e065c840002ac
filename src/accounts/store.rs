use async_trait::async_trait;
use uuid::Uuid;

use super::{
    permission::{Permission, PermissionSet},
    role::Role,
    user::User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness violation on `email`, `username` or `phone_number`.
    #[error("a record with this {field} already exists")]
    Conflict { field: &'static str },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("unknown permission code")]
    UnknownPermission,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for users, roles and the permission catalog.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn register_permission(&self, permission: &Permission) -> StoreResult<()>;

    async fn insert_role(&self, role: &Role) -> StoreResult<()>;
    async fn get_role(&self, id: Uuid) -> StoreResult<Option<Role>>;
    /// Replaces the role's permission set.
    async fn set_role_permissions(&self, id: Uuid, permissions: &PermissionSet)
        -> StoreResult<()>;
    /// Deletes the role and every user referencing it. Returns the number of
    /// users removed.
    async fn delete_role(&self, id: Uuid) -> StoreResult<u64>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn list_user_ids_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>>;
    /// Writes the user row. Direct grants are written with
    /// [`AccountStore::grant_user_permissions`].
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    /// Adds grants; existing grants are kept.
    async fn grant_user_permissions(
        &self,
        user_id: Uuid,
        permissions: &PermissionSet,
    ) -> StoreResult<()>;
}
