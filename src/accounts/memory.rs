use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    permission::{Permission, PermissionCode, PermissionSet},
    role::Role,
    store::{AccountStore, StoreError, StoreResult},
    user::{PermissionHolder, User},
};

#[derive(Default)]
struct Inner {
    permissions: BTreeMap<PermissionCode, Permission>,
    roles: HashMap<Uuid, Role>,
    users: HashMap<Uuid, User>,
}

impl Inner {
    fn check_known(&self, permissions: &PermissionSet) -> StoreResult<()> {
        if permissions.iter().all(|c| self.permissions.contains_key(c)) {
            Ok(())
        } else {
            Err(StoreError::UnknownPermission)
        }
    }

    fn check_user_row(&self, user: &User) -> StoreResult<()> {
        if let Some(role_id) = user.role_id {
            if !self.roles.contains_key(&role_id) {
                return Err(StoreError::NotFound { entity: "role" });
            }
        }
        for other in self.users.values().filter(|u| u.id != user.id) {
            if user.email.is_some() && other.email == user.email {
                return Err(StoreError::Conflict { field: "email" });
            }
            if user.username.is_some() && other.username == user.username {
                return Err(StoreError::Conflict { field: "username" });
            }
            if user.phone_number.is_some() && other.phone_number == user.phone_number {
                return Err(StoreError::Conflict { field: "phone_number" });
            }
        }
        Ok(())
    }
}

/// In-memory [`AccountStore`] with the same constraints as the Postgres schema.
#[derive(Default)]
pub struct MemoryAccountStore {
    inner: Mutex<Inner>,
    reads: AtomicUsize,
    user_writes: AtomicUsize,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of user lookups served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of successful user inserts and updates.
    pub fn user_writes(&self) -> usize {
        self.user_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn register_permission(&self, permission: &Permission) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .permissions
            .insert(permission.code.clone(), permission.clone());
        Ok(())
    }

    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_known(&role.permissions)?;
        inner.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn get_role(&self, id: Uuid) -> StoreResult<Option<Role>> {
        Ok(self.inner.lock().unwrap().roles.get(&id).cloned())
    }

    async fn set_role_permissions(
        &self,
        id: Uuid,
        permissions: &PermissionSet,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_known(permissions)?;
        let role = inner
            .roles
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "role" })?;
        role.permissions = permissions.clone();
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.roles.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "role" });
        }
        let before = inner.users.len();
        inner.users.retain(|_, u| u.role_id != Some(id));
        Ok((before - inner.users.len()) as u64)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn list_user_ids_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .filter(|u| u.role_id == Some(role_id))
            .map(|u| u.id)
            .collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict { field: "id" });
        }
        inner.check_user_row(user)?;
        let mut row = user.clone();
        row.permissions = PermissionHolder::default();
        inner.users.insert(row.id, row);
        self.user_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_user_row(user)?;
        let stored = inner
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        let granted = std::mem::take(&mut stored.permissions);
        *stored = user.clone();
        stored.permissions = granted;
        self.user_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn grant_user_permissions(
        &self,
        user_id: Uuid,
        permissions: &PermissionSet,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_known(permissions)?;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        user.permissions.grant_all(permissions);
        Ok(())
    }
}
