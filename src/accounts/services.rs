use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    permission::{Permission, PermissionCode, PermissionSet},
    role::Role,
    store::{AccountStore, StoreError, StoreResult},
    user::{NewUser, User, WriteKind},
};

/// Attempts at finding a free generated username before giving up.
const USERNAME_ATTEMPTS: usize = 5;

/// Applies the username regeneration rule. Returns `true` if a new username
/// was generated.
pub fn refresh_username<R: Rng + ?Sized>(user: &mut User, kind: WriteKind, rng: &mut R) -> bool {
    if user.needs_new_username(kind) {
        user.username = Some(user.generate_username_with(rng));
        true
    } else {
        false
    }
}

/// Writes the user row. A username conflict on a username generated here is
/// retried with a fresh one; every other failure is returned as-is.
async fn write_user<R: Rng + Send + ?Sized>(
    store: &dyn AccountStore,
    user: &mut User,
    kind: WriteKind,
    rng: &mut R,
) -> StoreResult<()> {
    let generated = refresh_username(user, kind, rng);
    let mut attempt = 1;
    loop {
        let result = match kind {
            WriteKind::Insert => store.insert_user(user).await,
            WriteKind::Update => store.update_user(user).await,
        };
        match result {
            Err(StoreError::Conflict { field: "username" })
                if generated && attempt < USERNAME_ATTEMPTS =>
            {
                warn!(username = ?user.username, attempt, "generated username taken, retrying");
                user.username = Some(user.generate_username_with(rng));
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Grants the user's role permissions, in memory and in the store.
pub async fn assign_role_permissions(
    store: &dyn AccountStore,
    user: &mut User,
) -> StoreResult<usize> {
    let Some(role_id) = user.role_id else {
        return Ok(0);
    };
    let role = store
        .get_role(role_id)
        .await?
        .ok_or(StoreError::NotFound { entity: "role" })?;
    let added = user.assign_role_permissions(Some(&role));
    store.grant_user_permissions(user.id, &role.permissions).await?;
    debug!(user_id = %user.id, role_id = %role.id, added, "role permissions assigned");
    Ok(added)
}

pub(crate) async fn save_user_with<R: Rng + Send + ?Sized>(
    store: &dyn AccountStore,
    user: &mut User,
    kind: WriteKind,
    rng: &mut R,
) -> StoreResult<()> {
    write_user(store, user, kind, rng).await?;
    assign_role_permissions(store, user).await?;
    Ok(())
}

/// Username refresh, row write, then role permission grant. The grant only
/// runs once the write succeeded.
pub async fn save_user(store: &dyn AccountStore, user: &mut User, kind: WriteKind) -> StoreResult<()> {
    save_user_with(store, user, kind, &mut StdRng::from_entropy()).await
}

#[instrument(skip(store, new), fields(email = ?new.email))]
pub async fn create_user(store: &dyn AccountStore, new: NewUser) -> anyhow::Result<User> {
    let mut user = User::new(new)?;
    save_user(store, &mut user, WriteKind::Insert).await?;
    info!(user_id = %user.id, username = ?user.username, "user created");
    Ok(user)
}

#[instrument(skip(store, user), fields(user_id = %user.id))]
pub async fn update_user(store: &dyn AccountStore, user: &mut User) -> StoreResult<()> {
    save_user(store, user, WriteKind::Update).await
}

pub async fn register_permission(
    store: &dyn AccountStore,
    code: &str,
    name: &str,
) -> StoreResult<Permission> {
    let permission = Permission {
        code: PermissionCode::new(code),
        name: name.to_string(),
    };
    store.register_permission(&permission).await?;
    Ok(permission)
}

pub async fn create_role(
    store: &dyn AccountStore,
    name: Option<String>,
    permissions: PermissionSet,
) -> StoreResult<Role> {
    let role = Role::new(name, permissions);
    store.insert_role(&role).await?;
    info!(role_id = %role.id, role = %role, "role created");
    Ok(role)
}

/// Re-runs the permission assignment of every user holding the role.
/// Returns the number of users visited.
#[instrument(skip(store))]
pub async fn propagate_role_permissions(
    store: &dyn AccountStore,
    role_id: Uuid,
) -> StoreResult<usize> {
    let user_ids = store.list_user_ids_with_role(role_id).await?;
    let mut visited = 0;
    for id in user_ids {
        // Removed since the listing.
        let Some(mut user) = store.get_user(id).await? else {
            continue;
        };
        assign_role_permissions(store, &mut user).await?;
        visited += 1;
    }
    info!(%role_id, users = visited, "role permissions propagated");
    Ok(visited)
}

/// Replaces the role's permissions and propagates them to its users.
pub async fn set_role_permissions(
    store: &dyn AccountStore,
    role_id: Uuid,
    permissions: PermissionSet,
) -> StoreResult<usize> {
    store.set_role_permissions(role_id, &permissions).await?;
    propagate_role_permissions(store, role_id).await
}

/// Deletes the role together with every user referencing it.
pub async fn delete_role(store: &dyn AccountStore, role_id: Uuid) -> StoreResult<u64> {
    let removed = store.delete_role(role_id).await?;
    warn!(%role_id, users_removed = removed, "role deleted");
    Ok(removed)
}
