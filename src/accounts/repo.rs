use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    permission::{Permission, PermissionSet},
    role::Role,
    store::{AccountStore, StoreError, StoreResult},
    user::{Credential, PermissionHolder, User},
};

const USER_COLUMNS: &str = "id, name, email, username, phone_number, role_id, image, \
     password_hash, reset_otp, otp_created_at, created_at, is_active, is_staff";

/// User row in the database.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: Option<String>,
    email: Option<String>,
    username: Option<String>,
    phone_number: Option<String>,
    role_id: Option<Uuid>,
    image: Option<String>,
    password_hash: Option<String>,
    reset_otp: Option<String>,
    otp_created_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    is_active: bool,
    is_staff: bool,
}

impl UserRow {
    fn into_user(self, granted: PermissionSet) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            username: self.username,
            phone_number: self.phone_number,
            role_id: self.role_id,
            image: self.image,
            credential: Credential::from_hash(self.password_hash),
            reset_otp: self.reset_otp,
            otp_created_at: self.otp_created_at,
            created_at: self.created_at,
            is_active: self.is_active,
            is_staff: self.is_staff,
            permissions: PermissionHolder::new(granted),
        }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: Option<String>,
    created_at: OffsetDateTime,
}

/// Field named by a unique constraint of the `users` table.
fn conflict_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "email",
        Some("users_username_key") => "username",
        Some("users_phone_number_key") => "phone_number",
        _ => "key",
    }
}

/// Error for a write that referenced a missing row.
fn missing_reference(constraint: Option<&str>) -> StoreError {
    match constraint {
        Some("role_permissions_codename_fkey" | "user_permissions_codename_fkey") => {
            StoreError::UnknownPermission
        }
        Some("user_permissions_user_id_fkey") => StoreError::NotFound { entity: "user" },
        _ => StoreError::NotFound { entity: "role" },
    }
}

/// Maps constraint violations onto store errors.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict {
                field: conflict_field(db.constraint()),
            };
        }
        if db.is_foreign_key_violation() {
            return missing_reference(db.constraint());
        }
    }
    StoreError::Database(err)
}

/// Postgres-backed [`AccountStore`].
#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn user_grants(&self, user_id: Uuid) -> StoreResult<PermissionSet> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"SELECT codename FROM user_permissions WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(codes.into_iter().collect())
    }

    async fn hydrate(&self, row: Option<UserRow>) -> StoreResult<Option<User>> {
        match row {
            Some(row) => {
                let granted = self.user_grants(row.id).await?;
                Ok(Some(row.into_user(granted)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn register_permission(&self, permission: &Permission) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permissions (codename, name)
            VALUES ($1, $2)
            ON CONFLICT (codename) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(permission.code.as_str())
        .bind(&permission.name)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(r#"INSERT INTO roles (id, name, created_at) VALUES ($1, $2, $3)"#)
            .bind(role.id)
            .bind(&role.name)
            .bind(role.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, codename)
            SELECT $1, UNNEST($2::text[])
            "#,
        )
        .bind(role.id)
        .bind(role.permissions.to_strings())
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_role(&self, id: Uuid) -> StoreResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"SELECT id, name, created_at FROM roles WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let codes = sqlx::query_scalar::<_, String>(
            r#"SELECT codename FROM role_permissions WHERE role_id = $1"#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        Ok(Some(Role {
            id: row.id,
            name: row.name,
            permissions: codes.into_iter().collect(),
            created_at: row.created_at,
        }))
    }

    async fn set_role_permissions(
        &self,
        id: Uuid,
        permissions: &PermissionSet,
    ) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        let exists = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM roles WHERE id = $1"#)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(StoreError::NotFound { entity: "role" });
        }
        sqlx::query(r#"DELETE FROM role_permissions WHERE role_id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, codename)
            SELECT $1, UNNEST($2::text[])
            "#,
        )
        .bind(id)
        .bind(permissions.to_strings())
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<u64> {
        let mut tx = self.db.begin().await?;
        let users = sqlx::query(r#"DELETE FROM users WHERE role_id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let roles = sqlx::query(r#"DELETE FROM roles WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if roles == 0 {
            return Err(StoreError::NotFound { entity: "role" });
        }
        tx.commit().await?;
        Ok(users)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        self.hydrate(row).await
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        self.hydrate(row).await
    }

    async fn list_user_ids_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(r#"SELECT id FROM users WHERE role_id = $1"#)
            .bind(role_id)
            .fetch_all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.phone_number)
        .bind(user.role_id)
        .bind(&user.image)
        .bind(user.credential.hash())
        .bind(&user.reset_otp)
        .bind(user.otp_created_at)
        .bind(user.created_at)
        .bind(user.is_active)
        .bind(user.is_staff)
        .execute(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let affected = sqlx::query(
            r#"
            UPDATE users
               SET name = $2, email = $3, username = $4, phone_number = $5,
                   role_id = $6, image = $7, password_hash = $8, reset_otp = $9,
                   otp_created_at = $10, is_active = $11, is_staff = $12
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.phone_number)
        .bind(user.role_id)
        .bind(&user.image)
        .bind(user.credential.hash())
        .bind(&user.reset_otp)
        .bind(user.otp_created_at)
        .bind(user.is_active)
        .bind(user.is_staff)
        .execute(&self.db)
        .await
        .map_err(map_write_error)?
        .rows_affected();
        if affected == 0 {
            return Err(StoreError::NotFound { entity: "user" });
        }
        Ok(())
    }

    async fn grant_user_permissions(
        &self,
        user_id: Uuid,
        permissions: &PermissionSet,
    ) -> StoreResult<()> {
        if permissions.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, codename)
            SELECT $1, UNNEST($2::text[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(permissions.to_strings())
        .execute(&self.db)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }
}
