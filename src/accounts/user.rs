use std::{fmt, path::Path};

use rand::Rng;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{permission::PermissionSet, role::Role, slug::slugify};
use crate::auth::password::{hash_password, is_usable_hash, verify_password};

/// Whether a write creates the record or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// Password capability of a user: an argon2 PHC string, or none when the
/// account has no usable password.
#[derive(Clone, Default)]
pub struct Credential {
    password_hash: Option<String>,
}

impl Credential {
    pub fn from_hash(password_hash: Option<String>) -> Self {
        Self { password_hash }
    }

    pub fn from_password(plain: &str) -> anyhow::Result<Self> {
        let mut credential = Self::default();
        credential.set_password(plain)?;
        Ok(credential)
    }

    pub fn set_password(&mut self, plain: &str) -> anyhow::Result<()> {
        self.password_hash = Some(hash_password(plain)?);
        Ok(())
    }

    pub fn hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(is_usable_hash)
    }

    /// `false` when the password does not match, none is set, or the stored
    /// hash is unusable.
    pub fn verify(&self, plain: &str) -> bool {
        self.password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(plain, hash))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("usable", &self.has_usable_password())
            .finish()
    }
}

/// Direct permission grants of a user. Role permissions are copied in and
/// never taken back out.
#[derive(Debug, Clone, Default)]
pub struct PermissionHolder {
    granted: PermissionSet,
}

impl PermissionHolder {
    pub fn new(granted: PermissionSet) -> Self {
        Self { granted }
    }

    pub fn granted(&self) -> &PermissionSet {
        &self.granted
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.granted.contains(code)
    }

    /// Union with `permissions`; returns how many codes were new.
    pub fn grant_all(&mut self, permissions: &PermissionSet) -> usize {
        self.granted.extend_from(permissions)
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub role_id: Option<Uuid>,
    pub image: Option<String>,
    pub credential: Credential,
    pub reset_otp: Option<String>,
    pub otp_created_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub is_active: bool,
    pub is_staff: bool,
    pub permissions: PermissionHolder,
}

/// Input for registering a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<Uuid>,
    pub is_staff: bool,
}

impl User {
    pub fn new(new: NewUser) -> anyhow::Result<Self> {
        let credential = match new.password.as_deref() {
            Some(plain) => Credential::from_password(plain)?,
            None => Credential::default(),
        };
        Ok(Self {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email.as_deref().map(normalize_email),
            username: new.username,
            phone_number: new.phone_number,
            role_id: new.role_id,
            image: None,
            credential,
            reset_otp: None,
            otp_created_at: None,
            created_at: OffsetDateTime::now_utc(),
            is_active: true,
            is_staff: new.is_staff,
            permissions: PermissionHolder::default(),
        })
    }

    pub fn generate_username(&self) -> String {
        self.generate_username_with(&mut rand::thread_rng())
    }

    /// `<slug of name, or "user">-<1000..=9999>`. Not unique by construction.
    pub fn generate_username_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let base = match self.name.as_deref() {
            Some(name) if !name.is_empty() => slugify(name),
            _ => "user".to_string(),
        };
        let digits: u16 = rng.gen_range(1000..=9999);
        format!("{base}-{digits}")
    }

    /// Username is regenerated when unset, and on every update of a named user.
    pub fn needs_new_username(&self, kind: WriteKind) -> bool {
        let unset = self.username.as_deref().map_or(true, str::is_empty);
        let named = self.name.as_deref().is_some_and(|n| !n.is_empty());
        unset || (named && kind == WriteKind::Update)
    }

    /// Copies the role's permissions into the direct grants. Returns the
    /// number of newly granted codes; zero when no role is assigned.
    pub fn assign_role_permissions(&mut self, role: Option<&Role>) -> usize {
        match (self.role_id, role) {
            (Some(role_id), Some(role)) if role.id == role_id => {
                self.permissions.grant_all(&role.permissions)
            }
            _ => 0,
        }
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.is_active && self.permissions.has_permission(code)
    }

    /// Storage path for an uploaded profile image.
    pub fn image_path(&self, filename: &str) -> String {
        let extension = Path::new(filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        format!(
            "users/user_{}_{}_{}{}",
            slugify(self.name.as_deref().unwrap_or("None")),
            self.phone_number.as_deref().unwrap_or("None"),
            self.email.as_deref().unwrap_or("None"),
            extension
        )
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or_default())
    }
}

/// Trims the address and lowercases its domain part.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}
