use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::permission::PermissionSet;

/// Named bundle of permissions assignable to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: Option<String>,
    pub permissions: PermissionSet,
    pub created_at: OffsetDateTime,
}

impl Role {
    pub fn new(name: Option<String>, permissions: PermissionSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            permissions,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.contains(code)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => f.write_str(name),
            _ => f.write_str("Unnamed Role"),
        }
    }
}
