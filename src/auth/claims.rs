use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::User;

/// Type of JWT: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity claims copied from the user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<Uuid>,
}

impl From<&User> for UserClaims {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role_id,
        }
    }
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenKind,
    pub exp: usize, // expires at (unix timestamp)
    pub iat: usize, // issued at (unix timestamp)
    pub jti: Uuid,
    pub iss: String,
    pub aud: String,
    #[serde(flatten)]
    pub user: UserClaims,
}
