use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Request body for login. Fields are optional so that absent ones can be
/// reported per field instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for token refresh.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Response returned after refresh.
#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

/// Messages keyed by the offending field (`non_field_errors` for the rest).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "non_field_errors";

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Body of every 400 response.
#[derive(Debug, Serialize)]
pub struct ValidationErrorBody {
    pub detail: &'static str,
    pub errors: FieldErrors,
}

impl From<FieldErrors> for ValidationErrorBody {
    fn from(errors: FieldErrors) -> Self {
        Self {
            detail: "Validation error",
            errors,
        }
    }
}
