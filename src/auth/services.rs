use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{FieldErrors, LoginRequest, TokenPair},
    errors::AuthError,
    jwt::JwtKeys,
};
use crate::accounts::{user::normalize_email, AccountStore, User};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const INVALID_EMAIL: &str = "Enter a valid email address.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Login input that passed field validation.
#[derive(Debug)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Checks that a field is present and not blank. Surrounding whitespace is
/// stripped from the returned value.
pub(crate) fn require(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match value.as_deref().map(str::trim) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some("") => {
            errors.add(field, BLANK);
            None
        }
        Some(v) => Some(v.to_string()),
    }
}

/// Collects every field problem before rejecting.
pub fn validate(request: LoginRequest) -> Result<LoginCredentials, AuthError> {
    let mut errors = FieldErrors::default();
    let email = require(&mut errors, "email", request.email).and_then(|email| {
        let email = normalize_email(&email);
        if is_valid_email(&email) {
            Some(email)
        } else {
            errors.add("email", INVALID_EMAIL);
            None
        }
    });
    let password = require(&mut errors, "password", request.password);
    match (email, password) {
        (Some(email), Some(password)) => Ok(LoginCredentials { email, password }),
        _ => Err(AuthError::Validation(errors)),
    }
}

/// Looks the user up by email and checks the password.
pub async fn authenticate(
    store: &dyn AccountStore,
    credentials: &LoginCredentials,
) -> Result<User, AuthError> {
    let Some(user) = store.find_user_by_email(&credentials.email).await? else {
        warn!(email = %credentials.email, "login unknown email");
        return Err(AuthError::UserNotFound);
    };
    if !user.credential.verify(&credentials.password) {
        warn!(email = %credentials.email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user)
}

/// Validate, authenticate, then issue the token pair. Reads the store only.
pub async fn login(
    store: &dyn AccountStore,
    keys: &JwtKeys,
    request: LoginRequest,
) -> Result<TokenPair, AuthError> {
    let credentials = validate(request)?;
    let user = authenticate(store, &credentials).await?;
    let pair = keys.issue_pair(&user)?;
    info!(user_id = %user.id, email = %credentials.email, "user logged in");
    Ok(pair)
}
