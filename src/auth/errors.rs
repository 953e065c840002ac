use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use super::dto::{FieldErrors, ValidationErrorBody};
use crate::accounts::StoreError;

pub const NO_USER_MESSAGE: &str = "No user found with this email address.";
pub const BAD_PASSWORD_MESSAGE: &str = "Incorrect password. Please check your credentials.";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or malformed input fields.
    #[error("invalid request fields")]
    Validation(FieldErrors),
    #[error("no user found with this email address")]
    UserNotFound,
    #[error("incorrect password")]
    InvalidCredentials,
    #[error("token is invalid or expired")]
    InvalidToken,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(FieldErrors::single(
            FieldErrors::NON_FIELD,
            rejection.body_text(),
        ))
    }
}

fn bad_request(errors: FieldErrors) -> Response {
    (StatusCode::BAD_REQUEST, Json(ValidationErrorBody::from(errors))).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Validation(errors) => bad_request(errors),
            AuthError::UserNotFound => {
                bad_request(FieldErrors::single(FieldErrors::NON_FIELD, NO_USER_MESSAGE))
            }
            AuthError::InvalidCredentials => {
                bad_request(FieldErrors::single(FieldErrors::NON_FIELD, BAD_PASSWORD_MESSAGE))
            }
            AuthError::Store(StoreError::Conflict { field }) => bad_request(FieldErrors::single(
                field,
                format!("user with this {field} already exists."),
            )),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "detail": "Token is invalid or expired",
                    "code": "token_not_valid",
                })),
            )
                .into_response(),
            AuthError::Store(e) => {
                error!(error = %e, "store failure");
                internal()
            }
            AuthError::Internal(e) => {
                error!(error = %e, "internal failure");
                internal()
            }
        }
    }
}

fn internal() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal server error" })),
    )
        .into_response()
}
