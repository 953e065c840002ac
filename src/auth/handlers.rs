use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{AccessToken, FieldErrors, LoginRequest, RefreshRequest, TokenPair},
    errors::AuthError,
    jwt::JwtKeys,
    services,
};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login/", post(login))
        .route("/token/refresh/", post(refresh))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AuthError> {
    let Json(request) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let pair = services::login(state.store.as_ref(), &keys, request).await?;
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AccessToken>, AuthError> {
    let Json(request) = payload?;
    let mut errors = FieldErrors::default();
    let Some(token) = services::require(&mut errors, "refresh", request.refresh) else {
        return Err(AuthError::Validation(errors));
    };
    let keys = JwtKeys::from_ref(&state);
    let access = keys.refresh_access(&token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AuthError::InvalidToken
    })?;
    Ok(Json(AccessToken { access }))
}
