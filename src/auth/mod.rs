use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod services;

pub use errors::AuthError;
pub use jwt::JwtKeys;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
