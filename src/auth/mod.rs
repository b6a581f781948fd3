use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
mod password;
mod repo;

pub use jwt::AuthUser;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
