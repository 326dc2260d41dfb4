use crate::state::AppState;
use axum::Router;

pub mod accounts;
mod dto;
pub(crate) mod extractors;
mod handlers;
pub mod identity;
pub mod jwt;
pub mod password;

pub use identity::{on_identity_change, AccountIdentity, Identity, IdentityError, IdentityProvider};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::session_routes())
        .merge(handlers::auth_routes())
}
