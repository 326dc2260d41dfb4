use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{
    identity::{Identity, IdentityProvider},
    jwt::SessionKeys,
};
use crate::{error::AppError, sessions::ClientSession, state::AppState};

/// The open session named by the bearer token.
pub struct CurrentSession(pub Arc<ClientSession>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthorized("missing Authorization header"))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AppError::Unauthorized("invalid auth scheme"))?;

        let claims = SessionKeys::from_ref(state).verify(token).map_err(|_| {
            warn!("invalid or expired session token");
            AppError::Unauthorized("invalid or expired token")
        })?;

        let session = state
            .sessions
            .get(claims.sub)
            .await
            .ok_or(AppError::Unauthorized("session closed"))?;
        Ok(CurrentSession(session))
    }
}

pub struct SignedIn {
    pub session: Arc<ClientSession>,
    pub identity: Identity,
}

#[async_trait]
impl FromRequestParts<AppState> for SignedIn {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        let identity = session
            .identity
            .current()
            .ok_or(AppError::Unauthorized("not signed in"))?;
        Ok(SignedIn { session, identity })
    }
}
