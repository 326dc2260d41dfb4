use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CredentialsRequest, PublicUser, SessionResponse},
    extractors::CurrentSession,
    identity::IdentityProvider,
    jwt::SessionKeys,
};
use crate::{error::AppError, state::AppState};

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/sessions", post(open_session).delete(close_session))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
}

#[instrument(skip(state))]
pub async fn open_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = state
        .sessions
        .open(state.accounts.clone(), state.bridge.clone(), state.clock.clone())
        .await;
    let token = SessionKeys::from_ref(&state).sign(session.id, session.expires_at)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id,
            token,
            expires_at: session.expires_at,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn close_session(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> StatusCode {
    state.sessions.close(session.id).await;
    StatusCode::NO_CONTENT
}

#[instrument(skip_all)]
pub async fn sign_up(
    CurrentSession(session): CurrentSession,
    Json(payload): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let identity = session
        .identity
        .sign_up(&payload.email, &payload.password)
        .await?;
    info!(session_id = %session.id, uid = %identity.uid, "user created");
    Ok((StatusCode::CREATED, Json(identity.into())))
}

#[instrument(skip_all)]
pub async fn sign_in(
    CurrentSession(session): CurrentSession,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let identity = session
        .identity
        .sign_in(&payload.email, &payload.password)
        .await?;
    info!(session_id = %session.id, uid = %identity.uid, "user signed in");
    Ok(Json(identity.into()))
}

#[instrument(skip_all)]
pub async fn sign_out(CurrentSession(session): CurrentSession) -> Result<StatusCode, AppError> {
    session.identity.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}
