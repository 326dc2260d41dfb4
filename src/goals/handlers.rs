use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument};

use super::profile::UserProfile;
use crate::{auth::extractors::SignedIn, error::AppError, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).put(put_profile))
}

#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    SignedIn { identity, .. }: SignedIn,
) -> Result<Json<UserProfile>, AppError> {
    let profile = UserProfile::load(state.store.as_ref(), identity.uid)
        .await?
        .unwrap_or_default();
    Ok(Json(profile))
}

#[instrument(skip_all)]
pub async fn put_profile(
    State(state): State<AppState>,
    SignedIn { identity, .. }: SignedIn,
    Json(profile): Json<UserProfile>,
) -> Result<Json<UserProfile>, AppError> {
    profile.save(state.store.as_ref(), identity.uid).await?;
    info!(uid = %identity.uid, "goal preferences updated");
    Ok(Json(profile))
}
