use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{TrackerView, UpdateFieldRequest};
use crate::{auth::extractors::CurrentSession, error::AppError, state::AppState};

pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(get_today).post(add_meal))
        .route("/meals/save", post(save_meals))
        .route("/meals/:id", patch(update_meal).delete(delete_meal))
        .route("/meals/:id/eaten", post(toggle_eaten))
        .route("/meals/:id/collapse", post(toggle_collapse))
}

/// GET /meals: today's ledger, reloading first if the day has changed.
#[instrument(skip_all)]
pub async fn get_today(CurrentSession(session): CurrentSession) -> Json<TrackerView> {
    session.tracker.roll_date().await;
    Json(session.tracker.snapshot().await)
}

#[instrument(skip_all)]
pub async fn add_meal(
    CurrentSession(session): CurrentSession,
) -> Result<(StatusCode, Json<TrackerView>), AppError> {
    session.tracker.add_meal().await?;
    Ok((StatusCode::CREATED, Json(session.tracker.snapshot().await)))
}

#[instrument(skip(session))]
pub async fn delete_meal(
    CurrentSession(session): CurrentSession,
    Path(id): Path<u32>,
) -> Result<Json<TrackerView>, AppError> {
    session.tracker.delete_meal(id).await?;
    Ok(Json(session.tracker.snapshot().await))
}

#[instrument(skip(session, body), fields(field = %body.field))]
pub async fn update_meal(
    CurrentSession(session): CurrentSession,
    Path(id): Path<u32>,
    Json(body): Json<UpdateFieldRequest>,
) -> Result<Json<TrackerView>, AppError> {
    session.tracker.update_field(id, body.field, body.value).await?;
    Ok(Json(session.tracker.snapshot().await))
}

#[instrument(skip(session))]
pub async fn toggle_eaten(
    CurrentSession(session): CurrentSession,
    Path(id): Path<u32>,
) -> Result<Json<TrackerView>, AppError> {
    session.tracker.toggle_eaten(id).await?;
    Ok(Json(session.tracker.snapshot().await))
}

#[instrument(skip(session))]
pub async fn toggle_collapse(
    CurrentSession(session): CurrentSession,
    Path(id): Path<u32>,
) -> Result<Json<TrackerView>, AppError> {
    session.tracker.toggle_collapse(id).await?;
    Ok(Json(session.tracker.snapshot().await))
}

/// POST /meals/save: explicit full write of the current ledger.
#[instrument(skip_all)]
pub async fn save_meals(CurrentSession(session): CurrentSession) -> Result<StatusCode, AppError> {
    session.tracker.save_now().await?;
    Ok(StatusCode::ACCEPTED)
}
