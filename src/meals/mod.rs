pub mod bridge;
pub mod collapse;
pub mod dto;
mod handlers;
pub mod ledger;
pub mod tracker;

use crate::state::AppState;
use axum::Router;

pub use bridge::{DayContext, PersistenceBridge};
pub use ledger::{compute_totals, Ledger, Meal, MealField, Totals};
pub use tracker::{LoadState, Tracker, TrackerError};

pub fn router() -> Router<AppState> {
    handlers::meal_routes()
}
