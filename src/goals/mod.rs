mod handlers;
pub mod profile;

use axum::Router;
use serde::Serialize;

use crate::{meals::ledger::Totals, state::AppState};

pub use profile::UserProfile;

/// Fixed daily targets the running totals are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyGoals {
    pub calories: f64,
    pub protein: f64,
}

pub const DAILY_GOALS: DailyGoals = DailyGoals {
    calories: 2500.0,
    protein: 140.0,
};

impl Default for DailyGoals {
    fn default() -> Self {
        DAILY_GOALS
    }
}

/// Percent of each goal reached. Not clamped, so it can exceed 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Progress {
    pub calories_pct: f64,
    pub protein_pct: f64,
}

impl DailyGoals {
    pub fn progress(&self, totals: &Totals) -> Progress {
        Progress {
            calories_pct: percent(totals.calories, self.calories),
            protein_pct: percent(totals.protein, self.protein),
        }
    }
}

fn percent(value: f64, goal: f64) -> f64 {
    if goal > 0.0 {
        value / goal * 100.0
    } else {
        0.0
    }
}

pub fn router() -> Router<AppState> {
    handlers::profile_routes()
}
