use serde::{Deserialize, Serialize};

use super::{
    ledger::{Meal, MealField, Totals},
    tracker::LoadState,
};
use crate::goals::{DailyGoals, Progress};

#[derive(Debug, Clone, Serialize)]
pub struct MealView {
    #[serde(flatten)]
    pub meal: Meal,
    pub collapsed: bool,
}

/// Everything the day screen shows.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerView {
    pub date: Option<String>,
    pub state: LoadState,
    pub meals: Vec<MealView>,
    pub totals: Totals,
    pub goals: DailyGoals,
    pub progress: Progress,
    pub can_add: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub field: MealField,
    pub value: String,
}
