use std::{fmt, sync::Arc};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{collapse::CollapseState, ledger::Ledger};
use crate::storage::DocumentStore;

pub const MEALS_COLLECTION: &str = "meals";

/// The `(user, day)` pair every ledger belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DayContext {
    pub user_id: String,
    pub date: String,
}

impl DayContext {
    pub fn new(user_id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            date: date.into(),
        }
    }

    /// Document key: `{user_id}_{date}`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.user_id, self.date)
    }
}

impl fmt::Display for DayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MealDocument {
    meals: Ledger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDay {
    pub ledger: Ledger,
    pub collapse: CollapseState,
    /// `false` when the day had no document and was seeded.
    pub existed: bool,
}

#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn DocumentStore>,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(key = %day))]
    pub async fn load(&self, day: &DayContext) -> anyhow::Result<LoadedDay> {
        let key = day.key();
        let doc = self.store.get_document(MEALS_COLLECTION, &key).await?;
        let Some(doc) = doc else {
            debug!("no document for day, seeding");
            return Ok(LoadedDay {
                ledger: Ledger::seed(),
                collapse: CollapseState::seeded(),
                existed: false,
            });
        };

        let MealDocument { meals } = serde_json::from_value(doc)
            .with_context(|| format!("decode meal document {}", key))?;
        debug!(meals = meals.len(), "day loaded");
        Ok(LoadedDay {
            collapse: CollapseState::all_collapsed(&meals),
            ledger: meals,
            existed: true,
        })
    }

    #[instrument(skip(self, ledger), fields(key = %day, meals = ledger.len()))]
    pub async fn save(&self, day: &DayContext, ledger: &Ledger) -> anyhow::Result<()> {
        let payload = serde_json::to_value(MealDocument {
            meals: ledger.clone(),
        })
        .context("encode meal document")?;
        self.store
            .set_document(MEALS_COLLECTION, &day.key(), payload)
            .await
    }
}
