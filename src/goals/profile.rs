use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::DocumentStore;

pub const USERS_COLLECTION: &str = "users";

/// Per-user goal preferences kept at `users/{uid}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub calorie_goal: f64,
    #[serde(default)]
    pub protein_goal: f64,
}

impl UserProfile {
    pub async fn load(store: &dyn DocumentStore, uid: Uuid) -> anyhow::Result<Option<Self>> {
        let Some(doc) = store
            .get_document(USERS_COLLECTION, &uid.to_string())
            .await?
        else {
            return Ok(None);
        };
        let profile = serde_json::from_value(doc).context("decode user profile")?;
        Ok(Some(profile))
    }

    pub async fn save(&self, store: &dyn DocumentStore, uid: Uuid) -> anyhow::Result<()> {
        let payload = serde_json::to_value(self).context("encode user profile")?;
        store
            .set_document(USERS_COLLECTION, &uid.to_string(), payload)
            .await
    }
}
