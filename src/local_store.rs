//! On-device meal store with auto-incrementing keys. The tracker does not use it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::meals::Meal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<u64>,
    #[serde(flatten)]
    pub meal: Meal,
}

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("no keys left after {0}")]
    KeysExhausted(u64),
}

#[derive(Debug, Default)]
struct Inner {
    next_key: u64,
    records: BTreeMap<u64, LocalRecord>,
}

#[derive(Debug, Default)]
pub struct LocalMealStore {
    inner: Mutex<Inner>,
}

impl LocalMealStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_all(&self) -> Vec<LocalRecord> {
        self.inner.lock().await.records.values().cloned().collect()
    }

    /// Inserts under a fresh key when `record.key` is empty, otherwise
    /// overwrites. Returns the key used.
    pub async fn put(&self, mut record: LocalRecord) -> Result<u64, LocalStoreError> {
        let mut inner = self.inner.lock().await;
        let key = match record.key {
            Some(key) => key,
            None => inner
                .next_key
                .checked_add(1)
                .ok_or(LocalStoreError::KeysExhausted(inner.next_key))?,
        };
        // Explicit keys push the counter forward so it never hands them out.
        inner.next_key = inner.next_key.max(key);
        record.key = Some(key);
        inner.records.insert(key, record);
        Ok(key)
    }

    pub async fn delete(&self, key: u64) -> bool {
        self.inner.lock().await.records.remove(&key).is_some()
    }
}

#[cfg(test)]
mod local_store_tests {
    use super::*;

    fn record(name: &str) -> LocalRecord {
        LocalRecord {
            key: None,
            meal: Meal {
                name: name.into(),
                ..Meal::empty(1)
            },
        }
    }

    #[tokio::test]
    async fn keys_increment_and_are_not_reused() {
        let store = LocalMealStore::new();
        assert_eq!(store.put(record("a")).await.unwrap(), 1);
        assert_eq!(store.put(record("b")).await.unwrap(), 2);
        assert!(store.delete(2).await);
        assert_eq!(store.put(record("c")).await.unwrap(), 3);

        let names: Vec<String> = store.get_all().await.into_iter().map(|r| r.meal.name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn put_with_key_overwrites() {
        let store = LocalMealStore::new();
        let key = store.put(record("a")).await.unwrap();
        store
            .put(LocalRecord {
                key: Some(key),
                ..record("a2")
            })
            .await
            .unwrap();
        let all = store.get_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].meal.name, "a2");
    }

    #[tokio::test]
    async fn explicit_key_advances_counter() {
        let store = LocalMealStore::new();
        store
            .put(LocalRecord {
                key: Some(10),
                ..record("x")
            })
            .await
            .unwrap();
        assert_eq!(store.put(record("y")).await.unwrap(), 11);
        assert!(!store.delete(99).await);
    }

    #[tokio::test]
    async fn counter_at_max_refuses_fresh_keys() {
        let store = LocalMealStore::new();
        let max = LocalRecord {
            key: Some(u64::MAX),
            ..record("last")
        };
        assert_eq!(store.put(max).await.unwrap(), u64::MAX);

        let err = store.put(record("one more")).await.unwrap_err();
        assert!(matches!(err, LocalStoreError::KeysExhausted(u64::MAX)));
        assert_eq!(store.get_all().await.len(), 1);

        // Overwriting an existing key still works.
        let again = LocalRecord {
            key: Some(u64::MAX),
            ..record("last, edited")
        };
        assert_eq!(store.put(again).await.unwrap(), u64::MAX);
        assert_eq!(store.get_all().await[0].meal.name, "last, edited");
    }
}
