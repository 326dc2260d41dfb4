use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{
    bridge::{DayContext, PersistenceBridge},
    collapse::CollapseState,
    dto::{MealView, TrackerView},
    ledger::{Ledger, Meal, MealField, MAX_MEALS},
};
use crate::{
    auth::identity::{on_identity_change, Identity, IdentityProvider, Subscription},
    clock::Clock,
    goals::DAILY_GOALS,
};

/// Load progress of the current `(user, day)`. There is no error state:
/// a failed load stays in `Loading`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("No day is loaded")]
    NotLoaded,
    #[error("A day holds at most {} meals", MAX_MEALS)]
    LedgerFull,
    #[error("No meal with id {0}")]
    UnknownMeal(u32),
}

/// Background write of the full ledger. Safe to drop.
pub type SaveTask = JoinHandle<()>;

#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub save: SaveTask,
}

#[derive(Debug, Default)]
struct ViewState {
    day: Option<DayContext>,
    load: LoadState,
    ledger: Ledger,
    collapse: CollapseState,
}

impl ViewState {
    fn loaded_day(&self) -> Result<DayContext, TrackerError> {
        match (&self.day, self.load) {
            (Some(day), LoadState::Loaded) => Ok(day.clone()),
            _ => Err(TrackerError::NotLoaded),
        }
    }
}

#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<ViewState>>,
    load_tx: Arc<watch::Sender<LoadState>>,
    bridge: PersistenceBridge,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn publish(&self, load: LoadState) {
        self.load_tx.send_replace(load);
    }

    async fn on_identity(&self, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                let day = DayContext::new(identity.uid.to_string(), self.clock.today());
                self.enter_day(day).await;
            }
            None => {
                *self.state.lock().await = ViewState::default();
                self.publish(LoadState::Unloaded);
                debug!("identity absent, ledger cleared");
            }
        }
    }

    async fn enter_day(&self, day: DayContext) {
        {
            let mut st = self.state.lock().await;
            *st = ViewState {
                day: Some(day.clone()),
                load: LoadState::Loading,
                ..ViewState::default()
            };
            self.publish(LoadState::Loading);
        }

        let loaded = match self.bridge.load(&day).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, key = %day, "day load failed");
                return;
            }
        };

        let mut st = self.state.lock().await;
        if st.day.as_ref() != Some(&day) || st.load != LoadState::Loading {
            debug!(key = %day, "discarding load for a day no longer shown");
            return;
        }
        st.ledger = loaded.ledger;
        st.collapse = loaded.collapse;
        st.load = LoadState::Loaded;
        self.publish(LoadState::Loaded);
        info!(key = %day, meals = st.ledger.len(), seeded = !loaded.existed, "day ready");
    }

    fn spawn_save(&self, day: DayContext, ledger: Ledger) -> SaveTask {
        let bridge = self.bridge.clone();
        tokio::spawn(async move {
            if let Err(e) = bridge.save(&day, &ledger).await {
                warn!(error = %e, key = %day, "meal save failed");
            }
        })
    }
}

/// In-memory view of today's meals for whoever is signed in.
///
/// Every mutation applies locally and then writes the whole ledger in the
/// background. Saves are not ordered against each other: whichever write
/// completes last is what the store keeps.
pub struct Tracker {
    shared: Shared,
    subscription: StdMutex<Option<Subscription>>,
}

impl Tracker {
    pub fn mount(
        identity: &dyn IdentityProvider,
        bridge: PersistenceBridge,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (load_tx, _) = watch::channel(LoadState::Unloaded);
        let shared = Shared {
            state: Arc::new(Mutex::new(ViewState::default())),
            load_tx: Arc::new(load_tx),
            bridge,
            clock,
        };

        let listener = shared.clone();
        let subscription = on_identity_change(identity, move |identity| {
            let listener = listener.clone();
            async move { listener.on_identity(identity).await }
        });

        Self {
            shared,
            subscription: StdMutex::new(Some(subscription)),
        }
    }

    /// Stops following identity changes. The current view is kept.
    pub fn unmount(&self) {
        if let Ok(mut sub) = self.subscription.lock() {
            if sub.take().is_some() {
                debug!("tracker unmounted");
            }
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription
            .lock()
            .map(|sub| sub.is_some())
            .unwrap_or(false)
    }

    pub fn load_state(&self) -> LoadState {
        *self.shared.load_tx.borrow()
    }

    pub fn watch_load(&self) -> watch::Receiver<LoadState> {
        self.shared.load_tx.subscribe()
    }

    /// Reloads when the clock has moved past the loaded day.
    pub async fn roll_date(&self) -> bool {
        let today = self.shared.clock.today();
        let next = {
            let st = self.shared.state.lock().await;
            match &st.day {
                Some(day) if day.date != today => DayContext::new(day.user_id.clone(), today),
                _ => return false,
            }
        };
        info!(key = %next, "date changed, loading new day");
        self.shared.enter_day(next).await;
        true
    }

    pub async fn add_meal(&self) -> Result<Applied<u32>, TrackerError> {
        let mut st = self.shared.state.lock().await;
        let day = st.loaded_day()?;
        let id = st.ledger.add_meal().ok_or(TrackerError::LedgerFull)?;
        st.collapse.expand(id);
        debug!(id, "meal added");
        let save = self.shared.spawn_save(day, st.ledger.clone());
        Ok(Applied { value: id, save })
    }

    pub async fn delete_meal(&self, id: u32) -> Result<Applied<Meal>, TrackerError> {
        let mut st = self.shared.state.lock().await;
        let day = st.loaded_day()?;
        let meal = st
            .ledger
            .delete_meal(id)
            .ok_or(TrackerError::UnknownMeal(id))?;
        // A duplicate id may still be on screen and shares the entry.
        if st.ledger.get(id).is_none() {
            st.collapse.forget(id);
        }
        debug!(id, "meal deleted");
        let save = self.shared.spawn_save(day, st.ledger.clone());
        Ok(Applied { value: meal, save })
    }

    pub async fn update_field(
        &self,
        id: u32,
        field: MealField,
        value: impl Into<String>,
    ) -> Result<Applied<()>, TrackerError> {
        let mut st = self.shared.state.lock().await;
        let day = st.loaded_day()?;
        if !st.ledger.update_field(id, field, value) {
            return Err(TrackerError::UnknownMeal(id));
        }
        let save = self.shared.spawn_save(day, st.ledger.clone());
        Ok(Applied { value: (), save })
    }

    pub async fn toggle_eaten(&self, id: u32) -> Result<Applied<bool>, TrackerError> {
        let mut st = self.shared.state.lock().await;
        let day = st.loaded_day()?;
        let eaten = st
            .ledger
            .toggle_eaten(id)
            .ok_or(TrackerError::UnknownMeal(id))?;
        let save = self.shared.spawn_save(day, st.ledger.clone());
        Ok(Applied { value: eaten, save })
    }

    // Local only; collapse state is never saved.
    pub async fn toggle_collapse(&self, id: u32) -> Result<bool, TrackerError> {
        let mut st = self.shared.state.lock().await;
        st.loaded_day()?;
        if st.ledger.get(id).is_none() {
            return Err(TrackerError::UnknownMeal(id));
        }
        Ok(st.collapse.toggle(id))
    }

    pub async fn save_now(&self) -> Result<SaveTask, TrackerError> {
        let st = self.shared.state.lock().await;
        let day = st.loaded_day()?;
        Ok(self.shared.spawn_save(day, st.ledger.clone()))
    }

    pub async fn ledger(&self) -> Ledger {
        self.shared.state.lock().await.ledger.clone()
    }

    pub async fn snapshot(&self) -> TrackerView {
        let st = self.shared.state.lock().await;
        let totals = st.ledger.totals();
        TrackerView {
            date: st.day.as_ref().map(|d| d.date.clone()),
            state: st.load,
            meals: st
                .ledger
                .meals()
                .iter()
                .map(|m| MealView {
                    collapsed: st.collapse.is_collapsed(m.id),
                    meal: m.clone(),
                })
                .collect(),
            totals,
            goals: DAILY_GOALS,
            progress: DAILY_GOALS.progress(&totals),
            can_add: st.load == LoadState::Loaded && !st.ledger.is_full(),
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tracker_tests {
    use std::{collections::HashMap, time::Duration};

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        auth::{accounts::Accounts, identity::AccountIdentity},
        clock::FixedClock,
        meals::ledger::Totals,
        storage::{DocumentStore, MemoryDocumentStore},
    };

    struct Harness {
        store: Arc<dyn DocumentStore>,
        identity: AccountIdentity,
        clock: Arc<FixedClock>,
        tracker: Tracker,
    }

    fn harness_with(store: Arc<dyn DocumentStore>, accounts_store: Arc<dyn DocumentStore>) -> Harness {
        let identity = AccountIdentity::new(Arc::new(Accounts::new(accounts_store)));
        let clock = Arc::new(FixedClock::new("Monday"));
        let tracker = Tracker::mount(&identity, PersistenceBridge::new(store.clone()), clock.clone());
        Harness {
            store,
            identity,
            clock,
            tracker,
        }
    }

    fn harness() -> Harness {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        harness_with(store.clone(), store)
    }

    async fn wait_for(tracker: &Tracker, want: LoadState) {
        let mut rx = tracker.watch_load();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
            .await
            .expect("load state not reached in time")
            .expect("load channel closed");
    }

    async fn stored_meals(store: &dyn DocumentStore, key: &str) -> Option<Ledger> {
        let doc = store.get_document("meals", key).await.unwrap()?;
        Some(serde_json::from_value(doc["meals"].clone()).unwrap())
    }

    async fn signed_in(h: &Harness) -> Identity {
        let who = h.identity.sign_up("ann@example.com", "hunter22").await.unwrap();
        wait_for(&h.tracker, LoadState::Loaded).await;
        who
    }

    #[tokio::test]
    async fn starts_unloaded_and_rejects_mutations() {
        let h = harness();
        assert_eq!(h.tracker.load_state(), LoadState::Unloaded);
        assert!(matches!(h.tracker.add_meal().await, Err(TrackerError::NotLoaded)));
        let view = h.tracker.snapshot().await;
        assert!(view.meals.is_empty());
        assert!(!view.can_add);
    }

    #[tokio::test]
    async fn sign_in_seeds_an_empty_day() {
        let h = harness();
        signed_in(&h).await;

        let view = h.tracker.snapshot().await;
        assert_eq!(view.date.as_deref(), Some("Monday"));
        assert_eq!(view.meals.len(), 1);
        assert_eq!(view.meals[0].meal, Meal::empty(1));
        assert!(!view.meals[0].collapsed);
        assert_eq!(view.totals, Totals::default());
        assert!(view.can_add);
    }

    #[tokio::test]
    async fn every_mutation_writes_the_full_ledger() {
        let h = harness();
        let who = signed_in(&h).await;
        let key = format!("{}_Monday", who.uid);

        let added = h.tracker.add_meal().await.unwrap();
        assert_eq!(added.value, 2);
        added.save.await.unwrap();
        assert_eq!(stored_meals(h.store.as_ref(), &key).await.unwrap().len(), 2);

        h.tracker
            .update_field(2, MealField::Calories, "450")
            .await
            .unwrap()
            .save
            .await
            .unwrap();
        let toggled = h.tracker.toggle_eaten(2).await.unwrap();
        assert!(toggled.value);
        toggled.save.await.unwrap();

        let stored = stored_meals(h.store.as_ref(), &key).await.unwrap();
        assert_eq!(stored, h.tracker.ledger().await);
        assert_eq!(stored.totals().calories, 450.0);

        h.tracker.delete_meal(1).await.unwrap().save.await.unwrap();
        let stored = stored_meals(h.store.as_ref(), &key).await.unwrap();
        assert_eq!(stored.meals().iter().map(|m| m.id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn reload_collapses_everything() {
        let h = harness();
        signed_in(&h).await;
        h.tracker.add_meal().await.unwrap().save.await.unwrap();
        assert!(!h.tracker.snapshot().await.meals[1].collapsed);

        h.identity.sign_out().await.unwrap();
        wait_for(&h.tracker, LoadState::Unloaded).await;
        h.identity.sign_in("ann@example.com", "hunter22").await.unwrap();
        wait_for(&h.tracker, LoadState::Loaded).await;

        let view = h.tracker.snapshot().await;
        assert_eq!(view.meals.len(), 2);
        assert!(view.meals.iter().all(|m| m.collapsed));
    }

    #[tokio::test]
    async fn sign_out_clears_the_view() {
        let h = harness();
        signed_in(&h).await;
        h.identity.sign_out().await.unwrap();
        wait_for(&h.tracker, LoadState::Unloaded).await;

        let view = h.tracker.snapshot().await;
        assert!(view.date.is_none());
        assert!(view.meals.is_empty());
        assert!(h.tracker.save_now().await.is_err());
    }

    #[tokio::test]
    async fn add_is_rejected_at_ten_meals() {
        let h = harness();
        signed_in(&h).await;
        for _ in 1..MAX_MEALS {
            h.tracker.add_meal().await.unwrap();
        }
        assert!(matches!(h.tracker.add_meal().await, Err(TrackerError::LedgerFull)));
        let view = h.tracker.snapshot().await;
        assert_eq!(view.meals.len(), MAX_MEALS);
        assert!(!view.can_add);
    }

    #[tokio::test]
    async fn collapse_toggles_locally_and_delete_forgets_it() {
        let h = harness();
        let who = signed_in(&h).await;
        h.tracker.add_meal().await.unwrap().save.await.unwrap();

        assert!(h.tracker.toggle_collapse(2).await.unwrap());
        assert!(h.tracker.snapshot().await.meals[1].collapsed);
        assert!(matches!(
            h.tracker.toggle_collapse(9).await,
            Err(TrackerError::UnknownMeal(9))
        ));

        h.tracker.delete_meal(2).await.unwrap().save.await.unwrap();
        {
            let st = h.tracker.shared.state.lock().await;
            assert_eq!(st.collapse.len(), 1);
            assert!(!st.collapse.is_collapsed(2));
        }
        // Re-adding reuses id 2 and starts expanded again.
        assert_eq!(h.tracker.add_meal().await.unwrap().value, 2);
        assert!(!h.tracker.snapshot().await.meals[1].collapsed);

        // Collapse state is never written.
        let doc = h
            .store
            .get_document("meals", &format!("{}_Monday", who.uid))
            .await
            .unwrap()
            .unwrap();
        assert!(doc.get("collapsed").is_none());
    }

    #[tokio::test]
    async fn deleting_one_of_two_duplicate_ids_keeps_the_collapse_entry() {
        let h = harness();
        signed_in(&h).await;
        h.tracker.add_meal().await.unwrap();
        h.tracker.delete_meal(1).await.unwrap();
        // [2] -> add gives id 2 again -> [2, 2]
        assert_eq!(h.tracker.add_meal().await.unwrap().value, 2);
        assert!(h.tracker.toggle_collapse(2).await.unwrap());

        h.tracker.delete_meal(2).await.unwrap();
        {
            let st = h.tracker.shared.state.lock().await;
            assert_eq!(st.ledger.len(), 1);
            assert_eq!(st.collapse.len(), 1);
            assert!(st.collapse.is_collapsed(2));
        }
        assert!(h.tracker.snapshot().await.meals[0].collapsed);

        h.tracker.delete_meal(2).await.unwrap();
        assert!(h.tracker.shared.state.lock().await.collapse.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_do_not_save() {
        let h = harness();
        let who = signed_in(&h).await;
        assert!(matches!(
            h.tracker.toggle_eaten(5).await,
            Err(TrackerError::UnknownMeal(5))
        ));
        assert!(h.tracker.delete_meal(5).await.is_err());
        assert!(h.tracker.update_field(5, MealField::Name, "x").await.is_err());
        let key = format!("{}_Monday", who.uid);
        assert!(stored_meals(h.store.as_ref(), &key).await.is_none());
    }

    #[tokio::test]
    async fn date_change_loads_a_fresh_day() {
        let h = harness();
        let who = signed_in(&h).await;
        h.tracker.add_meal().await.unwrap().save.await.unwrap();

        assert!(!h.tracker.roll_date().await);
        h.clock.set("Tuesday");
        assert!(h.tracker.roll_date().await);

        let view = h.tracker.snapshot().await;
        assert_eq!(view.date.as_deref(), Some("Tuesday"));
        assert_eq!(view.meals.len(), 1);
        let monday = stored_meals(h.store.as_ref(), &format!("{}_Monday", who.uid)).await;
        assert_eq!(monday.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unmounted_tracker_ignores_identity() {
        let h = harness();
        h.tracker.unmount();
        assert!(!h.tracker.is_mounted());
        h.identity.sign_up("ann@example.com", "hunter22").await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(h.tracker.load_state(), LoadState::Unloaded);
    }

    /// Writes block until the test opens the gate registered for the
    /// first meal's calories value.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryDocumentStore,
        gates: StdMutex<HashMap<String, oneshot::Receiver<()>>>,
    }

    impl GatedStore {
        fn gate(&self, calories: &str) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(calories.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        async fn get_document(&self, collection: &str, key: &str) -> anyhow::Result<Option<Value>> {
            self.inner.get_document(collection, key).await
        }

        async fn set_document(&self, collection: &str, key: &str, payload: Value) -> anyhow::Result<()> {
            let calories = payload["meals"][0]["calories"].as_str().unwrap_or_default().to_string();
            let gate = self.gates.lock().unwrap().remove(&calories);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.set_document(collection, key, payload).await
        }
    }

    #[tokio::test]
    async fn last_completed_save_wins_over_last_issued() {
        let store = Arc::new(GatedStore::default());
        let h = harness_with(store.clone(), Arc::new(MemoryDocumentStore::new()));
        let who = signed_in(&h).await;
        let key = format!("{}_Monday", who.uid);

        let open_first = store.gate("100");
        let open_second = store.gate("200");
        let first = h.tracker.update_field(1, MealField::Calories, "100").await.unwrap();
        let second = h.tracker.update_field(1, MealField::Calories, "200").await.unwrap();

        open_second.send(()).unwrap();
        second.save.await.unwrap();
        assert_eq!(stored_meals(store.as_ref(), &key).await.unwrap().meals()[0].calories, "200");

        open_first.send(()).unwrap();
        first.save.await.unwrap();
        let stored = stored_meals(store.as_ref(), &key).await.unwrap();
        assert_eq!(stored.meals()[0].calories, "100");
        assert_eq!(h.tracker.ledger().await.meals()[0].calories, "200");
    }

    struct BrokenStore {
        fail_reads: bool,
    }

    #[async_trait]
    impl DocumentStore for BrokenStore {
        async fn get_document(&self, _c: &str, _k: &str) -> anyhow::Result<Option<Value>> {
            if self.fail_reads {
                anyhow::bail!("read refused");
            }
            Ok(None)
        }

        async fn set_document(&self, _c: &str, _k: &str, _p: Value) -> anyhow::Result<()> {
            anyhow::bail!("write refused")
        }
    }

    #[tokio::test]
    async fn failed_save_is_silent_and_keeps_local_state() {
        let h = harness_with(
            Arc::new(BrokenStore { fail_reads: false }),
            Arc::new(MemoryDocumentStore::new()),
        );
        signed_in(&h).await;

        let applied = h.tracker.toggle_eaten(1).await.unwrap();
        assert!(applied.save.await.is_ok());
        assert!(h.tracker.ledger().await.meals()[0].eaten);
    }

    #[tokio::test]
    async fn failed_load_stays_loading() {
        let h = harness_with(
            Arc::new(BrokenStore { fail_reads: true }),
            Arc::new(MemoryDocumentStore::new()),
        );
        h.identity.sign_up("ann@example.com", "hunter22").await.unwrap();
        wait_for(&h.tracker, LoadState::Loading).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.tracker.load_state(), LoadState::Loading);
        let view = h.tracker.snapshot().await;
        assert!(view.meals.is_empty());
        assert!(matches!(h.tracker.add_meal().await, Err(TrackerError::NotLoaded)));
    }
}
