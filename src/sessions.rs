use std::{collections::HashMap, sync::Arc};

use time::{Duration, OffsetDateTime};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::{accounts::Accounts, identity::AccountIdentity},
    clock::Clock,
    meals::{PersistenceBridge, Tracker},
};

pub struct ClientSession {
    pub id: Uuid,
    pub identity: AccountIdentity,
    pub tracker: Tracker,
    pub expires_at: OffsetDateTime,
}

impl ClientSession {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// Open client sessions keyed by id. A session lives as long as its token.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Arc<ClientSession>>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::default(),
            ttl,
        }
    }

    pub async fn open(
        &self,
        accounts: Arc<Accounts>,
        bridge: PersistenceBridge,
        clock: Arc<dyn Clock>,
    ) -> Arc<ClientSession> {
        let id = Uuid::new_v4();
        let identity = AccountIdentity::new(accounts);
        let tracker = Tracker::mount(&identity, bridge, clock);
        let session = Arc::new(ClientSession {
            id,
            identity,
            tracker,
            expires_at: OffsetDateTime::now_utc() + self.ttl,
        });
        self.inner.write().await.insert(id, session.clone());
        info!(session_id = %id, expires_at = %session.expires_at, "session opened");
        session
    }

    /// Live session by id. An expired one is closed on the way out.
    pub async fn get(&self, id: Uuid) -> Option<Arc<ClientSession>> {
        let session = self.inner.read().await.get(&id).cloned()?;
        if session.is_expired(OffsetDateTime::now_utc()) {
            self.close(id).await;
            return None;
        }
        Some(session)
    }

    /// Removes the session and stops its identity listener.
    pub async fn close(&self, id: Uuid) -> bool {
        let Some(session) = self.inner.write().await.remove(&id) else {
            return false;
        };
        session.tracker.unmount();
        info!(session_id = %id, "session closed");
        true
    }

    /// Closes every expired session and returns how many went.
    pub async fn sweep_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let expired: Vec<Arc<ClientSession>> = {
            let mut inner = self.inner.write().await;
            let ids: Vec<Uuid> = inner
                .values()
                .filter(|s| s.is_expired(now))
                .map(|s| s.id)
                .collect();
            ids.iter().filter_map(|id| inner.remove(id)).collect()
        };
        for session in &expired {
            session.tracker.unmount();
            debug!(session_id = %session.id, "expired session closed");
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired sessions swept");
        }
        expired.len()
    }

    pub fn spawn_sweeper(&self, every: std::time::Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                registry.sweep_expired().await;
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
