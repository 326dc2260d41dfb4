use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::accounts::Accounts;
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::config::{AppConfig, JwtConfig};
use crate::meals::PersistenceBridge;
use crate::sessions::SessionRegistry;
use crate::storage::{DocumentStore, MemoryDocumentStore, PgDocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub accounts: Arc<Accounts>,
    pub bridge: PersistenceBridge,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgDocumentStore::new(db)) as Arc<dyn DocumentStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; documents are kept in memory");
                Arc::new(MemoryDocumentStore::new()) as Arc<dyn DocumentStore>
            }
        };

        let clock = Arc::new(SystemClock::new(config.utc_offset()?)) as Arc<dyn Clock>;
        Ok(Self::from_parts(config, store, clock))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(config.jwt.ttl()),
            accounts: Arc::new(Accounts::new(store.clone())),
            bridge: PersistenceBridge::new(store.clone()),
            config,
            store,
            clock,
        }
    }

    /// In-memory state pinned to a fixed day, for tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
            utc_offset_hours: 0,
        });
        Self::from_parts(
            config,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(FixedClock::new("Friday, October 16, 2026")),
        )
    }
}
