use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

use super::accounts::Accounts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: Uuid,
    pub email: String,
}

/// Identity-operation failures. The message is shown to the user as is.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password should be at least 6 characters")]
    WeakPassword,
    #[error("Email already in use")]
    EmailInUse,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Identity service unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, IdentityError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;

    fn current(&self) -> Option<Identity>;

    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

/// Live identity listener. Dropping it stops the callback.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs `callback` with the current identity right away and again after
/// every change, one call at a time.
pub fn on_identity_change<F, Fut>(provider: &dyn IdentityProvider, mut callback: F) -> Subscription
where
    F: FnMut(Option<Identity>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut rx = provider.watch();
    let task = tokio::spawn(async move {
        loop {
            let identity = rx.borrow_and_update().clone();
            callback(identity).await;
            if rx.changed().await.is_err() {
                debug!("identity provider dropped, listener stopping");
                break;
            }
        }
    });
    Subscription { task }
}

/// Per-client provider backed by the shared [`Accounts`].
pub struct AccountIdentity {
    accounts: Arc<Accounts>,
    current: watch::Sender<Option<Identity>>,
}

impl AccountIdentity {
    pub fn new(accounts: Arc<Accounts>) -> Self {
        let (current, _) = watch::channel(None);
        Self { accounts, current }
    }
}

#[async_trait]
impl IdentityProvider for AccountIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        let identity = self.accounts.sign_in(email, password).await?;
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        let identity = self.accounts.sign_up(email, password).await?;
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Some(previous) = self.current.send_replace(None) {
            info!(uid = %previous.uid, "signed out");
        }
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
