use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    identity::{Identity, IdentityError},
    password::{hash_password, is_strong_enough, verify_password},
};
use crate::{goals::UserProfile, storage::DocumentStore};

pub const ACCOUNTS_COLLECTION: &str = "accounts";

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Credential record stored at `accounts/{email}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    uid: Uuid,
    email: String,
    password_hash: String,
}

pub struct Accounts {
    store: Arc<dyn DocumentStore>,
    // Serialises the exists-then-create check of sign-up.
    sign_up_lock: Mutex<()>,
}

impl Accounts {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            sign_up_lock: Mutex::new(()),
        }
    }

    async fn find(&self, email: &str) -> Result<Option<AccountRecord>, IdentityError> {
        let Some(doc) = self.store.get_document(ACCOUNTS_COLLECTION, email).await? else {
            return Ok(None);
        };
        let record = serde_json::from_value(doc).context("decode account record")?;
        Ok(Some(record))
    }

    /// Creates the account and its default profile document.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(IdentityError::InvalidEmail);
        }
        if !is_strong_enough(password) {
            warn!("password too short");
            return Err(IdentityError::WeakPassword);
        }

        let _guard = self.sign_up_lock.lock().await;
        if self.find(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(IdentityError::EmailInUse);
        }

        let record = AccountRecord {
            uid: Uuid::new_v4(),
            email: email.clone(),
            password_hash: hash_password(password)?,
        };
        let payload = serde_json::to_value(&record).context("encode account record")?;
        // Profile first: the account record is what makes the email taken.
        UserProfile::default()
            .save(self.store.as_ref(), record.uid)
            .await?;
        self.store
            .set_document(ACCOUNTS_COLLECTION, &email, payload)
            .await?;

        info!(uid = %record.uid, email = %record.email, "account created");
        Ok(Identity {
            uid: record.uid,
            email: record.email,
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(IdentityError::InvalidEmail);
        }

        let Some(record) = self.find(&email).await? else {
            warn!(email = %email, "sign-in unknown email");
            return Err(IdentityError::InvalidCredentials);
        };
        if !verify_password(password, &record.password_hash)? {
            warn!(email = %email, uid = %record.uid, "sign-in invalid password");
            return Err(IdentityError::InvalidCredentials);
        }

        info!(uid = %record.uid, "signed in");
        Ok(Identity {
            uid: record.uid,
            email: record.email,
        })
    }
}
