use anyhow::Context;
use serde::Deserialize;
use time::{Duration, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    /// Lifetime of a client session and its token, at least one minute.
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// In-memory documents when unset.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub utc_offset_hours: i8,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "macrolog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "macrolog-clients".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(12 * 60),
        };
        let utc_offset_hours = std::env::var("APP_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse::<i8>().ok())
            .unwrap_or(0);
        let config = Self {
            database_url,
            jwt,
            utc_offset_hours,
        };
        config.utc_offset()?;
        Ok(config)
    }

    pub fn utc_offset(&self) -> anyhow::Result<UtcOffset> {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0)
            .with_context(|| format!("invalid APP_UTC_OFFSET_HOURS {}", self.utc_offset_hours))
    }
}
