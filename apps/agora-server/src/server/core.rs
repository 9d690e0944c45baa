use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, OnceLock},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use agora_core::UserId;
use anyhow::anyhow;
use pasetors::{keys::SymmetricKey, version4::V4};
use rand::{rngs::OsRng, RngCore};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;

use super::{auth::hash_password, files::FileStore, store::Store};

pub const DEFAULT_JSON_BODY_LIMIT_BYTES: usize = 4 * 1_048_576;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE: u32 = 120;
pub const DEFAULT_MAX_COMMUNITIES_PER_USER: usize = 20;
pub const DEFAULT_MAX_CHANNELS_PER_COMMUNITY: usize = 60;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_MAX_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1_048_576;
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 60 * 60;
pub(crate) const METRICS_TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub(crate) static METRICS_STATE: OnceLock<MetricsState> = OnceLock::new();

#[derive(Default)]
pub(crate) struct MetricsState {
    pub(crate) auth_failures: Mutex<HashMap<&'static str, u64>>,
    pub(crate) rate_limit_hits: Mutex<HashMap<(&'static str, &'static str), u64>>,
    pub(crate) operation_outcomes: Mutex<HashMap<(&'static str, &'static str), u64>>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub rate_limit_requests_per_minute: u32,
    pub max_communities_per_user: usize,
    pub max_channels_per_community: usize,
    pub default_history_limit: usize,
    pub max_history_limit: usize,
    pub max_upload_bytes: usize,
    pub access_token_ttl: Duration,
    pub upload_root: Option<PathBuf>,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_JSON_BODY_LIMIT_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rate_limit_requests_per_minute: DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE,
            max_communities_per_user: DEFAULT_MAX_COMMUNITIES_PER_USER,
            max_channels_per_community: DEFAULT_MAX_CHANNELS_PER_COMMUNITY,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
            max_history_limit: DEFAULT_MAX_HISTORY_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            access_token_ttl: Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            upload_root: None,
            database_url: None,
        }
    }
}

impl AppConfig {
    /// Rejects limits that would make the service unusable.
    ///
    /// # Errors
    /// Returns an error naming the first invalid limit.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_communities_per_user == 0 {
            return Err(anyhow!(
                "max communities per user must be at least 1 community"
            ));
        }
        if self.max_channels_per_community == 0 {
            return Err(anyhow!(
                "max channels per community must be at least 1 channel"
            ));
        }
        if self.max_history_limit == 0 {
            return Err(anyhow!("max history limit must be at least 1 message"));
        }
        if self.default_history_limit == 0 || self.default_history_limit > self.max_history_limit
        {
            return Err(anyhow!(
                "default history limit must be between 1 and {}",
                self.max_history_limit
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("max upload bytes must be at least 1 byte"));
        }
        if self.rate_limit_requests_per_minute == 0 {
            return Err(anyhow!(
                "rate limit must be at least 1 request per minute"
            ));
        }
        if self.access_token_ttl.is_zero() {
            return Err(anyhow!("access token ttl must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RuntimeConfig {
    pub(crate) max_communities_per_user: usize,
    pub(crate) max_channels_per_community: usize,
    pub(crate) default_history_limit: usize,
    pub(crate) max_history_limit: usize,
    pub(crate) access_token_ttl: Duration,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Store,
    pub(crate) files: FileStore,
    pub(crate) token_key: Arc<SymmetricKey<V4>>,
    pub(crate) dummy_password_hash: Arc<String>,
    pub(crate) catalog_seeded: Arc<OnceCell<()>>,
    pub(crate) runtime: Arc<RuntimeConfig>,
}

impl AppState {
    pub(crate) fn new(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut key_bytes = [0_u8; 32];
        OsRng.fill_bytes(&mut key_bytes);
        let token_key = SymmetricKey::<V4>::from(&key_bytes)
            .map_err(|e| anyhow!("token key init failed: {e}"))?;
        let dummy_password_hash = hash_password("agora-dummy-password")?;

        let store = if let Some(database_url) = &config.database_url {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect_lazy(database_url)
                .map_err(|e| anyhow!("postgres pool init failed: {e}"))?;
            Store::postgres(pool)
        } else {
            Store::in_memory()
        };
        let files = FileStore::new(config.upload_root.as_deref(), config.max_upload_bytes)?;

        Ok(Self {
            store,
            files,
            token_key: Arc::new(token_key),
            dummy_password_hash: Arc::new(dummy_password_hash),
            catalog_seeded: Arc::new(OnceCell::new()),
            runtime: Arc::new(RuntimeConfig {
                max_communities_per_user: config.max_communities_per_user,
                max_channels_per_community: config.max_channels_per_community,
                default_history_limit: config.default_history_limit,
                max_history_limit: config.max_history_limit,
                access_token_ttl: config.access_token_ttl,
            }),
        })
    }
}

/// The authenticated caller. Every service call that mutates state takes one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthContext {
    pub(crate) user_id: UserId,
}

pub(crate) fn now_unix() -> i64 {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs();
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

pub(crate) fn now_unix_ms() -> i64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::AppConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_unusable_limits() {
        let zero_quota = AppConfig {
            max_communities_per_user: 0,
            ..AppConfig::default()
        };
        assert!(zero_quota.validate().is_err());

        let inverted_history = AppConfig {
            default_history_limit: 50,
            max_history_limit: 10,
            ..AppConfig::default()
        };
        assert!(inverted_history.validate().is_err());

        let zero_ttl = AppConfig {
            access_token_ttl: Duration::ZERO,
            ..AppConfig::default()
        };
        assert!(zero_ttl.validate().is_err());
    }
}
