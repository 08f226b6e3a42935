use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use redis::{aio::ConnectionManager, Client};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::RedisConfig;
use crate::store::StoreError;

/// Revoked refresh-token ids.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Atomically add `token_jti` unless it is already present. Returns
    /// false when the id was already blacklisted.
    async fn blacklist_token(&self, token_jti: &str, expiry_seconds: i64)
        -> Result<bool, StoreError>;
    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, StoreError>;
    async fn health_check(&self) -> Result<(), StoreError>;
}

fn blacklist_key(token_jti: &str) -> String {
    format!("blacklist:{}", token_jti)
}

#[derive(Clone)]
pub struct RedisBlacklist {
    manager: ConnectionManager,
}

impl RedisBlacklist {
    pub async fn connect(config: &RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl TokenBlacklist for RedisBlacklist {
    async fn blacklist_token(
        &self,
        token_jti: &str,
        expiry_seconds: i64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();

        // SET NX replies OK when the key was written and nil when it existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(blacklist_key(token_jti))
            .arg("revoked")
            .arg("NX")
            .arg("EX")
            .arg(expiry_seconds.max(1))
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(blacklist_key(token_jti))
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Inserts between sweeps of lapsed entries.
const PRUNE_EVERY: u64 = 256;

/// Blacklist held in process memory. Entries lapse with the token and are
/// swept out every [`PRUNE_EVERY`] inserts.
#[derive(Default)]
pub struct InMemoryBlacklist {
    tokens: DashMap<String, DateTime<Utc>>,
    inserts: AtomicU64,
}

impl InMemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drop entries whose token has expired by `now`.
    pub fn prune_expired(&self, now: DateTime<Utc>) {
        self.tokens.retain(|_, expires_at| *expires_at > now);
    }

    fn insert_at(&self, token_jti: &str, expiry_seconds: i64, now: DateTime<Utc>) -> bool {
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % PRUNE_EVERY == 0 {
            self.prune_expired(now);
        }

        let expires_at = now + Duration::seconds(expiry_seconds.max(1));
        match self.tokens.entry(token_jti.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return false;
                }
                entry.insert(expires_at);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        }
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryBlacklist {
    async fn blacklist_token(
        &self,
        token_jti: &str,
        expiry_seconds: i64,
    ) -> Result<bool, StoreError> {
        Ok(self.insert_at(token_jti, expiry_seconds, Utc::now()))
    }

    async fn is_blacklisted(&self, token_jti: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .get(token_jti)
            .map(|expires_at| *expires_at > now)
            .unwrap_or(false))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
