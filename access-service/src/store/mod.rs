//! Data-access boundary.
//!
//! Every user read filters soft-deleted accounts and every activity read
//! filters soft-deleted entries here, so callers never see them.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ActivityLog, Group, Identifier, OtpCode, Permission, User};

pub use memory::MemoryStore;
pub use postgres::Database;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Timeouts, refused or dropped connections. Retryable.
    #[error("datastore unavailable: {0}")]
    Unavailable(anyhow::Error),

    /// A unique constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("datastore error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(anyhow::Error::new(err))
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string())
            }
            other => StoreError::Backend(anyhow::Error::new(other)),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_io_error()
        {
            StoreError::Unavailable(anyhow::Error::new(err))
        } else {
            StoreError::Backend(anyhow::Error::new(err))
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Duplicate` when the email or phone is already taken by a
    /// live account.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, StoreError>;
    /// Returns whether a live account was updated.
    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, StoreError>;
    /// Returns whether a live account was deleted.
    async fn soft_delete_user(&self, user_id: Uuid) -> Result<bool, StoreError>;
    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
    /// Live, active accounts with the admin role, newest first.
    async fn list_admins(&self) -> Result<Vec<User>, StoreError>;
    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store `otp` as the only challenge for its identifier.
    async fn replace_otp(&self, otp: &OtpCode) -> Result<(), StoreError>;
    async fn find_otp(&self, identifier: &str) -> Result<Option<OtpCode>, StoreError>;
    /// Mark the challenge consumed if it is still the current, unconsumed one
    /// and has fewer than `max_attempts` misses. Returns false when another
    /// caller got there first, it was superseded or it is exhausted.
    async fn consume_otp(
        &self,
        identifier: &str,
        otp_id: Uuid,
        max_attempts: u32,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Atomically count a wrong code against the current challenge.
    /// Returns the new count, or `None` if the challenge is gone, superseded
    /// or consumed.
    async fn record_miss(&self, identifier: &str, otp_id: Uuid) -> Result<Option<u32>, StoreError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError>;
    async fn insert_group(&self, group: &Group) -> Result<(), StoreError>;
    /// Groups among `group_ids` that exist. Unknown ids are skipped.
    async fn find_groups(&self, group_ids: &[Uuid]) -> Result<Vec<Group>, StoreError>;
    /// Adds memberships; existing ones are kept.
    async fn add_user_groups(&self, user_id: Uuid, group_ids: &[Uuid]) -> Result<(), StoreError>;
    async fn user_group_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
    /// Union of the permissions of every group the user belongs to.
    async fn permissions_for_user(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError>;
}

#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    async fn append_activity(&self, entry: &ActivityLog) -> Result<(), StoreError>;
    /// Live entries for `user_id`, newest first.
    async fn recent_activity(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, StoreError>;
}

/// All stores the service needs, behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserStore>,
    pub otps: Arc<dyn OtpStore>,
    pub groups: Arc<dyn GroupStore>,
    pub activity: Arc<dyn ActivityLogStore>,
}

impl Storage {
    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    pub fn postgres(db: Database) -> Self {
        Self::from_backend(Arc::new(db))
    }

    fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserStore + OtpStore + GroupStore + ActivityLogStore + 'static,
    {
        Self {
            users: backend.clone(),
            otps: backend.clone(),
            groups: backend.clone(),
            activity: backend,
        }
    }
}
