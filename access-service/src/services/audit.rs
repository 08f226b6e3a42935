use std::sync::Arc;
use uuid::Uuid;

use super::ServiceError;
use crate::models::ActivityLog;
use crate::store::ActivityLogStore;

pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Append-only trail of sensitive actions.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn ActivityLogStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn ActivityLogStore>) -> Self {
        Self { store }
    }

    /// Append an entry. A failed write never fails the caller; it is logged
    /// with an `alert` field instead.
    pub async fn record(&self, user_id: Uuid, action: impl Into<String>) {
        let entry = ActivityLog::new(user_id, action);
        if let Err(e) = self.store.append_activity(&entry).await {
            tracing::error!(
                alert = "audit_log_write_failed",
                user_id = %user_id,
                action = %entry.action,
                error = %e,
                "Failed to write audit log entry"
            );
        }
    }

    /// The user's own live entries, newest first.
    pub async fn recent_for(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<String>, ServiceError> {
        let entries = self.store.recent_activity(user_id, limit).await?;
        Ok(entries.into_iter().map(|e| e.action).collect())
    }
}
