//! Activity log model - append-only audit trail of sensitive actions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ActivityLog {
    pub log_id: Uuid,
    /// Actor or subject, depending on the action.
    pub user_id: Uuid,
    pub action: String,
    pub date_created: DateTime<Utc>,
    pub is_deleted: bool,
}

impl ActivityLog {
    pub fn new(user_id: Uuid, action: impl Into<String>) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            user_id,
            action: action.into(),
            date_created: Utc::now(),
            is_deleted: false,
        }
    }
}
