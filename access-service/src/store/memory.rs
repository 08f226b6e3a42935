//! In-process store for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::{ActivityLogStore, GroupStore, OtpStore, StoreError, UserStore};
use crate::models::{ActivityLog, Group, Identifier, OtpCode, Permission, Role, User};

#[derive(Default)]
pub struct MemoryStore {
    // A single lock keeps the uniqueness check and the insert atomic.
    users: Mutex<HashMap<Uuid, User>>,
    otps: DashMap<String, OtpCode>,
    permissions: DashMap<Uuid, Permission>,
    groups: DashMap<Uuid, Group>,
    memberships: DashMap<Uuid, BTreeSet<Uuid>>,
    activity: Mutex<Vec<ActivityLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("user map poisoned: {}", e)))
    }

    fn activity(&self) -> Result<std::sync::MutexGuard<'_, Vec<ActivityLog>>, StoreError> {
        self.activity
            .lock()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("activity log poisoned: {}", e)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users()?;
        for existing in users.values().filter(|u| !u.is_deleted) {
            if user.email.is_some() && existing.email == user.email {
                return Err(StoreError::Duplicate("users_email_key".to_string()));
            }
            if user.phone.is_some() && existing.phone == user.phone {
                return Err(StoreError::Duplicate("users_phone_key".to_string()));
            }
        }
        if users.contains_key(&user.user_id) {
            return Err(StoreError::Duplicate("users_pkey".to_string()));
        }
        users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()?
            .get(&user_id)
            .filter(|u| !u.is_deleted)
            .cloned())
    }

    async fn find_user_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()?
            .values()
            .find(|u| !u.is_deleted && u.matches(identifier))
            .cloned())
    }

    async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<bool, StoreError> {
        let mut users = self.users()?;
        match users.get_mut(&user_id).filter(|u| !u.is_deleted) {
            Some(user) => {
                user.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_user(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let mut users = self.users()?;
        match users.get_mut(&user_id).filter(|u| !u.is_deleted) {
            Some(user) => {
                user.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(user) = self.users()?.get_mut(&user_id) {
            user.last_login_utc = Some(at);
        }
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<User>, StoreError> {
        let mut admins: Vec<User> = self
            .users()?
            .values()
            .filter(|u| !u.is_deleted && u.is_active && u.role == Role::Admin)
            .cloned()
            .collect();
        admins.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(admins)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn replace_otp(&self, otp: &OtpCode) -> Result<(), StoreError> {
        self.otps.insert(otp.identifier.clone(), otp.clone());
        Ok(())
    }

    async fn find_otp(&self, identifier: &str) -> Result<Option<OtpCode>, StoreError> {
        Ok(self.otps.get(identifier).map(|otp| otp.clone()))
    }

    async fn consume_otp(
        &self,
        identifier: &str,
        otp_id: Uuid,
        max_attempts: u32,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // get_mut holds the shard lock, making check-and-set atomic.
        match self.otps.get_mut(identifier) {
            Some(mut otp)
                if otp.otp_id == otp_id
                    && otp.consumed_utc.is_none()
                    && !otp.is_exhausted(max_attempts) =>
            {
                otp.consumed_utc = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_miss(&self, identifier: &str, otp_id: Uuid) -> Result<Option<u32>, StoreError> {
        match self.otps.get_mut(identifier) {
            Some(mut otp) if otp.otp_id == otp_id && otp.consumed_utc.is_none() => {
                otp.attempt_count = otp.attempt_count.saturating_add(1);
                Ok(Some(otp.attempt_count))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn insert_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        if self
            .permissions
            .iter()
            .any(|p| p.codename == permission.codename)
        {
            return Err(StoreError::Duplicate("permissions_codename_key".to_string()));
        }
        self.permissions
            .insert(permission.permission_id, permission.clone());
        Ok(())
    }

    async fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        if self.groups.iter().any(|g| g.name == group.name) {
            return Err(StoreError::Duplicate("groups_name_key".to_string()));
        }
        if let Some(missing) = group
            .permission_ids
            .iter()
            .find(|id| !self.permissions.contains_key(id))
        {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "unknown permission {}",
                missing
            )));
        }
        self.groups.insert(group.group_id, group.clone());
        Ok(())
    }

    async fn find_groups(&self, group_ids: &[Uuid]) -> Result<Vec<Group>, StoreError> {
        let wanted: HashSet<&Uuid> = group_ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| self.groups.get(id).map(|g| g.clone()))
            .collect())
    }

    async fn add_user_groups(&self, user_id: Uuid, group_ids: &[Uuid]) -> Result<(), StoreError> {
        self.memberships
            .entry(user_id)
            .or_default()
            .extend(group_ids.iter().copied());
        Ok(())
    }

    async fn user_group_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .memberships
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> Result<Vec<Permission>, StoreError> {
        let group_ids = self.user_group_ids(user_id).await?;
        let permission_ids: BTreeSet<Uuid> = group_ids
            .iter()
            .filter_map(|id| self.groups.get(id))
            .flat_map(|g| g.permission_ids.clone())
            .collect();
        Ok(permission_ids
            .iter()
            .filter_map(|id| self.permissions.get(id).map(|p| p.clone()))
            .collect())
    }
}

#[async_trait]
impl ActivityLogStore for MemoryStore {
    async fn append_activity(&self, entry: &ActivityLog) -> Result<(), StoreError> {
        self.activity()?.push(entry.clone());
        Ok(())
    }

    async fn recent_activity(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        // Walk newest-appended first so equal timestamps keep insertion order.
        let mut entries: Vec<ActivityLog> = self
            .activity()?
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id && !e.is_deleted)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        entries.truncate(limit);
        Ok(entries)
    }
}
