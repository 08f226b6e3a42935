use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::{AuditLog, ServiceError};
use crate::models::{Role, User};
use crate::store::{GroupStore, UserStore};

/// A permission codename, optionally scoped to an admin module.
///
/// Module-scoped capabilities additionally require the holder to be an admin
/// with that module in their `module_access`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub permission: &'static str,
    pub module: Option<&'static str>,
}

impl Capability {
    pub const fn new(permission: &'static str) -> Self {
        Self {
            permission,
            module: None,
        }
    }

    pub const fn in_module(self, module: &'static str) -> Self {
        Self {
            permission: self.permission,
            module: Some(module),
        }
    }
}

pub const USER_MANAGEMENT_MODULE: &str = "user_management";

/// Provision new admin accounts.
pub const CREATE_ADMIN: Capability = Capability::new("add_user").in_module(USER_MANAGEMENT_MODULE);

/// List admin accounts.
pub const VIEW_ADMINS: Capability = Capability::new("view_user").in_module(USER_MANAGEMENT_MODULE);

/// Change the group membership of admin accounts.
pub const ASSIGN_ROLES: Capability =
    Capability::new("change_user").in_module(USER_MANAGEMENT_MODULE);

#[derive(Clone)]
pub struct AuthorizationModel {
    users: Arc<dyn UserStore>,
    groups: Arc<dyn GroupStore>,
    audit: AuditLog,
}

impl AuthorizationModel {
    pub fn new(users: Arc<dyn UserStore>, groups: Arc<dyn GroupStore>, audit: AuditLog) -> Self {
        Self {
            users,
            groups,
            audit,
        }
    }

    /// Union of the permission codenames of every group `user` belongs to.
    pub async fn effective_permissions(
        &self,
        user: &User,
    ) -> Result<BTreeSet<String>, ServiceError> {
        Ok(self
            .groups
            .permissions_for_user(user.user_id)
            .await?
            .into_iter()
            .map(|p| p.codename)
            .collect())
    }

    pub async fn has_capability(
        &self,
        user: &User,
        capability: &Capability,
    ) -> Result<bool, ServiceError> {
        if user.is_deleted || !user.is_active {
            return Ok(false);
        }
        if user.is_superuser {
            return Ok(true);
        }
        if let Some(module) = capability.module {
            if user.role != Role::Admin || !user.module_access.iter().any(|m| m == module) {
                return Ok(false);
            }
        }
        Ok(self
            .effective_permissions(user)
            .await?
            .contains(capability.permission))
    }

    pub async fn require(&self, user: &User, capability: &Capability) -> Result<(), ServiceError> {
        if self.has_capability(user, capability).await? {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %user.user_id,
                permission = capability.permission,
                "Capability check denied"
            );
            Err(ServiceError::PermissionDenied)
        }
    }

    /// Add `group_ids` to an admin's memberships and audit the change.
    /// Existing memberships are kept.
    pub async fn assign_groups(
        &self,
        target_id: Uuid,
        group_ids: &[Uuid],
        actor: &User,
    ) -> Result<User, ServiceError> {
        let target = self
            .users
            .find_user_by_id(target_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Admin not found".to_string()))?;

        if !target.is_role(Role::Admin) {
            return Err(ServiceError::Validation(
                "this is not an admin user".to_string(),
            ));
        }

        let requested: HashSet<Uuid> = group_ids.iter().copied().collect();
        let found = self.groups.find_groups(group_ids).await?;
        if found.len() != requested.len() {
            let known: HashSet<Uuid> = found.iter().map(|g| g.group_id).collect();
            let mut unknown: Vec<String> = requested
                .difference(&known)
                .map(|id| id.to_string())
                .collect();
            unknown.sort();
            return Err(ServiceError::Validation(format!(
                "unknown groups: {}",
                unknown.join(", ")
            )));
        }

        let ids: Vec<Uuid> = requested.into_iter().collect();
        self.groups.add_user_groups(target.user_id, &ids).await?;

        let label = target
            .email
            .clone()
            .or_else(|| target.phone.clone())
            .unwrap_or_else(|| target.user_id.to_string());
        self.audit
            .record(actor.user_id, format!("updated roles for {}", label))
            .await;
        tracing::info!(
            actor_id = %actor.user_id,
            target_id = %target.user_id,
            groups = ids.len(),
            "Groups assigned"
        );
        Ok(target)
    }
}
