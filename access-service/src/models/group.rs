//! Group and permission models - the building blocks of role assignment.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A single named capability such as `add_user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub permission_id: Uuid,
    pub codename: String,
    pub name: String,
}

impl Permission {
    pub fn new(codename: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            permission_id: Uuid::new_v4(),
            codename: codename.into(),
            name: name.into(),
        }
    }
}

/// A named bundle of permissions. Users gain permissions through membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Group {
    pub group_id: Uuid,
    pub name: String,
    pub permission_ids: Vec<Uuid>,
}

impl Group {
    pub fn new(name: impl Into<String>, permission_ids: Vec<Uuid>) -> Self {
        Self {
            group_id: Uuid::new_v4(),
            name: name.into(),
            permission_ids,
        }
    }
}
