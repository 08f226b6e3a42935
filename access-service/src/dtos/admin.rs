use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::UserResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAdminRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "admin@example.com")]
    pub email: String,

    #[schema(example = "+2348012345678")]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 150, message = "first_name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 150, message = "last_name is required"))]
    pub last_name: String,

    /// Admin modules this account may use.
    #[serde(default)]
    #[schema(example = json!(["user_management"]))]
    pub module_access: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRoleRequest {
    /// Group ids to add to the admin's memberships.
    #[validate(length(min = 1, message = "at least one role is required"))]
    pub roles: Vec<Uuid>,
}

/// Active admins, newest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminList {
    #[schema(example = "success")]
    pub message: String,
    pub data: Vec<UserResponse>,
}

impl AdminList {
    pub fn success(data: Vec<UserResponse>) -> Self {
        Self {
            message: "success".to_string(),
            data,
        }
    }
}
