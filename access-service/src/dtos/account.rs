use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Role, UserResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "user@example.com")]
    pub email: Option<String>,

    #[schema(example = "+2348012345678")]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 150, message = "first_name is required"))]
    #[schema(example = "Ada")]
    pub first_name: String,

    #[validate(length(min = 1, max = 150, message = "last_name is required"))]
    #[schema(example = "Obi")]
    pub last_name: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    /// `user` (default) or `vendor`.
    pub role: Option<Role>,
}

/// Envelope for endpoints that return a user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserEnvelope {
    #[schema(example = "success")]
    pub message: String,
    pub data: UserResponse,
}

impl UserEnvelope {
    pub fn success(data: UserResponse) -> Self {
        Self {
            message: "success".to_string(),
            data,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteAccountRequest {
    #[validate(length(min = 1, message = "current_password is required"))]
    pub current_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    #[schema(example = "updated roles for admin@example.com")]
    pub action: String,
}
