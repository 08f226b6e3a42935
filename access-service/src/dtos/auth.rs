use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Role;
use crate::services::SessionResult;

/// Exactly one of `email` or `phone` must be set.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "user@example.com")]
    pub email: Option<String>,

    #[schema(example = "+2348012345678")]
    pub phone: Option<String>,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginData {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    /// E.164
    pub phone: Option<String>,
    pub role: Role,
    pub is_admin: bool,
    pub access: String,
    pub refresh: String,
    /// Only present for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<String>>,
}

impl From<SessionResult> for LoginData {
    fn from(session: SessionResult) -> Self {
        let user = session.user;
        let modules = user.is_role(Role::Admin).then(|| user.module_access.clone());
        Self {
            id: user.user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            is_admin: user.is_admin,
            access: session.tokens.access_token,
            refresh: session.tokens.refresh_token,
            modules,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "success")]
    pub message: String,
    pub data: LoginData,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh is required"))]
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access: String,
}

/// Exactly one of `email` or `phone` must be set.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OtpRequest {
    #[schema(example = "user@example.com")]
    pub email: Option<String>,
    #[schema(example = "+2348012345678")]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[schema(example = "user@example.com")]
    pub email: Option<String>,
    #[schema(example = "+2348012345678")]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 32, message = "otp is required"))]
    #[schema(example = "482913")]
    pub otp: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OtpIssuedData {
    pub identifier: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OtpIssuedResponse {
    #[schema(example = "otp sent")]
    pub message: String,
    pub data: OtpIssuedData,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OtpVerifiedData {
    pub verified: bool,
    pub activated: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OtpVerifiedResponse {
    #[schema(example = "success")]
    pub message: String,
    pub data: OtpVerifiedData,
}
