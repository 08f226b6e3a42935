//! User model - platform accounts for regular users, vendors and admins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::utils::phone;

/// Account role codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Vendor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "user" => Some(Role::User),
            "vendor" => Some(Role::Vendor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor approval status codes. Only meaningful when the role is vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VendorStatus {
    Pending,
    Approved,
    Rejected,
}

impl VendorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorStatus::Pending => "pending",
            VendorStatus::Approved => "approved",
            VendorStatus::Rejected => "rejected",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pending" => Some(VendorStatus::Pending),
            "approved" => Some(VendorStatus::Approved),
            "rejected" => Some(VendorStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for VendorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("must supply email or phone")]
    Missing,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid phone number")]
    InvalidPhone,
}

/// The login handle of an account, normalized.
///
/// Emails are trimmed and lower-cased, phones are stored in E.164 form, so
/// the two namespaces never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Email(String),
    Phone(String),
}

impl Identifier {
    pub fn email(raw: &str) -> Result<Self, IdentifierError> {
        let email = raw.trim().to_lowercase();
        // Single-label hosts such as `localhost` pass the validator but are
        // not addresses an account can receive mail at.
        let dotted = email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| domain.contains('.'));
        if !dotted || !email.validate_email() {
            return Err(IdentifierError::InvalidEmail);
        }
        Ok(Identifier::Email(email))
    }

    pub fn phone(raw: &str) -> Result<Self, IdentifierError> {
        phone::normalize_e164(raw)
            .map(Identifier::Phone)
            .ok_or(IdentifierError::InvalidPhone)
    }

    /// Build the identifier from a request carrying exactly one of email or phone.
    pub fn from_exactly_one(
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Self, IdentifierError> {
        let email = email.map(str::trim).filter(|s| !s.is_empty());
        let phone = phone.map(str::trim).filter(|s| !s.is_empty());
        match (email, phone) {
            (Some(email), None) => Identifier::email(email),
            (None, Some(phone)) => Identifier::phone(phone),
            _ => Err(IdentifierError::Missing),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Identifier::Email(_) => "email",
            Identifier::Phone(_) => "phone",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::Email(v) | Identifier::Phone(v) => v,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// User entity.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub vendor_status: Option<VendorStatus>,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_superuser: bool,
    pub is_deleted: bool,
    pub module_access: Vec<String>,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

/// Fields needed to create an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl User {
    /// Create a new, inactive account. Vendors start pending approval.
    pub fn new(fields: NewUser) -> Self {
        let vendor_status = match fields.role {
            Role::Vendor => Some(VendorStatus::Pending),
            _ => None,
        };
        Self {
            user_id: Uuid::new_v4(),
            email: fields.email,
            phone: fields.phone,
            password_hash: fields.password_hash,
            first_name: fields.first_name,
            last_name: fields.last_name,
            is_admin: fields.role == Role::Admin,
            role: fields.role,
            vendor_status,
            is_active: false,
            is_superuser: false,
            is_deleted: false,
            module_access: Vec::new(),
            last_login_utc: None,
            created_utc: Utc::now(),
        }
    }

    pub fn is_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Vendors may only authenticate once approved; other roles are never gated.
    pub fn vendor_gate(&self) -> Result<(), VendorStatus> {
        if self.role != Role::Vendor {
            return Ok(());
        }
        match self.vendor_status.unwrap_or(VendorStatus::Pending) {
            VendorStatus::Approved => Ok(()),
            other => Err(other),
        }
    }

    pub fn matches(&self, identifier: &Identifier) -> bool {
        match identifier {
            Identifier::Email(email) => self.email.as_deref() == Some(email.as_str()),
            Identifier::Phone(phone) => self.phone.as_deref() == Some(phone.as_str()),
        }
    }

    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self)
    }
}

/// User as exposed over the API. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_status: Option<VendorStatus>,
    pub is_active: bool,
    pub is_admin: bool,
    pub modules: Vec<String>,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            vendor_status: user.vendor_status,
            is_active: user.is_active,
            is_admin: user.is_admin,
            modules: user.module_access.clone(),
            date_joined: user.created_utc,
        }
    }
}
