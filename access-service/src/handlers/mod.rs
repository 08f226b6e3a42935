pub mod account;
pub mod admin;
pub mod auth;
pub mod otp;

pub use account::{delete_account, recent_activity, register};
pub use admin::{assign_role, create_admin, list_admins};
pub use auth::{login, logout, refresh};
pub use otp::{request_otp, verify_otp};
