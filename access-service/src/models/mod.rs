pub mod activity_log;
pub mod group;
pub mod otp_code;
pub mod user;

pub use activity_log::ActivityLog;
pub use group::{Group, Permission};
pub use otp_code::OtpCode;
pub use user::{Identifier, IdentifierError, NewUser, Role, User, UserResponse, VendorStatus};
