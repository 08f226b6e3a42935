//! Services layer for access-service.
//!
//! Credential checks, OTP challenges, session tokens, group-based
//! authorization and the audit trail, composed by [`SessionOrchestrator`].

pub mod audit;
pub mod authorization;
pub mod blacklist;
pub mod credentials;
pub mod error;
pub mod events;
pub mod jwt;
pub mod notifier;
pub mod otp;
pub mod session;
pub mod tokens;

pub use audit::{AuditLog, DEFAULT_RECENT_LIMIT};
pub use authorization::{
    AuthorizationModel, Capability, ASSIGN_ROLES, CREATE_ADMIN, VIEW_ADMINS,
};
pub use blacklist::{InMemoryBlacklist, RedisBlacklist, TokenBlacklist};
pub use credentials::{AdminFields, CredentialStore, ProvisionedAdmin, Registration};
pub use error::ServiceError;
pub use events::{spawn_last_login_tracker, SessionEvent, SessionEvents};
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims, TokenPair};
pub use notifier::{LogNotifier, Notifier, SmtpNotifier};
pub use otp::{OtpChallenge, OtpEngine};
pub use session::{OtpVerification, SessionOrchestrator, SessionResult};
pub use tokens::TokenService;
