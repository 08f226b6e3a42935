//! OTP code model - one-time challenges bound to an email or phone.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Stored OTP. Only the SHA-256 digest of the code is kept.
///
/// There is at most one row per identifier; issuing a new code replaces the
/// row, which is what supersedes earlier challenges.
#[derive(Debug, Clone)]
pub struct OtpCode {
    pub otp_id: Uuid,
    pub identifier: String,
    pub code_hash: String,
    pub issued_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub consumed_utc: Option<DateTime<Utc>>,
    /// Wrong codes submitted against this challenge.
    pub attempt_count: u32,
}

impl OtpCode {
    pub fn new(
        identifier: String,
        code_hash: String,
        issued_utc: DateTime<Utc>,
        expiry_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            otp_id: Uuid::new_v4(),
            identifier,
            code_hash,
            issued_utc,
            expiry_utc,
            consumed_utc: None,
            attempt_count: 0,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_utc.is_some()
    }

    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.attempt_count >= max_attempts
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_utc
    }
}
