use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::ServiceError;
use crate::config::OtpConfig;
use crate::models::{Identifier, OtpCode};
use crate::store::OtpStore;

/// A freshly issued code, ready to hand to a delivery channel.
#[derive(Clone)]
pub struct OtpChallenge {
    pub identifier: Identifier,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for OtpChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpChallenge")
            .field("identifier", &self.identifier)
            .field("code", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues and verifies one-time codes.
///
/// Lifecycle per identifier: issued, then consumed, expired or burned after
/// `max_attempts` wrong codes. Issuing again replaces the stored row, which
/// supersedes any earlier code and resets the miss count.
#[derive(Clone)]
pub struct OtpEngine {
    store: Arc<dyn OtpStore>,
    alphabet: Vec<char>,
    length: usize,
    expiry: Duration,
    max_attempts: u32,
}

impl OtpEngine {
    pub fn new(store: Arc<dyn OtpStore>, config: &OtpConfig) -> Self {
        Self {
            store,
            alphabet: config.alphabet.chars().collect(),
            length: config.length,
            expiry: Duration::seconds(config.expiry_seconds),
            max_attempts: config.max_attempts,
        }
    }

    pub async fn issue(&self, identifier: &Identifier) -> Result<OtpChallenge, ServiceError> {
        self.issue_at(identifier, Utc::now()).await
    }

    pub(crate) async fn issue_at(
        &self,
        identifier: &Identifier,
        now: DateTime<Utc>,
    ) -> Result<OtpChallenge, ServiceError> {
        let code = self.generate_code();
        let expires_at = now + self.expiry;
        let otp = OtpCode::new(
            identifier.value().to_string(),
            hash_otp(&code),
            now,
            expires_at,
        );

        self.store.replace_otp(&otp).await?;
        tracing::info!(identifier_kind = identifier.kind(), "OTP issued");

        Ok(OtpChallenge {
            identifier: identifier.clone(),
            code,
            expires_at,
        })
    }

    /// Check `submitted` against the live code and consume it on success.
    pub async fn verify(&self, identifier: &Identifier, submitted: &str) -> Result<(), ServiceError> {
        self.verify_at(identifier, submitted, Utc::now()).await
    }

    pub(crate) async fn verify_at(
        &self,
        identifier: &Identifier,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let otp = self
            .store
            .find_otp(identifier.value())
            .await?
            .ok_or(ServiceError::InvalidOtp)?;

        if otp.is_consumed() || otp.is_exhausted(self.max_attempts) {
            return Err(ServiceError::InvalidOtp);
        }

        let submitted_hash = hash_otp(submitted.trim());
        let matches: bool = submitted_hash
            .as_bytes()
            .ct_eq(otp.code_hash.as_bytes())
            .into();

        if !matches {
            let misses = self.store.record_miss(identifier.value(), otp.otp_id).await?;
            if misses.is_some_and(|count| count >= self.max_attempts) {
                tracing::warn!(
                    identifier_kind = identifier.kind(),
                    max_attempts = self.max_attempts,
                    "OTP burned after too many wrong codes"
                );
            }
            return Err(ServiceError::InvalidOtp);
        }
        if otp.is_expired_at(now) {
            return Err(ServiceError::ExpiredOtp);
        }

        // Losing the race to a concurrent verification, a newer issue or a
        // miss that exhausted the challenge reads as a wrong code.
        if !self
            .store
            .consume_otp(identifier.value(), otp.otp_id, self.max_attempts, now)
            .await?
        {
            return Err(ServiceError::InvalidOtp);
        }

        tracing::info!(identifier_kind = identifier.kind(), "OTP verified");
        Ok(())
    }

    fn generate_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect()
    }
}

fn hash_otp(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> OtpEngine {
        OtpEngine::new(
            Arc::new(MemoryStore::new()),
            &OtpConfig {
                length: 6,
                alphabet: "0123456789".to_string(),
                expiry_seconds: 300,
                max_attempts: 3,
            },
        )
    }

    fn ident() -> Identifier {
        Identifier::email("otp@example.com").unwrap()
    }

    #[tokio::test]
    async fn codes_follow_configured_shape() {
        let engine = OtpEngine::new(
            Arc::new(MemoryStore::new()),
            &OtpConfig {
                length: 8,
                alphabet: "AB".to_string(),
                expiry_seconds: 60,
                max_attempts: 3,
            },
        );
        let challenge = engine.issue(&ident()).await.unwrap();
        assert_eq!(challenge.code.len(), 8);
        assert!(challenge.code.chars().all(|c| c == 'A' || c == 'B'));
    }

    #[tokio::test]
    async fn verify_consumes_code() {
        let engine = engine();
        let challenge = engine.issue(&ident()).await.unwrap();

        engine.verify(&ident(), &challenge.code).await.unwrap();
        assert!(matches!(
            engine.verify(&ident(), &challenge.code).await,
            Err(ServiceError::InvalidOtp)
        ));
    }

    #[tokio::test]
    async fn new_code_supersedes_old_one() {
        let engine = engine();
        let first = engine.issue(&ident()).await.unwrap();
        let second = engine.issue(&ident()).await.unwrap();

        if first.code != second.code {
            assert!(matches!(
                engine.verify(&ident(), &first.code).await,
                Err(ServiceError::InvalidOtp)
            ));
        }
        engine.verify(&ident(), &second.code).await.unwrap();
    }

    #[tokio::test]
    async fn expired_code_is_rejected_even_when_correct() {
        let engine = engine();
        let now = Utc::now();
        let challenge = engine.issue_at(&ident(), now).await.unwrap();

        let later = now + Duration::seconds(301);
        assert!(matches!(
            engine.verify_at(&ident(), &challenge.code, later).await,
            Err(ServiceError::ExpiredOtp)
        ));
    }

    #[tokio::test]
    async fn wrong_code_and_unknown_identifier_are_invalid() {
        let engine = engine();
        let challenge = engine.issue(&ident()).await.unwrap();
        let wrong = wrong_code(&challenge.code);

        assert!(matches!(
            engine.verify(&ident(), &wrong).await,
            Err(ServiceError::InvalidOtp)
        ));
        let stranger = Identifier::email("nobody@example.com").unwrap();
        assert!(matches!(
            engine.verify(&stranger, &challenge.code).await,
            Err(ServiceError::InvalidOtp)
        ));
        // A single miss leaves the live code usable.
        engine.verify(&ident(), &challenge.code).await.unwrap();
    }

    fn wrong_code(code: &str) -> String {
        code.chars().map(|c| if c == '0' { '1' } else { '0' }).collect()
    }

    #[tokio::test]
    async fn correct_code_fails_after_max_misses() {
        let engine = engine();
        let challenge = engine.issue(&ident()).await.unwrap();
        let wrong = wrong_code(&challenge.code);

        for _ in 0..3 {
            assert!(matches!(
                engine.verify(&ident(), &wrong).await,
                Err(ServiceError::InvalidOtp)
            ));
        }
        assert!(matches!(
            engine.verify(&ident(), &challenge.code).await,
            Err(ServiceError::InvalidOtp)
        ));
    }

    #[tokio::test]
    async fn misses_below_cap_keep_code_alive() {
        let engine = engine();
        let challenge = engine.issue(&ident()).await.unwrap();
        let wrong = wrong_code(&challenge.code);

        for _ in 0..2 {
            let _ = engine.verify(&ident(), &wrong).await;
        }
        engine.verify(&ident(), &challenge.code).await.unwrap();
    }

    #[tokio::test]
    async fn reissue_restores_attempt_budget() {
        let engine = engine();
        let burned = engine.issue(&ident()).await.unwrap();
        let wrong = wrong_code(&burned.code);
        for _ in 0..3 {
            let _ = engine.verify(&ident(), &wrong).await;
        }

        let fresh = engine.issue(&ident()).await.unwrap();
        engine.verify(&ident(), &fresh.code).await.unwrap();
    }

    #[test]
    fn debug_hides_code() {
        let challenge = OtpChallenge {
            identifier: ident(),
            code: "123456".to_string(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{:?}", challenge).contains("123456"));
    }
}
