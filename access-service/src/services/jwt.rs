use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Role, User};

/// JWT service for token generation and validation (HS256).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims for access tokens (short-lived, never stored)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub role: Role,
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Claims for refresh tokens (long-lived, revocable by `jti`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: Uuid,
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl RefreshTokenClaims {
    /// Seconds until expiry, never less than one.
    pub fn remaining_seconds(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(1)
    }
}

/// Freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_jti: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.signing_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    /// Mint an access/refresh pair. The access expiry is clamped so it never
    /// outlives the refresh token.
    pub fn generate_token_pair(&self, user: &User) -> Result<TokenPair, JwtError> {
        let now = Utc::now();
        let refresh_expires_at = now + Duration::days(self.refresh_token_expiry_days);
        let access_expires_at =
            (now + Duration::minutes(self.access_token_expiry_minutes)).min(refresh_expires_at);

        let access_token = self.generate_access_token_until(user, now, access_expires_at)?;

        let refresh_jti = Uuid::new_v4().to_string();
        let refresh_claims = RefreshTokenClaims {
            sub: user.user_id,
            token_type: TokenType::Refresh,
            exp: refresh_expires_at.timestamp(),
            iat: now.timestamp(),
            jti: refresh_jti.clone(),
        };
        let refresh_token = self.sign(&refresh_claims)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_jti,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Mint a standalone access token, bounded by `not_after` when given.
    pub fn generate_access_token(
        &self,
        user: &User,
        not_after: Option<i64>,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let mut exp = now + Duration::minutes(self.access_token_expiry_minutes);
        if let Some(bound) = not_after.and_then(|ts| Utc.timestamp_opt(ts, 0).single()) {
            exp = exp.min(bound);
        }
        self.generate_access_token_until(user, now, exp)
    }

    fn generate_access_token_until(
        &self,
        user: &User,
        now: DateTime<Utc>,
        exp: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let claims = AccessTokenClaims {
            sub: user.user_id,
            role: user.role,
            token_type: TokenType::Access,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    pub(crate) fn sign<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let claims: AccessTokenClaims = self.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::Invalid("not an access token".to_string()));
        }
        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, JwtError> {
        let claims: RefreshTokenClaims = self.decode(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::Invalid("not a refresh token".to_string()));
        }
        Ok(claims)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use secrecy::SecretString;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            signing_secret: SecretString::new("k".repeat(32)),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        })
    }

    fn user() -> User {
        User::new(NewUser {
            email: Some("jwt@example.com".to_string()),
            phone: None,
            password_hash: "hash".to_string(),
            first_name: "J".to_string(),
            last_name: "W".to_string(),
            role: Role::Admin,
        })
    }

    #[test]
    fn access_window_is_inside_refresh_window() {
        let jwt = service();
        let pair = jwt.generate_token_pair(&user()).unwrap();
        let access = jwt.validate_access_token(&pair.access_token).unwrap();
        let refresh = jwt.validate_refresh_token(&pair.refresh_token).unwrap();

        assert!(access.exp <= refresh.exp);
        assert_eq!(refresh.jti, pair.refresh_jti);
        assert_eq!(access.role, Role::Admin);
    }

    #[test]
    fn access_window_clamped_by_refresh_window() {
        let jwt = JwtService::new(&JwtConfig {
            signing_secret: SecretString::new("k".repeat(32)),
            access_token_expiry_minutes: 60 * 24 * 30,
            refresh_token_expiry_days: 1,
        });
        let pair = jwt.generate_token_pair(&user()).unwrap();
        assert!(pair.access_expires_at <= pair.refresh_expires_at);
    }

    #[test]
    fn token_types_are_not_interchangeable() {
        let jwt = service();
        let pair = jwt.generate_token_pair(&user()).unwrap();

        assert!(matches!(
            jwt.validate_access_token(&pair.refresh_token),
            Err(JwtError::Invalid(_))
        ));
        assert!(matches!(
            jwt.validate_refresh_token(&pair.access_token),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_distinguished() {
        let jwt = service();
        let u = user();
        let past = Utc::now() - Duration::minutes(5);
        let claims = AccessTokenClaims {
            sub: u.user_id,
            role: u.role,
            token_type: TokenType::Access,
            exp: past.timestamp(),
            iat: (past - Duration::minutes(15)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = jwt.sign(&claims).unwrap();
        assert_eq!(jwt.validate_access_token(&token).unwrap_err(), JwtError::Expired);
    }

    #[test]
    fn rejects_foreign_signature_and_garbage() {
        let other = JwtService::new(&JwtConfig {
            signing_secret: SecretString::new("z".repeat(32)),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        });
        let pair = other.generate_token_pair(&user()).unwrap();

        assert!(matches!(
            service().validate_access_token(&pair.access_token),
            Err(JwtError::Invalid(_))
        ));
        assert!(matches!(
            service().validate_refresh_token("not.a.jwt"),
            Err(JwtError::Invalid(_))
        ));
    }
}
