use std::sync::Arc;

use super::blacklist::TokenBlacklist;
use super::jwt::{AccessTokenClaims, JwtError, JwtService, RefreshTokenClaims, TokenPair};
use super::ServiceError;
use crate::models::User;

/// Issues, validates and revokes session tokens.
///
/// Access tokens are verified statelessly. Refresh tokens are checked against
/// the blacklist, so revocation takes effect on the next refresh or logout.
#[derive(Clone)]
pub struct TokenService {
    jwt: JwtService,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl From<JwtError> for ServiceError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ServiceError::TokenExpired,
            JwtError::Invalid(_) => ServiceError::InvalidToken,
            JwtError::Signing(e) => ServiceError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl TokenService {
    pub fn new(jwt: JwtService, blacklist: Arc<dyn TokenBlacklist>) -> Self {
        Self { jwt, blacklist }
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, ServiceError> {
        Ok(self.jwt.generate_token_pair(user)?)
    }

    pub fn validate_access(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        Ok(self.jwt.validate_access_token(token)?)
    }

    /// Decode a refresh token. Any decoding failure, expiry included, counts
    /// as an invalid token here.
    pub fn parse_refresh(&self, token: &str) -> Result<RefreshTokenClaims, ServiceError> {
        self.jwt
            .validate_refresh_token(token)
            .map_err(|_| ServiceError::InvalidToken)
    }

    /// Blacklist an already-parsed refresh token. Revoking the same token twice
    /// fails.
    pub async fn revoke_claims(&self, claims: &RefreshTokenClaims) -> Result<(), ServiceError> {
        let inserted = self
            .blacklist
            .blacklist_token(&claims.jti, claims.remaining_seconds())
            .await?;
        if !inserted {
            tracing::warn!(user_id = %claims.sub, "Refresh token revoked twice");
            return Err(ServiceError::InvalidToken);
        }
        Ok(())
    }

    pub async fn revoke(&self, refresh_token: &str) -> Result<RefreshTokenClaims, ServiceError> {
        let claims = self.parse_refresh(refresh_token)?;
        self.revoke_claims(&claims).await?;
        Ok(claims)
    }

    /// Validate a refresh token for reuse: signature, expiry and blacklist.
    pub async fn check_refresh(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenClaims, ServiceError> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;
        if self.blacklist.is_blacklisted(&claims.jti).await? {
            return Err(ServiceError::InvalidToken);
        }
        Ok(claims)
    }

    /// Access token for `user`, never outliving the refresh token it came from.
    pub fn issue_access(
        &self,
        user: &User,
        refresh: &RefreshTokenClaims,
    ) -> Result<String, ServiceError> {
        Ok(self.jwt.generate_access_token(user, Some(refresh.exp))?)
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(self.blacklist.health_check().await?)
    }
}
