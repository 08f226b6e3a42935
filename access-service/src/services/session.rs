use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::authorization::{ASSIGN_ROLES, CREATE_ADMIN, VIEW_ADMINS};
use super::credentials::{AdminFields, Registration};
use super::events::{SessionEvent, SessionEvents};
use super::jwt::TokenPair;
use super::otp::OtpChallenge;
use super::{
    AuditLog, AuthorizationModel, CredentialStore, Notifier, OtpEngine, ServiceError,
    TokenService,
};
use crate::models::{Identifier, Role, User};
use crate::utils::Password;

/// Outcome of a successful login.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub user: User,
    pub tokens: TokenPair,
}

/// Result of an OTP verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpVerification {
    /// Whether an inactive account was activated by this verification.
    pub activated: bool,
}

/// Composes credentials, tokens, OTPs, authorization and audit into the
/// account flows, and owns the policy between them.
#[derive(Clone)]
pub struct SessionOrchestrator {
    credentials: CredentialStore,
    tokens: TokenService,
    otp: OtpEngine,
    authorization: AuthorizationModel,
    audit: AuditLog,
    events: SessionEvents,
    notifier: Arc<dyn Notifier>,
}

impl SessionOrchestrator {
    pub fn new(
        credentials: CredentialStore,
        tokens: TokenService,
        otp: OtpEngine,
        authorization: AuthorizationModel,
        audit: AuditLog,
        events: SessionEvents,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            otp,
            authorization,
            audit,
            events,
            notifier,
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn authorization(&self) -> &AuthorizationModel {
        &self.authorization
    }

    /// Credentials, then activation, then the vendor gate, then tokens.
    /// Login itself is not audited; a `LoggedIn` event is emitted instead.
    #[tracing::instrument(skip(self, identifier, password), fields(identifier_kind = identifier.kind()))]
    pub async fn login(
        &self,
        identifier: &Identifier,
        password: &Password,
    ) -> Result<SessionResult, ServiceError> {
        let user = self
            .credentials
            .authenticate(identifier, password)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !user.is_active {
            return Err(ServiceError::AccountNotActivated);
        }
        user.vendor_gate().map_err(ServiceError::VendorNotApproved)?;

        let tokens = self.tokens.issue_pair(&user)?;
        self.events.emit(SessionEvent::LoggedIn {
            user_id: user.user_id,
            at: Utc::now(),
        });
        tracing::info!(user_id = %user.user_id, role = %user.role, "Login succeeded");

        Ok(SessionResult { user, tokens })
    }

    /// Revoke the caller's refresh token. A token that cannot be parsed, was
    /// already revoked or belongs to someone else is an invalid token.
    #[tracing::instrument(skip(self, refresh_token, current_user), fields(user_id = %current_user.user_id))]
    pub async fn logout(&self, refresh_token: &str, current_user: &User) -> Result<(), ServiceError> {
        let claims = self.tokens.parse_refresh(refresh_token)?;
        if claims.sub != current_user.user_id {
            tracing::warn!("Logout attempted with another subject's refresh token");
            return Err(ServiceError::InvalidToken);
        }

        self.tokens.revoke_claims(&claims).await?;
        self.events.emit(SessionEvent::LoggedOut {
            user_id: current_user.user_id,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Exchange a live refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ServiceError> {
        let claims = self.tokens.check_refresh(refresh_token).await?;
        let user = self
            .credentials
            .find_live(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ServiceError::InvalidToken)?;
        user.vendor_gate().map_err(ServiceError::VendorNotApproved)?;

        self.tokens.issue_access(&user, &claims)
    }

    /// Live, active account behind an access token.
    pub async fn current_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self
            .credentials
            .find_live(user_id)
            .await?
            .filter(|u| u.is_active))
    }

    pub async fn register(&self, registration: Registration) -> Result<User, ServiceError> {
        self.credentials.register(registration).await
    }

    #[tracing::instrument(skip(self, identifier), fields(identifier_kind = identifier.kind()))]
    pub async fn request_otp(&self, identifier: &Identifier) -> Result<OtpChallenge, ServiceError> {
        let challenge = self.otp.issue(identifier).await?;
        self.notifier.send_otp(&challenge).await.map_err(|e| {
            tracing::error!(error = %e, "OTP dispatch failed");
            ServiceError::Internal(e)
        })?;
        Ok(challenge)
    }

    /// Verify and consume the code, then activate the matching inactive
    /// account if there is one.
    #[tracing::instrument(skip(self, identifier, code), fields(identifier_kind = identifier.kind()))]
    pub async fn verify_otp(
        &self,
        identifier: &Identifier,
        code: &str,
    ) -> Result<OtpVerification, ServiceError> {
        self.otp.verify(identifier, code).await?;
        let activated = self.credentials.activate(identifier).await?;
        if activated {
            tracing::info!("Account activated by OTP");
        }
        Ok(OtpVerification { activated })
    }

    /// Soft-delete `target_id`.
    ///
    /// The target's own password is tried first and only accepted from the
    /// target or an admin. Failing that, an admin may authorize with their own
    /// password.
    #[tracing::instrument(skip(self, requester, password), fields(requester_id = %requester.user_id))]
    pub async fn delete_account(
        &self,
        target_id: Uuid,
        requester: &User,
        password: &Password,
    ) -> Result<(), ServiceError> {
        let target = self
            .credentials
            .find_live(target_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("user not found".to_string()))?;

        let is_owner = requester.user_id == target.user_id;
        let is_admin = requester.is_role(Role::Admin);

        if (is_owner || is_admin) && self.credentials.verify_password(&target, password) {
            self.credentials.soft_delete(&target).await?;
            self.audit
                .record(target.user_id, "account deleted by self")
                .await;
            tracing::info!(target_id = %target.user_id, "Account deleted by owner password");
            return Ok(());
        }

        if is_admin && self.credentials.verify_password(requester, password) {
            self.credentials.soft_delete(&target).await?;
            self.audit
                .record(
                    requester.user_id,
                    format!("deleted account with id {}", target.user_id),
                )
                .await;
            tracing::info!(target_id = %target.user_id, "Account deleted by admin");
            return Ok(());
        }

        Err(ServiceError::IncorrectPassword)
    }

    /// Add groups to an admin account. Requires the role-assignment capability.
    pub async fn assign_role(
        &self,
        target_id: Uuid,
        group_ids: &[Uuid],
        actor: &User,
    ) -> Result<User, ServiceError> {
        self.authorization.require(actor, &ASSIGN_ROLES).await?;
        self.authorization
            .assign_groups(target_id, group_ids, actor)
            .await
    }

    /// Provision an admin. The generated password goes to the notifier and
    /// nowhere else.
    #[tracing::instrument(skip(self, fields, actor), fields(actor_id = %actor.user_id))]
    pub async fn create_admin(
        &self,
        fields: AdminFields,
        actor: &User,
    ) -> Result<User, ServiceError> {
        self.authorization.require(actor, &CREATE_ADMIN).await?;

        let email = fields.email.value().to_string();
        let provisioned = self.credentials.provision_admin(fields).await?;

        if let Err(e) = self
            .notifier
            .send_initial_password(&provisioned.user, &provisioned.initial_password)
            .await
        {
            tracing::error!(
                user_id = %provisioned.user.user_id,
                error = %e,
                "Failed to dispatch initial admin password"
            );
        }

        self.audit
            .record(actor.user_id, format!("created admin with email {}", email))
            .await;
        Ok(provisioned.user)
    }

    pub async fn list_admins(&self, actor: &User) -> Result<Vec<User>, ServiceError> {
        self.authorization.require(actor, &VIEW_ADMINS).await?;
        self.credentials.list_admins().await
    }

    pub async fn recent_activity(&self, user: &User, limit: usize) -> Result<Vec<String>, ServiceError> {
        self.audit.recent_for(user.user_id, limit).await
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.credentials.health_check().await?;
        self.tokens.health_check().await
    }
}
