use service_core::error::AppError;
use thiserror::Error;

use crate::models::{IdentifierError, VendorStatus};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials or password")]
    InvalidCredentials,

    #[error("account not activated")]
    AccountNotActivated,

    #[error("cannot login as vendor. your current status is {0}")]
    VendorNotApproved(VendorStatus),

    #[error("you do not have permission to perform this action")]
    PermissionDenied,

    #[error("{0}")]
    NotFound(String),

    #[error("invalid or already used otp")]
    InvalidOtp,

    #[error("otp has expired")]
    ExpiredOtp,

    #[error("invalid refresh token")]
    InvalidToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<IdentifierError> for ServiceError {
    fn from(err: IdentifierError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Validation(_) => AppError::InvalidInput(anyhow::anyhow!(message)),
            ServiceError::InvalidCredentials | ServiceError::IncorrectPassword => {
                AppError::Unauthorized(anyhow::anyhow!(message))
            }
            ServiceError::AccountNotActivated
            | ServiceError::VendorNotApproved(_)
            | ServiceError::PermissionDenied => AppError::Forbidden(anyhow::anyhow!(message)),
            ServiceError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(message)),
            ServiceError::InvalidOtp
            | ServiceError::ExpiredOtp
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired => AppError::TokenError(anyhow::anyhow!(message)),
            ServiceError::Conflict(_) => AppError::Conflict(anyhow::anyhow!(message)),
            ServiceError::Store(StoreError::Unavailable(e)) => AppError::ServiceUnavailable(e),
            ServiceError::Store(StoreError::Duplicate(constraint)) => AppError::Conflict(
                anyhow::anyhow!("record already exists ({})", constraint),
            ),
            ServiceError::Store(StoreError::Backend(e)) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
