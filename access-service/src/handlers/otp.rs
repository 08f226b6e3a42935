use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{
        OtpIssuedData, OtpIssuedResponse, OtpRequest, OtpVerifiedData, OtpVerifiedResponse,
        VerifyOtpRequest,
    },
    models::Identifier,
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// Issue a one-time code to an email address or phone number
#[utoipa::path(
    post,
    path = "/auth/otp",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code issued", body = OtpIssuedResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many OTP requests from this client", body = ErrorResponse)
    ),
    tag = "OTP"
)]
pub async fn request_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identifier = Identifier::from_exactly_one(req.email.as_deref(), req.phone.as_deref())
        .map_err(ServiceError::from)?;
    let challenge = state.sessions.request_otp(&identifier).await?;

    Ok(Json(OtpIssuedResponse {
        message: "otp sent".to_string(),
        data: OtpIssuedData {
            identifier: challenge.identifier.value().to_string(),
            expires_at: challenge.expires_at,
        },
    }))
}

/// Verify a one-time code
#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code verified", body = OtpVerifiedResponse),
        (status = 400, description = "Invalid, expired or exhausted code", body = ErrorResponse),
        (status = 429, description = "Too many OTP requests from this client", body = ErrorResponse)
    ),
    tag = "OTP"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identifier = Identifier::from_exactly_one(req.email.as_deref(), req.phone.as_deref())
        .map_err(ServiceError::from)?;
    let outcome = state.sessions.verify_otp(&identifier, &req.otp).await?;

    Ok(Json(OtpVerifiedResponse {
        message: "success".to_string(),
        data: OtpVerifiedData {
            verified: true,
            activated: outcome.activated,
        },
    }))
}
