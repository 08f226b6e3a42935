use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{LoginData, LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse},
    middleware::AuthUser,
    models::Identifier,
    services::ServiceError,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with email or phone and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account not activated or vendor not approved", body = ErrorResponse),
        (status = 429, description = "Too many login attempts from this client", body = ErrorResponse),
        (status = 503, description = "Datastore unavailable", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identifier = Identifier::from_exactly_one(req.email.as_deref(), req.phone.as_deref())
        .map_err(ServiceError::from)?;
    let session = state
        .sessions
        .login(&identifier, &Password::new(req.password))
        .await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            message: "success".to_string(),
            data: LoginData::from(session),
        }),
    ))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Logged out"),
        (status = 400, description = "Invalid refresh token", body = ErrorResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.logout(&req.refresh_token, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/auth/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token issued", body = RefreshResponse),
        (status = 400, description = "Invalid, expired or revoked refresh token", body = ErrorResponse),
        (status = 403, description = "Vendor not approved", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let access = state.sessions.refresh(&req.refresh).await?;
    Ok(Json(RefreshResponse { access }))
}
