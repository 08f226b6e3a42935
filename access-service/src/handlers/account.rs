use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::account::{ActivityEntry, DeleteAccountRequest, RegisterRequest, UserEnvelope},
    middleware::AuthUser,
    models::{Identifier, Role},
    services::{Registration, ServiceError, DEFAULT_RECENT_LIMIT},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Register a user or vendor account
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, pending activation", body = UserEnvelope),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Identifier already registered", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req
        .email
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(Identifier::email)
        .transpose()
        .map_err(ServiceError::from)?;
    let phone = req
        .phone
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(Identifier::phone)
        .transpose()
        .map_err(ServiceError::from)?;

    let user = state
        .sessions
        .register(Registration {
            email,
            phone,
            first_name: req.first_name,
            last_name: req.last_name,
            password: Password::new(req.password),
            role: req.role.unwrap_or(Role::User),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserEnvelope::success(user.sanitized()))))
}

/// Soft-delete an account
///
/// The account owner confirms with their own password; an admin may confirm
/// with either the owner's password or their own.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "Account to delete")),
    request_body = DeleteAccountRequest,
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Incorrect password", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<DeleteAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .delete_account(id, &requester, &Password::new(req.current_password))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's most recent audited actions, newest first
#[utoipa::path(
    get,
    path = "/users/me/activity",
    responses(
        (status = 200, description = "Recent activity", body = [ActivityEntry]),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "Accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recent_activity(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let entries: Vec<ActivityEntry> = state
        .sessions
        .recent_activity(&user, DEFAULT_RECENT_LIMIT)
        .await?
        .into_iter()
        .map(|action| ActivityEntry { action })
        .collect();
    Ok(Json(entries))
}
