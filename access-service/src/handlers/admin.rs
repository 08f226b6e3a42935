use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        account::UserEnvelope,
        admin::{AdminList, AssignRoleRequest, CreateAdminRequest},
        MessageResponse,
    },
    middleware::AuthUser,
    models::Identifier,
    services::{AdminFields, ServiceError},
    utils::ValidatedJson,
    AppState,
};

/// Provision an admin account
///
/// The generated initial password is delivered out of band and never
/// returned.
#[utoipa::path(
    post,
    path = "/admins",
    request_body = CreateAdminRequest,
    responses(
        (status = 201, description = "Admin created", body = UserEnvelope),
        (status = 400, description = "Validation error or identifier already registered", body = ErrorResponse),
        (status = 403, description = "Missing add_user capability", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_admin(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = Identifier::email(&req.email).map_err(ServiceError::from)?;
    let phone = req
        .phone
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(Identifier::phone)
        .transpose()
        .map_err(ServiceError::from)?;

    let admin = state
        .sessions
        .create_admin(
            AdminFields {
                email,
                phone,
                first_name: req.first_name,
                last_name: req.last_name,
                module_access: req.module_access,
            },
            &actor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserEnvelope::success(admin.sanitized()))))
}

/// List active admin accounts, newest first
#[utoipa::path(
    get,
    path = "/admins",
    responses(
        (status = 200, description = "Admin accounts", body = AdminList),
        (status = 403, description = "Missing view_user capability", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_admins(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<AdminList>, AppError> {
    let admins = state.sessions.list_admins(&actor).await?;
    Ok(Json(AdminList::success(
        admins.iter().map(|admin| admin.sanitized()).collect(),
    )))
}

/// Add groups to an admin account
#[utoipa::path(
    patch,
    path = "/admins/{id}/roles",
    params(("id" = Uuid, Path, description = "Admin account")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Roles assigned", body = MessageResponse),
        (status = 400, description = "Target is not an admin or a group is unknown", body = ErrorResponse),
        (status = 403, description = "Missing change_user capability", body = ErrorResponse),
        (status = 404, description = "Admin not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn assign_role(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.assign_role(id, &req.roles, &actor).await?;
    Ok(Json(MessageResponse::success()))
}
