pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AccessConfig, Environment};
use crate::services::{
    AuditLog, AuthorizationModel, CredentialStore, JwtService, Notifier, OtpEngine,
    SessionEvents, SessionOrchestrator, TokenBlacklist, TokenService,
};
use crate::store::Storage;
use crate::utils::PasswordHashing;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::refresh,
        handlers::otp::request_otp,
        handlers::otp::verify_otp,
        handlers::account::register,
        handlers::account::delete_account,
        handlers::account::recent_activity,
        handlers::admin::create_admin,
        handlers::admin::list_admins,
        handlers::admin::assign_role,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginData,
            dtos::auth::LoginResponse,
            dtos::auth::LogoutRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::RefreshResponse,
            dtos::auth::OtpRequest,
            dtos::auth::OtpIssuedData,
            dtos::auth::OtpIssuedResponse,
            dtos::auth::VerifyOtpRequest,
            dtos::auth::OtpVerifiedData,
            dtos::auth::OtpVerifiedResponse,
            dtos::account::RegisterRequest,
            dtos::account::UserEnvelope,
            dtos::account::DeleteAccountRequest,
            dtos::account::ActivityEntry,
            dtos::admin::CreateAdminRequest,
            dtos::admin::AssignRoleRequest,
            dtos::admin::AdminList,
            models::UserResponse,
            models::Role,
            models::VendorStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, logout and token refresh"),
        (name = "OTP", description = "One-time code issuance and verification"),
        (name = "Accounts", description = "Registration, deletion and activity"),
        (name = "Admin", description = "Admin provisioning, listing and role assignment"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub sessions: SessionOrchestrator,
    pub storage: Storage,
    pub login_rate_limit: IpRateLimit,
    pub otp_rate_limit: IpRateLimit,
}

impl AppState {
    /// Wire the service graph over already-connected storage.
    pub fn new(
        config: AccessConfig,
        storage: Storage,
        blacklist: Arc<dyn TokenBlacklist>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AppError> {
        let hashing = PasswordHashing::new(&config.password).map_err(AppError::ConfigError)?;
        let credentials = CredentialStore::new(storage.users.clone(), hashing);
        let tokens = TokenService::new(JwtService::new(&config.jwt), blacklist);
        let otp = OtpEngine::new(storage.otps.clone(), &config.otp);
        let audit = AuditLog::new(storage.activity.clone());
        let authorization =
            AuthorizationModel::new(storage.users.clone(), storage.groups.clone(), audit.clone());

        let sessions = SessionOrchestrator::new(
            credentials,
            tokens,
            otp,
            authorization,
            audit,
            SessionEvents::new(),
            notifier,
        );

        let limits = &config.rate_limit;
        let login_rate_limit = IpRateLimit::new(
            limits.login_attempts,
            limits.login_window_seconds,
            limits.trust_forwarded_for,
        );
        let otp_rate_limit = IpRateLimit::new(
            limits.otp_attempts,
            limits.otp_window_seconds,
            limits.trust_forwarded_for,
        );

        Ok(Self {
            config,
            sessions,
            storage,
            login_rate_limit,
            otp_rate_limit,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/users/me/activity", get(handlers::recent_activity))
        .route("/users/:id", delete(handlers::delete_account))
        .route("/admins", post(handlers::create_admin).get(handlers::list_admins))
        .route("/admins/:id/roles", patch(handlers::assign_role))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let login_route = Router::new()
        .route("/auth/login", post(handlers::login))
        .layer(from_fn_with_state(
            state.login_rate_limit.clone(),
            ip_rate_limit_middleware,
        ));

    // Issuing and verifying share one budget so a client cannot alternate.
    let otp_routes = Router::new()
        .route("/auth/otp", post(handlers::request_otp))
        .route("/auth/otp/verify", post(handlers::verify_otp))
        .layer(from_fn_with_state(
            state.otp_rate_limit.clone(),
            ip_rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/auth/token/refresh", post(handlers::refresh))
        .route("/users", post(handlers::register))
        .merge(login_route)
        .merge(otp_routes)
        .merge(protected);

    if state.config.environment == Environment::Dev {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    app.with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "A dependency is unavailable", body = ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.sessions.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        e
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "datastore": "up",
            "blacklist": "up"
        }
    })))
}
