use access_service::{
    build_router,
    config::{AccessConfig, Environment, StorageBackend},
    db,
    models::Identifier,
    services::{
        spawn_last_login_tracker, InMemoryBlacklist, LogNotifier, Notifier, RedisBlacklist,
        SmtpNotifier, TokenBlacklist,
    },
    store::{Database, Storage},
    utils::Password,
    AppState,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        storage = ?config.storage,
        "Starting access service"
    );

    if config.environment == Environment::Prod && config.storage == StorageBackend::Memory {
        tracing::error!("In-memory storage selected in production; state is lost on restart");
    }

    let (storage, blacklist) = connect_storage(&config).await?;

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp).map_err(AppError::ConfigError)?),
        None => {
            tracing::warn!("SMTP not configured; OTP codes and admin passwords are only logged as dispatched");
            Arc::new(LogNotifier)
        }
    };

    let state = AppState::new(config.clone(), storage.clone(), blacklist, notifier)?;

    if let Some(bootstrap) = &config.bootstrap_admin {
        let email = Identifier::email(&bootstrap.email).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("BOOTSTRAP_ADMIN_EMAIL: {}", e))
        })?;
        let password = Password::new(bootstrap.password.expose_secret().clone());
        if state
            .sessions
            .credentials()
            .ensure_superuser(&email, &password)
            .await?
        {
            tracing::info!("Bootstrap superuser created");
        }
    }

    let tracker = spawn_last_login_tracker(state.sessions.events(), storage.users.clone());

    let limits = [state.login_rate_limit.clone(), state.otp_rate_limit.clone()];
    let pruner = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            for limit in &limits {
                limit.retain_recent();
            }
        }
    });

    let app = build_router(state);
    let addr = config.common.socket_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracker.abort();
    pruner.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn connect_storage(
    config: &AccessConfig,
) -> Result<(Storage, Arc<dyn TokenBlacklist>), AppError> {
    match (&config.storage, &config.database, &config.redis) {
        (StorageBackend::Postgres, Some(database), Some(redis)) => {
            let pool = db::create_pool(database)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;

            let blacklist = RedisBlacklist::connect(redis)
                .await
                .map_err(AppError::ServiceUnavailable)?;
            tracing::info!("Postgres storage and Redis blacklist initialized");

            Ok((Storage::postgres(Database::new(pool)), Arc::new(blacklist)))
        }
        (StorageBackend::Postgres, _, _) => Err(AppError::ConfigError(anyhow::anyhow!(
            "postgres storage requires DATABASE_URL and REDIS_URL"
        ))),
        (StorageBackend::Memory, _, _) => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            Ok((Storage::memory(), Arc::new(InMemoryBlacklist::new())))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
