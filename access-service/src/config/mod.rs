use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub password: PasswordConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub smtp: Option<SmtpConfig>,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Where users, OTPs, groups and activity logs live.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub signing_secret: SecretString,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub length: usize,
    pub alphabet: String,
    pub expiry_seconds: i64,
    /// Wrong codes tolerated before a challenge is burned.
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub generated_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
            generated_length: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

/// Per-IP budgets for the credential-guessing endpoints.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub otp_attempts: u32,
    pub otp_window_seconds: u64,
    /// Key on the first `X-Forwarded-For` hop. Only safe behind a proxy that
    /// overwrites the header.
    pub trust_forwarded_for: bool,
}

/// Outbound mail relay for OTP codes and initial admin passwords.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_email: String,
}

/// Superuser seeded at start-up so a fresh deployment has someone able to
/// provision admins.
#[derive(Debug, Clone)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: SecretString,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let storage: StorageBackend = get_env("STORAGE_BACKEND", Some("memory"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let (database, redis) = match storage {
            StorageBackend::Postgres => (
                Some(DatabaseConfig {
                    url: get_env("DATABASE_URL", None, is_prod)?,
                    max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                    min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
                }),
                Some(RedisConfig {
                    url: get_env("REDIS_URL", None, is_prod)?,
                }),
            ),
            StorageBackend::Memory => (None, None),
        };

        let bootstrap_admin = match (
            optional_env("BOOTSTRAP_ADMIN_EMAIL"),
            optional_env("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdminConfig {
                email,
                password: SecretString::new(password),
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
                )))
            }
        };

        let smtp = match optional_env("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", "587", is_prod)?,
                username: get_env("SMTP_USERNAME", None, is_prod)?,
                password: SecretString::new(get_env("SMTP_PASSWORD", None, is_prod)?),
                from_email: get_env("SMTP_FROM", None, is_prod)?,
            }),
            None => None,
        };

        let config = AccessConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("access-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            storage,
            database,
            redis,
            jwt: JwtConfig {
                signing_secret: SecretString::new(get_env("JWT_SIGNING_SECRET", None, is_prod)?),
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
                refresh_token_expiry_days: parse_env("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "7", is_prod)?,
            },
            otp: OtpConfig {
                length: parse_env("OTP_LENGTH", "6", is_prod)?,
                alphabet: get_env("OTP_ALPHABET", Some("0123456789"), is_prod)?,
                expiry_seconds: parse_env("OTP_EXPIRY_SECONDS", "300", is_prod)?,
                max_attempts: parse_env("OTP_MAX_ATTEMPTS", "5", is_prod)?,
            },
            password: {
                let defaults = PasswordConfig::default();
                PasswordConfig {
                    memory_kib: parse_env(
                        "PASSWORD_MEMORY_KIB",
                        &defaults.memory_kib.to_string(),
                        is_prod,
                    )?,
                    iterations: parse_env(
                        "PASSWORD_ITERATIONS",
                        &defaults.iterations.to_string(),
                        is_prod,
                    )?,
                    parallelism: parse_env(
                        "PASSWORD_PARALLELISM",
                        &defaults.parallelism.to_string(),
                        is_prod,
                    )?,
                    generated_length: parse_env(
                        "GENERATED_PASSWORD_LENGTH",
                        &defaults.generated_length.to_string(),
                        is_prod,
                    )?,
                }
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5", is_prod)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "60", is_prod)?,
                otp_attempts: parse_env("RATE_LIMIT_OTP_ATTEMPTS", "10", is_prod)?,
                otp_window_seconds: parse_env("RATE_LIMIT_OTP_WINDOW_SECONDS", "60", is_prod)?,
                trust_forwarded_for: parse_env("RATE_LIMIT_TRUST_FORWARDED_FOR", "false", is_prod)?,
            },
            smtp,
            bootstrap_admin,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("APP__PORT must be greater than 0"));
        }

        if self.jwt.signing_secret.expose_secret().len() < 32 {
            return Err(config_error(
                "JWT_SIGNING_SECRET must be at least 32 bytes long",
            ));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(config_error(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive",
            ));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(config_error("JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"));
        }

        // Access tokens must never outlive the refresh token they were issued with.
        if self.jwt.access_token_expiry_minutes > self.jwt.refresh_token_expiry_days * 24 * 60 {
            return Err(config_error(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must not exceed the refresh token lifetime",
            ));
        }

        if !(4..=12).contains(&self.otp.length) {
            return Err(config_error("OTP_LENGTH must be between 4 and 12"));
        }

        if self.otp.alphabet.chars().count() < 2 {
            return Err(config_error("OTP_ALPHABET must contain at least two symbols"));
        }

        if self.otp.expiry_seconds <= 0 {
            return Err(config_error("OTP_EXPIRY_SECONDS must be positive"));
        }

        if self.otp.max_attempts == 0 {
            return Err(config_error("OTP_MAX_ATTEMPTS must be at least 1"));
        }

        if self.rate_limit.login_attempts == 0 || self.rate_limit.login_window_seconds == 0 {
            return Err(config_error(
                "RATE_LIMIT_LOGIN_ATTEMPTS and RATE_LIMIT_LOGIN_WINDOW_SECONDS must be positive",
            ));
        }

        if self.rate_limit.otp_attempts == 0 || self.rate_limit.otp_window_seconds == 0 {
            return Err(config_error(
                "RATE_LIMIT_OTP_ATTEMPTS and RATE_LIMIT_OTP_WINDOW_SECONDS must be positive",
            ));
        }

        if let Some(smtp) = &self.smtp {
            if smtp.port == 0 || !smtp.from_email.contains('@') {
                return Err(config_error("SMTP_PORT and SMTP_FROM must be valid"));
            }
        }

        if self.password.generated_length < 12 {
            return Err(config_error("GENERATED_PASSWORD_LENGTH must be at least 12"));
        }

        if self.storage == StorageBackend::Postgres
            && (self.database.is_none() || self.redis.is_none())
        {
            return Err(config_error(
                "postgres storage requires DATABASE_URL and REDIS_URL",
            ));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(config_error("Wildcard CORS origin not allowed in production"));
        }

        Ok(())
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otlp_endpoint.as_deref()
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.is_none() {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}
