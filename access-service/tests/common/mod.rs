//! Shared setup for access-service integration tests: an in-memory app, a
//! notifier that captures dispatched secrets, seeding helpers and a request
//! helper driving the real router through `oneshot`.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{
        AccessConfig, Environment, JwtConfig, OtpConfig, PasswordConfig, RateLimitConfig,
        SecurityConfig, StorageBackend,
    },
    models::{Group, Identifier, NewUser, Permission, Role, User, VendorStatus},
    services::{InMemoryBlacklist, Notifier, OtpChallenge},
    store::{ActivityLogStore, GroupStore, Storage, UserStore},
    utils::{Password, PasswordHashing},
    AppState,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "access-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        storage: StorageBackend::Memory,
        database: None,
        redis: None,
        jwt: JwtConfig {
            signing_secret: SecretString::new("integration-test-signing-secret-0123456789".to_string()),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        otp: OtpConfig {
            length: 8,
            alphabet: "0123456789".to_string(),
            expiry_seconds: 300,
            max_attempts: 5,
        },
        password: PasswordConfig {
            memory_kib: 4096,
            iterations: 1,
            parallelism: 1,
            generated_length: 16,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        // Budgets high enough that only the rate limit tests hit them.
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            otp_attempts: 1000,
            otp_window_seconds: 60,
            trust_forwarded_for: false,
        },
        smtp: None,
        bootstrap_admin: None,
    }
}

/// Keeps every secret handed to the notifier so tests can play the part of
/// the recipient.
#[derive(Default)]
pub struct CapturingNotifier {
    otps: Mutex<Vec<OtpChallenge>>,
    passwords: Mutex<Vec<(Uuid, String)>>,
}

impl CapturingNotifier {
    pub fn last_otp(&self) -> Option<String> {
        self.otps.lock().unwrap().last().map(|c| c.code.clone())
    }

    pub fn initial_password_for(&self, user_id: Uuid) -> Option<String> {
        self.passwords
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| *id == user_id)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send_otp(&self, challenge: &OtpChallenge) -> Result<(), anyhow::Error> {
        self.otps.lock().unwrap().push(challenge.clone());
        Ok(())
    }

    async fn send_initial_password(
        &self,
        user: &User,
        password: &Password,
    ) -> Result<(), anyhow::Error> {
        self.passwords
            .lock()
            .unwrap()
            .push((user.user_id, password.as_str().to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: Storage,
    pub notifier: Arc<CapturingNotifier>,
    hashing: PasswordHashing,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AccessConfig) -> Self {
        let storage = Storage::memory();
        let notifier = Arc::new(CapturingNotifier::default());
        let state = AppState::new(
            config.clone(),
            storage.clone(),
            Arc::new(InMemoryBlacklist::new()),
            notifier.clone(),
        )
        .expect("test state");
        let hashing = PasswordHashing::new(&config.password).expect("test hashing");

        Self {
            // Every request appears to come from the same client.
            router: build_router(state.clone())
                .layer(axum::Extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))),
            state,
            storage,
            notifier,
            hashing,
        }
    }

    /// Insert an account directly, bypassing registration.
    pub async fn seed_user(&self, email: &str, role: Role, active: bool) -> User {
        let mut user = User::new(NewUser {
            email: Some(email.to_string()),
            phone: None,
            password_hash: self
                .hashing
                .hash(&Password::new(TEST_PASSWORD.to_string()))
                .unwrap()
                .into_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
        });
        user.is_active = active;
        self.storage.users.insert_user(&user).await.unwrap();
        user
    }

    pub async fn seed_vendor(&self, email: &str, status: VendorStatus) -> User {
        let mut user = User::new(NewUser {
            email: Some(email.to_string()),
            phone: None,
            password_hash: self
                .hashing
                .hash(&Password::new(TEST_PASSWORD.to_string()))
                .unwrap()
                .into_string(),
            first_name: "Vendor".to_string(),
            last_name: "Co".to_string(),
            role: Role::Vendor,
        });
        user.is_active = true;
        user.vendor_status = Some(status);
        self.storage.users.insert_user(&user).await.unwrap();
        user
    }

    /// An active admin holding `permissions` through a fresh group, with
    /// access to `modules`.
    pub async fn seed_admin(&self, email: &str, permissions: &[&str], modules: &[&str]) -> User {
        let mut user = User::new(NewUser {
            email: Some(email.to_string()),
            phone: None,
            password_hash: self
                .hashing
                .hash(&Password::new(TEST_PASSWORD.to_string()))
                .unwrap()
                .into_string(),
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
            role: Role::Admin,
        });
        user.is_active = true;
        user.module_access = modules.iter().map(|m| m.to_string()).collect();
        self.storage.users.insert_user(&user).await.unwrap();

        if !permissions.is_empty() {
            let group = self.seed_group(&format!("group-{}", Uuid::new_v4()), permissions).await;
            self.storage
                .groups
                .add_user_groups(user.user_id, &[group.group_id])
                .await
                .unwrap();
        }
        user
    }

    pub async fn seed_superuser(&self, email: &str) -> User {
        let ident = Identifier::email(email).unwrap();
        self.state
            .sessions
            .credentials()
            .ensure_superuser(&ident, &Password::new(TEST_PASSWORD.to_string()))
            .await
            .unwrap();
        self.storage
            .users
            .find_user_by_identifier(&ident)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn seed_group(&self, name: &str, permissions: &[&str]) -> Group {
        let mut ids = Vec::new();
        for codename in permissions {
            let permission = Permission::new(*codename, format!("Can {}", codename));
            self.storage.groups.insert_permission(&permission).await.unwrap();
            ids.push(permission.permission_id);
        }
        let group = Group::new(name, ids);
        self.storage.groups.insert_group(&group).await.unwrap();
        group
    }

    pub async fn activity_of(&self, user_id: Uuid) -> Vec<String> {
        self.storage
            .activity
            .recent_activity(user_id, 50)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, bearer, Some(body)).await
    }

    /// Log in by email and return `(access, refresh)`.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/auth/login",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (
            body["data"]["access"].as_str().unwrap().to_string(),
            body["data"]["refresh"].as_str().unwrap().to_string(),
        )
    }
}
