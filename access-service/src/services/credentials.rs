use std::sync::Arc;
use uuid::Uuid;

use super::ServiceError;
use crate::models::{Identifier, NewUser, Role, User};
use crate::store::{StoreError, UserStore};
use crate::utils::{Password, PasswordHashing};

/// Self-registration input. Exactly one role of user or vendor.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: Option<Identifier>,
    pub phone: Option<Identifier>,
    pub first_name: String,
    pub last_name: String,
    pub password: Password,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct AdminFields {
    pub email: Identifier,
    pub phone: Option<Identifier>,
    pub first_name: String,
    pub last_name: String,
    pub module_access: Vec<String>,
}

/// A provisioned admin and the password generated for them. The password is
/// for out-of-band delivery only.
#[derive(Debug)]
pub struct ProvisionedAdmin {
    pub user: User,
    pub initial_password: Password,
}

/// User records and password checks.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    hashing: PasswordHashing,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>, hashing: PasswordHashing) -> Self {
        Self { users, hashing }
    }

    /// Resolve a live account and check its password.
    ///
    /// Any mismatch yields `None`; an unknown identifier costs the same hash
    /// verification as a wrong password. Inactive accounts still resolve so the
    /// caller can report the activation state.
    pub async fn authenticate(
        &self,
        identifier: &Identifier,
        password: &Password,
    ) -> Result<Option<User>, ServiceError> {
        match self.users.find_user_by_identifier(identifier).await? {
            Some(user) if self.verify_password(&user, password) => Ok(Some(user)),
            Some(_) => Ok(None),
            None => {
                self.hashing.verify_dummy(password);
                Ok(None)
            }
        }
    }

    pub fn verify_password(&self, user: &User, password: &Password) -> bool {
        self.hashing.verify(password, &user.password_hash)
    }

    pub async fn list_admins(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.users.list_admins().await?)
    }

    pub async fn find_live(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.users.find_user_by_id(user_id).await?)
    }

    pub async fn soft_delete(&self, user: &User) -> Result<(), ServiceError> {
        if !self.users.soft_delete_user(user.user_id).await? {
            return Err(ServiceError::NotFound("user not found".to_string()));
        }
        Ok(())
    }

    /// Activate the live, inactive account registered under `identifier`.
    /// Returns whether anything changed.
    pub async fn activate(&self, identifier: &Identifier) -> Result<bool, ServiceError> {
        match self.users.find_user_by_identifier(identifier).await? {
            Some(user) if !user.is_active => {
                Ok(self.users.set_user_active(user.user_id, true).await?)
            }
            _ => Ok(false),
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<User, ServiceError> {
        if registration.role == Role::Admin {
            return Err(ServiceError::Validation(
                "role must be user or vendor".to_string(),
            ));
        }
        if registration.email.is_none() && registration.phone.is_none() {
            return Err(ServiceError::Validation(
                "must supply email or phone".to_string(),
            ));
        }
        for identifier in [&registration.email, &registration.phone]
            .into_iter()
            .flatten()
        {
            self.ensure_available(identifier).await?;
        }

        let password_hash = self.hashing.hash(&registration.password)?.into_string();
        let user = User::new(NewUser {
            email: registration.email.map(|i| i.value().to_string()),
            phone: registration.phone.map(|i| i.value().to_string()),
            password_hash,
            first_name: registration.first_name,
            last_name: registration.last_name,
            role: registration.role,
        });

        self.insert(&user).await?;
        tracing::info!(user_id = %user.user_id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Create an active admin with a generated password. Provisioned admins are
    /// never superusers. A taken email or phone is a validation failure here,
    /// unlike self-registration.
    pub async fn provision_admin(
        &self,
        fields: AdminFields,
    ) -> Result<ProvisionedAdmin, ServiceError> {
        if fields.first_name.trim().is_empty() || fields.last_name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "first_name and last_name are required".to_string(),
            ));
        }
        self.ensure_available(&fields.email)
            .await
            .map_err(conflict_as_validation)?;
        if let Some(phone) = &fields.phone {
            self.ensure_available(phone)
                .await
                .map_err(conflict_as_validation)?;
        }

        let initial_password = self.hashing.generate();
        let password_hash = self.hashing.hash(&initial_password)?.into_string();

        let mut user = User::new(NewUser {
            email: Some(fields.email.value().to_string()),
            phone: fields.phone.map(|i| i.value().to_string()),
            password_hash,
            first_name: fields.first_name,
            last_name: fields.last_name,
            role: Role::Admin,
        });
        user.is_active = true;
        user.is_admin = true;
        user.is_superuser = false;
        user.module_access = fields.module_access;

        self.insert(&user).await.map_err(conflict_as_validation)?;
        tracing::info!(user_id = %user.user_id, "Admin provisioned");
        Ok(ProvisionedAdmin {
            user,
            initial_password,
        })
    }

    /// Seed a superuser unless an account already holds `email`. Returns
    /// whether one was created.
    pub async fn ensure_superuser(
        &self,
        email: &Identifier,
        password: &Password,
    ) -> Result<bool, ServiceError> {
        if self.users.find_user_by_identifier(email).await?.is_some() {
            return Ok(false);
        }

        let mut user = User::new(NewUser {
            email: Some(email.value().to_string()),
            phone: None,
            password_hash: self.hashing.hash(password)?.into_string(),
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
            role: Role::Admin,
        });
        user.is_active = true;
        user.is_superuser = true;

        match self.insert(&user).await {
            Ok(()) => Ok(true),
            // Another instance seeded it first.
            Err(ServiceError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(self.users.health_check().await?)
    }

    async fn ensure_available(&self, identifier: &Identifier) -> Result<(), ServiceError> {
        if self.users.find_user_by_identifier(identifier).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "{} already registered",
                identifier.kind()
            )));
        }
        Ok(())
    }

    async fn insert(&self, user: &User) -> Result<(), ServiceError> {
        match self.users.insert_user(user).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(_)) => Err(ServiceError::Conflict(
                "account already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

fn conflict_as_validation(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Conflict(message) => ServiceError::Validation(message),
        other => other,
    }
}
