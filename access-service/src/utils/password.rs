use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{distributions::Alphanumeric, Rng};
use std::fmt;

use crate::config::PasswordConfig;

/// Plaintext password. Debug output is redacted.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// PHC-formatted Argon2 hash.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Argon2id hashing with configurable cost parameters.
#[derive(Clone)]
pub struct PasswordHashing {
    argon2: Argon2<'static>,
    generated_length: usize,
    // Verified against when no account matches, so a miss costs the same as a hit.
    dummy_hash: PasswordHashString,
}

impl PasswordHashing {
    pub fn new(config: &PasswordConfig) -> Result<Self, anyhow::Error> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hashing = Self {
            argon2,
            generated_length: config.generated_length,
            dummy_hash: PasswordHashString::new(String::new()),
        };
        let filler = hashing.generate();
        hashing.dummy_hash = hashing.hash(&filler)?;
        Ok(hashing)
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    /// Constant-time verification. A malformed stored hash never matches.
    pub fn verify(&self, password: &Password, password_hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(password_hash) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Spend the same effort as a real verification and discard the result.
    pub fn verify_dummy(&self, password: &Password) {
        let _ = self.verify(password, self.dummy_hash.as_str());
    }

    /// Random alphanumeric password for system-provisioned accounts.
    pub fn generate(&self) -> Password {
        let password: String = rand::rngs::OsRng
            .sample_iter(&Alphanumeric)
            .take(self.generated_length)
            .map(char::from)
            .collect();
        Password::new(password)
    }
}
