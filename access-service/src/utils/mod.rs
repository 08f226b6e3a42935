pub mod password;
pub mod phone;
pub mod validation;

pub use password::{Password, PasswordHashString, PasswordHashing};
pub use validation::ValidatedJson;
