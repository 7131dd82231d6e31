pub mod credentials;
pub mod password;

pub use credentials::{Credential, CredentialStore, validate_username};
pub use password::PasswordHasher;
