//! Argon2id password hashing
//!
//! Hashes are PHC strings with a per-password random salt. Hashing is CPU
//! bound, so the async helpers move it onto the blocking pool.

use crate::utils::{Result, ScamWatchError};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom work factors (memory in KiB, iterations, lanes)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| ScamWatchError::config(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    /// Smallest work factors Argon2 accepts. Only meant for tests.
    pub fn minimal() -> Self {
        let params = Params::new(
            Params::MIN_M_COST,
            Params::MIN_T_COST,
            Params::MIN_P_COST,
            None,
        )
        .unwrap_or_default();
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| hashing_failed("Failed to hash password", e))?;
        Ok(hash.to_string())
    }

    /// True iff `password` matches `hash`. A malformed hash never matches.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                false
            }
        }
    }

    pub async fn hash_blocking(&self, password: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| hashing_failed("Hashing task failed", e))?
    }

    pub async fn verify_blocking(&self, password: String, hash: String) -> bool {
        let hasher = self.clone();
        match tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}

/// Hashing failures are runtime faults, not bad configuration.
fn hashing_failed(context: &str, err: impl std::fmt::Display) -> ScamWatchError {
    ScamWatchError::internal(format!("{}: {}", context, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::minimal();
        let hash = hasher.hash("pw1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("pw1"));
        assert!(hasher.verify("pw1", &hash));
        assert!(!hasher.verify("pw2", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let hasher = PasswordHasher::minimal();
        let a = hasher.hash("secret").unwrap();
        let b = hasher.hash("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        let hasher = PasswordHasher::minimal();
        assert!(!hasher.verify("pw", "not-a-phc-string"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(PasswordHasher::with_params(0, 0, 0).is_err());
    }

    #[test]
    fn test_hashing_failure_is_internal() {
        let err = hashing_failed("Failed to hash password", "salt too short");
        assert!(matches!(err, ScamWatchError::Internal { .. }));
        assert!(err.to_string().contains("salt too short"));
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hasher = PasswordHasher::minimal();
        let hash = hasher.hash_blocking("pw".to_string()).await.unwrap();
        assert!(hasher.verify_blocking("pw".to_string(), hash).await);
    }
}
