use argon2::{
    Argon2, PasswordHash,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use std::sync::Arc;

/// Outcome of checking a password against the configured hash.
///
/// A hash mismatch and a verifier failure both come back as `Rejected` so the
/// caller cannot answer them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    Authenticated,
    Rejected,
}

/// Holds the shared upload secret as an Argon2 PHC string.
#[derive(Clone)]
pub struct PasswordAuthenticator {
    password_hash: Arc<str>,
}

impl std::fmt::Debug for PasswordAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthenticator").finish_non_exhaustive()
    }
}

impl PasswordAuthenticator {
    pub fn new(password_hash: &str) -> Self {
        Self {
            password_hash: Arc::from(password_hash),
        }
    }

    /// Runs the full Argon2 verification. Blocks for as long as the hash
    /// parameters demand; call it off the async executor.
    pub fn verify(&self, password: &str) -> Authentication {
        let parsed_hash = match PasswordHash::new(&self.password_hash) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!("Stored password hash could not be parsed: {}", e);
                return Authentication::Rejected;
            }
        };

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Authentication::Authenticated,
            Err(argon2::password_hash::Error::Password) => Authentication::Rejected,
            Err(e) => {
                tracing::error!("Password verification failed internally: {}", e);
                Authentication::Rejected
            }
        }
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(&self, password: String) -> Authentication {
        let authenticator = self.clone();
        tokio::task::spawn_blocking(move || authenticator.verify(&password))
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Password verification task failed: {}", e);
                Authentication::Rejected
            })
    }
}

/// Hashes `password` with Argon2id default parameters into a PHC string
/// suitable for `PASSWORD_HASH`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}
