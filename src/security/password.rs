//! Password hashing for SSH auto-registration's random password and any
//! future password-auth transport, via `argon2`'s recommended high-level API.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{ErrorCode, HandlerError, HandlerResult};

pub fn hash_password(plaintext: &str) -> HandlerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HandlerError::Internal(format!("hashing password: {e}")))
}

pub fn verify_password(plaintext: &str, stored_hash: &str) -> HandlerResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| HandlerError::Internal(format!("parsing password hash: {e}")))?;
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(HandlerError::new(
            ErrorCode::InvalidCredentials,
            format!("verifying password: {e}"),
        )),
    }
}

/// A cryptographically random password for SSH auto-registered accounts:
/// they authenticate by key, never by typing this back in.
pub fn random_password() -> String {
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn random_password_is_unique_and_long_enough() {
        assert_ne!(random_password(), random_password());
        assert_eq!(random_password().len(), 32);
    }
}
