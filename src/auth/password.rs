use argon2::{Argon2, PasswordHasher as _, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use rand::{rngs::OsRng, RngCore};

use super::error::Error;

/// Opaque password hashing capability.
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Hashing`] if the digest cannot be produced.
    fn hash(&self, plaintext: &str) -> Result<String, Error>;

    fn verify(&self, digest: &str, plaintext: &str) -> bool;
}

/// Argon2id with the crate defaults, digests stored as PHC strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, Error> {
        let mut salt_bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| Error::Hashing(err.to_string()))?;
        let salt =
            SaltString::encode_b64(&salt_bytes).map_err(|err| Error::Hashing(err.to_string()))?;

        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|err| Error::Hashing(err.to_string()))
    }

    fn verify(&self, digest: &str, plaintext: &str) -> bool {
        PasswordHash::new(digest).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
        })
    }
}
