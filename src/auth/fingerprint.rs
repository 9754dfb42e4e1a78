//! Keyed fingerprints of refresh tokens.
//!
//! Only the fingerprint is persisted. It is an HMAC-SHA256 over the raw token
//! bytes, so a leaked session table cannot be used to recompute or confirm
//! tokens without the key.

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::error::Error;

type HmacSha256 = Hmac<Sha256>;

const DERIVATION_LABEL: &[u8] = b"tokenpair/refresh-fingerprint/v1";

#[derive(Clone, Debug)]
pub struct Fingerprinter {
    key: SecretString,
}

impl Fingerprinter {
    #[must_use]
    pub fn new(key: SecretString) -> Self {
        Self { key }
    }

    /// Derive a fingerprint key from the token signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the secret is empty.
    pub fn derive_from(signing_secret: &SecretString) -> Result<Self, Error> {
        if signing_secret.expose_secret().is_empty() {
            return Err(Error::InvalidConfig("signing secret must not be empty"));
        }
        let mut mac = HmacSha256::new_from_slice(signing_secret.expose_secret().as_bytes())
            .map_err(|_| Error::InvalidConfig("invalid signing secret"))?;
        mac.update(DERIVATION_LABEL);
        let derived = Base64::encode_string(&mac.finalize().into_bytes());
        Ok(Self::new(SecretString::from(derived)))
    }

    /// Deterministic one-way digest of a raw refresh token.
    #[must_use]
    pub fn fingerprint(&self, refresh_token: &str) -> Vec<u8> {
        // HMAC accepts keys of any length, so this never fails.
        let Ok(mut mac) = HmacSha256::new_from_slice(self.key.expose_secret().as_bytes()) else {
            return Vec::new();
        };
        mac.update(refresh_token.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Compare a presented token against a stored fingerprint in constant time.
    #[must_use]
    pub fn matches(&self, refresh_token: &str, stored: &[u8]) -> bool {
        let computed = self.fingerprint(refresh_token);
        !computed.is_empty() && bool::from(computed.as_slice().ct_eq(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprinter() -> Fingerprinter {
        Fingerprinter::new(SecretString::from("fingerprint-key".to_string()))
    }

    #[test]
    fn fingerprint_is_stable() {
        let fp = fingerprinter();
        let first = fp.fingerprint("token");
        let second = fp.fingerprint("token");
        let different = fp.fingerprint("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn fingerprint_depends_on_key() {
        let other = Fingerprinter::new(SecretString::from("another-key".to_string()));
        assert_ne!(
            fingerprinter().fingerprint("token"),
            other.fingerprint("token")
        );
    }

    #[test]
    fn matches_only_same_token() {
        let fp = fingerprinter();
        let stored = fp.fingerprint("token");
        assert!(fp.matches("token", &stored));
        assert!(!fp.matches("token2", &stored));
        assert!(!fp.matches("token", &stored[..16]));
    }

    #[test]
    fn derived_key_differs_from_secret() -> Result<(), Error> {
        let secret = SecretString::from("fingerprint-key".to_string());
        let derived = Fingerprinter::derive_from(&secret)?;
        assert_ne!(
            derived.fingerprint("token"),
            fingerprinter().fingerprint("token")
        );
        assert!(Fingerprinter::derive_from(&SecretString::from(String::new())).is_err());
        Ok(())
    }
}
