//! Signing and parsing of access/refresh tokens.
//!
//! Tokens are compact JWS strings (`header.claims.signature`, base64url without
//! padding). Only [`ALGORITHM`] is accepted; the header is checked before the
//! MAC is computed so a token can never pick its own verification method.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha512;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{clock::Clock, error::Error};

pub const ALGORITHM: &str = "HS512";
const TOKEN_TYPE: &str = "JWT";
const MIN_SECRET_LEN: usize = 32;
const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 24 * 60 * 60;
/// Ten years.
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs512() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    pub sub: String,
    /// `jti` of the access token minted together with this refresh token.
    pub access_token_id: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

trait Expiring {
    fn expires_at(&self) -> i64;
}

impl Expiring for AccessClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl Expiring for RefreshClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Output of [`TokenCodec::generate`].
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_token_id: String,
    pub refresh_token: String,
    pub refresh_expires_at: i64,
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    /// Check the lifetimes and the secret length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the secret is shorter than 32 bytes,
    /// the access lifetime is not positive, the refresh lifetime does not
    /// exceed the access lifetime, or either is above [`MAX_TTL_SECONDS`].
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(Error::InvalidConfig(
                "signing secret must be at least 32 bytes",
            ));
        }
        if self.access_ttl_seconds <= 0 {
            return Err(Error::InvalidConfig("access token ttl must be positive"));
        }
        if self.refresh_ttl_seconds <= self.access_ttl_seconds {
            return Err(Error::InvalidConfig(
                "refresh token ttl must exceed access token ttl",
            ));
        }
        if self.refresh_ttl_seconds > MAX_TTL_SECONDS {
            return Err(Error::InvalidConfig("token ttl must not exceed ten years"));
        }
        Ok(())
    }
}

pub struct TokenCodec {
    config: TokenConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config, clock })
    }

    /// Mint a fresh access/refresh pair for `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if either token cannot be produced. No
    /// unsigned token is ever returned.
    #[instrument(skip(self))]
    pub fn generate(&self, subject: &str) -> Result<IssuedTokens, Error> {
        let now = self.clock.now();
        let expires_at = |ttl: i64| {
            now.checked_add(ttl)
                .ok_or_else(|| Error::Signing("token expiry out of range".to_string()))
        };

        let access = AccessClaims {
            sub: subject.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: expires_at(self.config.access_ttl_seconds)?,
        };
        let refresh = RefreshClaims {
            sub: subject.to_string(),
            access_token_id: access.jti.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: expires_at(self.config.refresh_ttl_seconds)?,
        };

        let access_token = self.sign(&access)?;
        let refresh_token = self.sign(&refresh)?;

        Ok(IssuedTokens {
            access_token,
            access_token_id: access.jti,
            refresh_token,
            refresh_expires_at: refresh.exp,
        })
    }

    /// # Errors
    ///
    /// [`Error::EmptyToken`], [`Error::InvalidToken`] or [`Error::ExpiredToken`].
    pub fn parse_access_token(&self, token: &str) -> Result<AccessClaims, Error> {
        self.parse(token)
    }

    /// # Errors
    ///
    /// [`Error::EmptyToken`], [`Error::InvalidToken`] or [`Error::ExpiredToken`].
    pub fn parse_refresh_token(&self, token: &str) -> Result<RefreshClaims, Error> {
        self.parse(token)
    }

    /// Unix time at which the current clock reads.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, Error> {
        let header_b64 = b64e_json(&TokenHeader::hs512())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac().map_err(|err| Error::Signing(err.to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    fn parse<T>(&self, token: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + Expiring,
    {
        if token.is_empty() {
            return Err(Error::EmptyToken);
        }

        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::InvalidToken)?;
        let claims_b64 = parts.next().ok_or(Error::InvalidToken)?;
        let signature_b64 = parts.next().ok_or(Error::InvalidToken)?;
        if parts.next().is_some() {
            return Err(Error::InvalidToken);
        }

        self.verify(header_b64, claims_b64, signature_b64)?;

        let claims: T = b64d_json(claims_b64)?;
        if claims.expires_at() < self.clock.now() {
            return Err(Error::ExpiredToken);
        }

        Ok(claims)
    }

    fn verify(&self, header_b64: &str, claims_b64: &str, signature_b64: &str) -> Result<(), Error> {
        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALGORITHM {
            debug!(alg = %header.alg, "rejected token signed with disallowed algorithm");
            return Err(Error::InvalidToken);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| Error::InvalidToken)?;
        let mut mac = self.mac().map_err(|_| Error::InvalidToken)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature).map_err(|_| Error::InvalidToken)
    }

    fn mac(&self) -> Result<HmacSha512, hmac::digest::InvalidLength> {
        HmacSha512::new_from_slice(self.config.secret.expose_secret().as_bytes())
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value).map_err(|err| Error::Signing(err.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: DeserializeOwned>(segment: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| Error::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| Error::InvalidToken)
}
