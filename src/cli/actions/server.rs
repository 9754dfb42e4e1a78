use crate::{
    api::{self, CookieConfig, SameSite},
    auth::{Fingerprinter, TokenConfig},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub jwt_secret: SecretString,
    pub fingerprint_key: Option<SecretString>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub cookie_domain: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &"***")
            .field("jwt_secret", &"***")
            .field("fingerprint_key", &self.fingerprint_key.as_ref().map(|_| "***"))
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("cookie_domain", &self.cookie_domain)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl Args {
    /// Token settings, checked before anything touches the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is too short or the lifetimes are
    /// inconsistent.
    pub fn token_config(&self) -> Result<TokenConfig> {
        let config = TokenConfig::new(self.jwt_secret.clone())
            .with_access_ttl_seconds(self.access_ttl_seconds)
            .with_refresh_ttl_seconds(self.refresh_ttl_seconds);
        config.validate().context("Invalid token configuration")?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the key has to be derived from an empty secret.
    pub fn fingerprinter(&self) -> Result<Fingerprinter> {
        match &self.fingerprint_key {
            Some(key) => Ok(Fingerprinter::new(key.clone())),
            None => Fingerprinter::derive_from(&self.jwt_secret)
                .context("Could not derive fingerprint key"),
        }
    }

    #[must_use]
    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig::new()
            .with_secure(self.cookie_secure)
            .with_same_site(self.cookie_same_site)
            .with_domain(self.cookie_domain.clone())
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let token_config = args.token_config()?;
    let fingerprinter = args.fingerprinter()?;
    let cookies = args.cookie_config();

    let allowed_origins = args
        .allowed_origins
        .iter()
        .map(|origin| api::parse_origin(origin))
        .collect::<Result<Vec<_>>>()?;

    let dsn = Url::parse(args.dsn.expose_secret()).context("Invalid database DSN")?;

    api::new(
        args.port,
        dsn.to_string(),
        token_config,
        fingerprinter,
        cookies,
        allowed_origins,
    )
    .await
}
