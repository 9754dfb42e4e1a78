use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::MAX_TTL_SECONDS;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_FINGERPRINT_KEY: &str = "fingerprint-key";
pub const ARG_ACCESS_TTL_SECONDS: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL_SECONDS: &str = "refresh-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Shared secret used to sign and verify tokens (at least 32 bytes)")
                .env("TOKENPAIR_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_FINGERPRINT_KEY)
                .long(ARG_FINGERPRINT_KEY)
                .help("Key for refresh token fingerprints (default: derived from the JWT secret)")
                .env("TOKENPAIR_FINGERPRINT_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_SECONDS)
                .long(ARG_ACCESS_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("TOKENPAIR_ACCESS_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_SECONDS)
                .long(ARG_REFRESH_TTL_SECONDS)
                .help("Refresh token lifetime in seconds")
                .env("TOKENPAIR_REFRESH_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
}

pub struct Options {
    pub jwt_secret: SecretString,
    pub fingerprint_key: Option<SecretString>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl Options {
    /// # Errors
    ///
    /// Returns an error if the JWT secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --jwt-secret")?;
        let fingerprint_key = matches
            .get_one::<String>(ARG_FINGERPRINT_KEY)
            .filter(|key| !key.is_empty())
            .cloned()
            .map(SecretString::from);

        Ok(Self {
            jwt_secret,
            fingerprint_key,
            access_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
            refresh_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TTL_SECONDS)
                .copied()
                .unwrap_or(86400),
        })
    }
}
