use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::api::SameSite;

pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_COOKIE_SAME_SITE: &str = "cookie-same-site";
pub const ARG_COOKIE_DOMAIN: &str = "cookie-domain";
pub const ARG_ALLOWED_ORIGINS: &str = "allowed-origins";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the refresh token cookie Secure (HTTPS only)")
                .env("TOKENPAIR_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_COOKIE_SAME_SITE)
                .long(ARG_COOKIE_SAME_SITE)
                .help("SameSite attribute of the refresh token cookie")
                .env("TOKENPAIR_COOKIE_SAME_SITE")
                .default_value("lax")
                .value_parser(["none", "lax", "strict"]),
        )
        .arg(
            Arg::new(ARG_COOKIE_DOMAIN)
                .long(ARG_COOKIE_DOMAIN)
                .help("Domain attribute of the refresh token cookie")
                .env("TOKENPAIR_COOKIE_DOMAIN"),
        )
        .arg(
            Arg::new(ARG_ALLOWED_ORIGINS)
                .long(ARG_ALLOWED_ORIGINS)
                .help("Comma separated origins allowed to call the API with credentials")
                .env("TOKENPAIR_ALLOWED_ORIGINS")
                .value_delimiter(','),
        )
}

pub struct Options {
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub cookie_domain: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl Options {
    /// # Errors
    ///
    /// Returns an error if the SameSite value is not recognized.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let cookie_same_site = matches
            .get_one::<String>(ARG_COOKIE_SAME_SITE)
            .map_or(Ok(SameSite::default()), |value| value.parse())
            .map_err(|err: String| anyhow!(err))?;

        Ok(Self {
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            cookie_same_site,
            cookie_domain: matches.get_one::<String>(ARG_COOKIE_DOMAIN).cloned(),
            allowed_origins: matches
                .get_many::<String>(ARG_ALLOWED_ORIGINS)
                .map(|origins| {
                    origins
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}
