//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{http, token};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --dsn")?;

    let token_opts = token::Options::parse(matches)?;
    let http_opts = http::Options::parse(matches)?;

    let args = Args {
        port,
        dsn,
        jwt_secret: token_opts.jwt_secret,
        fingerprint_key: token_opts.fingerprint_key,
        access_ttl_seconds: token_opts.access_ttl_seconds,
        refresh_ttl_seconds: token_opts.refresh_ttl_seconds,
        cookie_secure: http_opts.cookie_secure,
        cookie_same_site: http_opts.cookie_same_site,
        cookie_domain: http_opts.cookie_domain,
        allowed_origins: http_opts.allowed_origins,
    };

    // Fail at startup rather than on the first request.
    args.token_config()?;

    Ok(Action::Server(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SameSite;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn clean_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let mut all = vec![
            ("TOKENPAIR_PORT", None),
            ("TOKENPAIR_DSN", Some("postgres://user@localhost:5432/tokenpair")),
            ("TOKENPAIR_JWT_SECRET", Some(SECRET)),
            ("TOKENPAIR_FINGERPRINT_KEY", None),
            ("TOKENPAIR_ACCESS_TTL_SECONDS", None),
            ("TOKENPAIR_REFRESH_TTL_SECONDS", None),
            ("TOKENPAIR_COOKIE_SECURE", None),
            ("TOKENPAIR_COOKIE_SAME_SITE", None),
            ("TOKENPAIR_COOKIE_DOMAIN", None),
            ("TOKENPAIR_ALLOWED_ORIGINS", None),
        ];
        for (key, value) in vars {
            all.retain(|(existing, _)| existing != key);
            all.push((*key, *value));
        }
        temp_env::with_vars(all, f);
    }

    #[test]
    fn defaults_from_env() {
        clean_env(&[], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["tokenpair"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.port, 8080);
                assert_eq!(args.access_ttl_seconds, 3600);
                assert_eq!(args.refresh_ttl_seconds, 86400);
                assert!(!args.cookie_secure);
                assert_eq!(args.cookie_same_site, SameSite::Lax);
                assert!(args.fingerprint_key.is_none());
                assert!(args.allowed_origins.is_empty());
            }
        });
    }

    #[test]
    fn inconsistent_ttls_are_rejected() {
        clean_env(
            &[
                ("TOKENPAIR_ACCESS_TTL_SECONDS", Some("7200")),
                ("TOKENPAIR_REFRESH_TTL_SECONDS", Some("3600")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tokenpair"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("Invalid token configuration"));
                }
            },
        );
    }

    #[test]
    fn short_secret_is_rejected() {
        clean_env(&[("TOKENPAIR_JWT_SECRET", Some("too-short"))], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["tokenpair"]);
            assert!(handler(&matches).is_err());
        });
    }

    #[test]
    fn cookie_and_origin_options() {
        clean_env(
            &[
                ("TOKENPAIR_COOKIE_SAME_SITE", Some("none")),
                ("TOKENPAIR_COOKIE_DOMAIN", Some("example.com")),
                (
                    "TOKENPAIR_ALLOWED_ORIGINS",
                    Some("https://app.example.com, https://admin.example.com"),
                ),
                ("TOKENPAIR_FINGERPRINT_KEY", Some("fingerprint-key")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tokenpair"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.cookie_same_site, SameSite::None);
                    assert_eq!(args.cookie_domain.as_deref(), Some("example.com"));
                    assert_eq!(
                        args.allowed_origins,
                        vec![
                            "https://app.example.com".to_string(),
                            "https://admin.example.com".to_string()
                        ]
                    );
                    assert!(args.fingerprint_key.is_some());
                    assert!(args.cookie_config().secure());
                }
            },
        );
    }
}
