use sqlx::PgPool;
use std::{fmt, str::FromStr};

use crate::auth::AuthService;

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    None,
    #[default]
    Lax,
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::None => "None",
            Self::Lax => "Lax",
            Self::Strict => "Strict",
        };
        f.write_str(value)
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("invalid SameSite value: {value}")),
        }
    }
}

/// Attributes of the refresh token cookie.
#[derive(Clone, Debug, Default)]
pub struct CookieConfig {
    secure: bool,
    same_site: SameSite,
    domain: Option<String>,
}

impl CookieConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain.filter(|domain| !domain.is_empty());
        self
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        // Browsers drop SameSite=None cookies that are not Secure.
        self.secure || self.same_site == SameSite::None
    }

    #[must_use]
    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    auth: AuthService,
    cookies: CookieConfig,
    pool: Option<PgPool>,
}

impl AppState {
    #[must_use]
    pub fn new(auth: AuthService, cookies: CookieConfig) -> Self {
        Self {
            auth,
            cookies,
            pool: None,
        }
    }

    /// Attach the pool the health endpoint pings.
    #[must_use]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieConfig {
        &self.cookies
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}
