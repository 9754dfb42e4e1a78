use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty token")]
    EmptyToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("session not found")]
    SessionNotFound,
    #[error("token revoked or replaced")]
    TokenRevokedOrReplaced,
    #[error("wrong tokens pair")]
    TokenPairMismatch,
    #[error("wrong credentials")]
    WrongCredentials,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("user not found")]
    UserNotFound,
    #[error("failed to hash password: {0}")]
    Hashing(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("persistence failure")]
    Persistence(#[source] BoxError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl Error {
    /// Wrap any storage backend error.
    pub fn persistence<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Persistence(err.into())
    }

    /// Errors caused by the presented credentials rather than by the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Hashing(_) | Self::Signing(_) | Self::Persistence(_) | Self::InvalidConfig(_)
        )
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(Box::new(err))
    }
}
