pub mod auth;
pub mod cookie;
pub mod health;
pub mod types;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use tracing::{debug, error};

use self::types::ErrorResponse;
use crate::auth::Error;

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Auth(Error),
    Internal(&'static str),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Auth(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                Error::EmptyToken => StatusCode::BAD_REQUEST,
                Error::UserAlreadyExists => StatusCode::CONFLICT,
                Error::InvalidToken
                | Error::ExpiredToken
                | Error::SessionNotFound
                | Error::TokenRevokedOrReplaced
                | Error::TokenPairMismatch
                | Error::WrongCredentials
                | Error::UserNotFound => StatusCode::UNAUTHORIZED,
                Error::Hashing(_)
                | Error::Signing(_)
                | Error::Persistence(_)
                | Error::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(message) => message,
            Self::Internal(reason) => {
                error!("request failed: {reason}");
                "internal server error".to_string()
            }
            // Unknown user and bad password look the same to the caller.
            Self::Auth(Error::UserNotFound) => Error::WrongCredentials.to_string(),
            Self::Auth(err) if status.is_server_error() => {
                error!(error = %err, "request failed");
                "internal server error".to_string()
            }
            Self::Auth(err) => {
                debug!(error = %err, "request rejected");
                err.to_string()
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Reject blank credentials before they reach the service.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] naming the offending field.
pub fn require_credentials(username: &str, password: &str) -> Result<(), ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }
    if password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    Ok(())
}
