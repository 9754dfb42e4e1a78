//! # tokenpair
//!
//! Issues paired access and refresh tokens, validates them, rotates refresh
//! tokens and revokes sessions.
//!
//! ## Session model
//!
//! Each account has at most one active session. The session record holds the
//! id of the current access token and a keyed fingerprint of the current
//! refresh token, never the raw token. A refresh is accepted only when the
//! presented token matches the stored fingerprint and is bound to the stored
//! access token id; the record is then swapped so the old pair stops working.
//!
//! - **Login** replaces the previous session.
//! - **Refresh** rotates both tokens; reusing a refresh token fails.
//! - **Logout** deletes the session record.
//!
//! ## Layout
//!
//! - [`auth`]: token codec, session and user stores, the [`auth::AuthService`].
//! - [`api`]: axum routes under `/api/v1`, refresh token cookie, `OpenAPI` docs.
//! - [`cli`]: argument parsing, telemetry and the server action.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
