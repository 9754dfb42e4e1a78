//! Token lifecycle engine.
//!
//! Issues paired access/refresh tokens, validates them, rotates refresh tokens
//! and revokes sessions.
//!
//! ## Session records
//!
//! Every account has at most one session record: the id of the current access
//! token plus a keyed fingerprint of the current refresh token. The raw refresh
//! token is never stored. Overwriting or deleting that single record revokes the
//! whole pair, so there is no deny-list of historical tokens.
//!
//! - **Login** replaces any previous record, so a second device logs the first
//!   one out.
//! - **Refresh** swaps the record with a compare-and-swap on the stored
//!   fingerprint. When two refreshes race with the same token exactly one wins;
//!   the other fails with [`Error::TokenRevokedOrReplaced`].
//! - **Logout** deletes the record.
//!
//! ## Tokens
//!
//! Both tokens are compact JWS strings signed with `HS512`. Any other `alg` in
//! the header is rejected before the signature is checked.

use std::{future::Future, pin::Pin};

mod clock;
mod error;
mod fingerprint;
mod password;
mod service;
mod session;
mod storage;
mod token;
mod users;

pub use clock::{Clock, SystemClock};
pub use error::{BoxError, Error};
pub use fingerprint::Fingerprinter;
pub use password::{Argon2Hasher, PasswordHasher};
pub use service::{AuthService, IssuedSession, TokenPair};
pub use session::{MemorySessionStore, SessionRecord, SessionStore};
pub use storage::{PgSessionStore, PgUserDirectory, SCHEMA_SQL, apply_schema};
pub use token::{
    AccessClaims, IssuedTokens, RefreshClaims, TokenCodec, TokenConfig, ALGORITHM, MAX_TTL_SECONDS,
};
pub use users::{Account, MemoryUserDirectory, UserDirectory};

/// Boxed future returned by the store traits so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
