//! Register, login, refresh, validate and logout.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    error::Error,
    fingerprint::Fingerprinter,
    password::PasswordHasher,
    session::{SessionRecord, SessionStore},
    token::{AccessClaims, IssuedTokens, TokenCodec},
    users::{Account, UserDirectory},
};

/// Raw tokens handed back to the transport layer.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds; used for the refresh cookie lifetime.
    pub refresh_expires_at: i64,
}

impl From<IssuedTokens> for TokenPair {
    fn from(issued: IssuedTokens) -> Self {
        Self {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            refresh_expires_at: issued.refresh_expires_at,
        }
    }
}

/// Result of register and login.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub account_id: String,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<TokenCodec>,
    fingerprinter: Fingerprinter,
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: TokenCodec,
        fingerprinter: Fingerprinter,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            codec: Arc::new(codec),
            fingerprinter,
        }
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create an account and open its first session.
    ///
    /// # Errors
    ///
    /// [`Error::UserAlreadyExists`], [`Error::Hashing`], [`Error::Persistence`]
    /// or [`Error::Signing`].
    #[instrument(skip(self, password, email))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
    ) -> Result<IssuedSession, Error> {
        match self.users.find_by_username(username).await {
            Ok(_) => return Err(Error::UserAlreadyExists),
            Err(Error::UserNotFound) => {}
            Err(err) => return Err(err),
        }

        let password_digest = self.hash_password(password).await?;
        let account = Account {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_digest,
            email,
        };
        self.users.create(&account).await?;
        info!(account_id = %account.id, "user registered");

        let tokens = self.issue_and_store(&account.id).await?;

        Ok(IssuedSession {
            account_id: account.id,
            tokens,
        })
    }

    /// Check credentials and replace any existing session.
    ///
    /// # Errors
    ///
    /// [`Error::UserNotFound`], [`Error::WrongCredentials`],
    /// [`Error::Persistence`] or [`Error::Signing`].
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession, Error> {
        let account = self.users.find_by_username(username).await?;

        if !self
            .verify_password(account.password_digest.clone(), password)
            .await?
        {
            return Err(Error::WrongCredentials);
        }

        // Single active session: whatever another device holds dies here.
        self.sessions.delete(&account.id).await?;

        let tokens = self.issue_and_store(&account.id).await?;
        info!(account_id = %account.id, "user logged in");

        Ok(IssuedSession {
            account_id: account.id,
            tokens,
        })
    }

    /// Exchange a refresh token for a brand-new pair. The presented token is
    /// unusable afterwards.
    ///
    /// # Errors
    ///
    /// Token parse errors, [`Error::SessionNotFound`],
    /// [`Error::TokenRevokedOrReplaced`] (also returned to the loser of a
    /// concurrent refresh), [`Error::TokenPairMismatch`], [`Error::Persistence`]
    /// or [`Error::Signing`].
    #[instrument(skip_all)]
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let claims = self.codec.parse_refresh_token(refresh_token)?;
        let stored = self.sessions.read(&claims.sub).await?;

        if !self
            .fingerprinter
            .matches(refresh_token, &stored.refresh_fingerprint)
        {
            warn!(account_id = %claims.sub, "refresh token does not match the active session");
            return Err(Error::TokenRevokedOrReplaced);
        }

        if claims.access_token_id != stored.access_token_id {
            warn!(
                account_id = %claims.sub,
                stored_access_token_id = %stored.access_token_id,
                presented_access_token_id = %claims.access_token_id,
                "refresh token bound to a superseded access token"
            );
            return Err(Error::TokenPairMismatch);
        }

        let issued = self.codec.generate(&claims.sub)?;
        let record = self.session_record(&issued);

        if !self
            .sessions
            .rotate(&claims.sub, &stored.refresh_fingerprint, record)
            .await?
        {
            warn!(account_id = %claims.sub, "concurrent refresh already rotated this session");
            return Err(Error::TokenRevokedOrReplaced);
        }

        info!(account_id = %claims.sub, "tokens rotated");
        Ok(issued.into())
    }

    /// Returns the account id the access token belongs to.
    ///
    /// # Errors
    ///
    /// Token parse errors, [`Error::SessionNotFound`],
    /// [`Error::TokenPairMismatch`] or [`Error::Persistence`].
    #[instrument(skip_all)]
    pub async fn validate_token(&self, access_token: &str) -> Result<String, Error> {
        self.authorize(access_token).await.map(|claims| claims.sub)
    }

    /// Revoke the session the access token belongs to.
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::validate_token`].
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> Result<bool, Error> {
        let claims = self.authorize(access_token).await?;
        self.sessions.delete(&claims.sub).await?;
        info!(account_id = %claims.sub, "user logged out");
        Ok(true)
    }

    async fn authorize(&self, access_token: &str) -> Result<AccessClaims, Error> {
        let claims = self.codec.parse_access_token(access_token)?;
        let stored = self.sessions.read(&claims.sub).await?;
        if claims.jti != stored.access_token_id {
            return Err(Error::TokenPairMismatch);
        }
        Ok(claims)
    }

    async fn issue_and_store(&self, subject: &str) -> Result<TokenPair, Error> {
        let issued = self.codec.generate(subject)?;
        self.sessions
            .write(subject, self.session_record(&issued))
            .await?;
        Ok(issued.into())
    }

    fn session_record(&self, issued: &IssuedTokens) -> SessionRecord {
        SessionRecord {
            access_token_id: issued.access_token_id.clone(),
            refresh_fingerprint: self.fingerprinter.fingerprint(&issued.refresh_token),
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, Error> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| Error::Hashing(err.to_string()))?
    }

    async fn verify_password(&self, digest: String, password: &str) -> Result<bool, Error> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &password))
            .await
            .map_err(|err| Error::Hashing(err.to_string()))
    }
}
