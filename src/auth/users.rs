use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{error::Error, BoxFuture};

#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// PHC string produced by the password hasher.
    pub password_digest: String,
    pub email: Option<String>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Account lookup and creation by username.
pub trait UserDirectory: Send + Sync {
    /// Fails with [`Error::UserNotFound`] when no account has `username`.
    fn find_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<Account, Error>>;

    /// Persist a new account. A duplicate username fails with
    /// [`Error::UserAlreadyExists`].
    fn create<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, Result<(), Error>>;
}

/// Accounts keyed by username.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn find_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<Account, Error>> {
        Box::pin(async move {
            self.accounts
                .read()
                .await
                .get(username)
                .cloned()
                .ok_or(Error::UserNotFound)
        })
    }

    fn create<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&account.username) {
                return Err(Error::UserAlreadyExists);
            }
            accounts.insert(account.username.clone(), account.clone());
            Ok(())
        })
    }
}
