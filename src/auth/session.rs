use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{error::Error, BoxFuture};

/// The single persisted pointer from an account to its current token pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub access_token_id: String,
    pub refresh_fingerprint: Vec<u8>,
}

/// One session record per account, keyed by account id.
pub trait SessionStore: Send + Sync {
    /// Insert or replace the record for `account_id`.
    fn write<'a>(
        &'a self,
        account_id: &'a str,
        record: SessionRecord,
    ) -> BoxFuture<'a, Result<(), Error>>;

    /// Fails with [`Error::SessionNotFound`] if the account has no record.
    fn read<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<SessionRecord, Error>>;

    /// Remove the record; succeeds when there was none.
    fn delete<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<(), Error>>;

    /// Replace the record only if the stored fingerprint still equals
    /// `expected_fingerprint`. Returns `false` when another writer got there
    /// first or the record is gone.
    fn rotate<'a>(
        &'a self,
        account_id: &'a str,
        expected_fingerprint: &'a [u8],
        record: SessionRecord,
    ) -> BoxFuture<'a, Result<bool, Error>>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn write<'a>(
        &'a self,
        account_id: &'a str,
        record: SessionRecord,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.records
                .lock()
                .await
                .insert(account_id.to_string(), record);
            Ok(())
        })
    }

    fn read<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<SessionRecord, Error>> {
        Box::pin(async move {
            self.records
                .lock()
                .await
                .get(account_id)
                .cloned()
                .ok_or(Error::SessionNotFound)
        })
    }

    fn delete<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.records.lock().await.remove(account_id);
            Ok(())
        })
    }

    fn rotate<'a>(
        &'a self,
        account_id: &'a str,
        expected_fingerprint: &'a [u8],
        record: SessionRecord,
    ) -> BoxFuture<'a, Result<bool, Error>> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            match records.get_mut(account_id) {
                Some(current) if current.refresh_fingerprint == expected_fingerprint => {
                    *current = record;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, fingerprint: &[u8]) -> SessionRecord {
        SessionRecord {
            access_token_id: id.to_string(),
            refresh_fingerprint: fingerprint.to_vec(),
        }
    }

    #[tokio::test]
    async fn read_missing_is_session_not_found() {
        let store = MemorySessionStore::new();
        assert!(matches!(
            store.read("nobody").await,
            Err(Error::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn write_replaces_previous_record() -> Result<(), Error> {
        let store = MemorySessionStore::new();
        store.write("u1", record("a1", b"f1")).await?;
        store.write("u1", record("a2", b"f2")).await?;
        assert_eq!(store.read("u1").await?, record("a2", b"f2"));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> Result<(), Error> {
        let store = MemorySessionStore::new();
        store.write("u1", record("a1", b"f1")).await?;
        store.delete("u1").await?;
        store.delete("u1").await?;
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn rotate_is_compare_and_swap() -> Result<(), Error> {
        let store = MemorySessionStore::new();
        store.write("u1", record("a1", b"f1")).await?;

        assert!(store.rotate("u1", b"f1", record("a2", b"f2")).await?);
        // The second writer read the same old fingerprint and must lose.
        assert!(!store.rotate("u1", b"f1", record("a3", b"f3")).await?);
        assert_eq!(store.read("u1").await?, record("a2", b"f2"));

        assert!(!store.rotate("u2", b"f1", record("a4", b"f4")).await?);
        assert!(matches!(store.read("u2").await, Err(Error::SessionNotFound)));
        Ok(())
    }
}
