//! Runs against a real Postgres when `TOKENPAIR_TEST_DSN` is set; otherwise
//! every test returns early.

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokenpair::auth::{
    apply_schema, Account, Error, PgSessionStore, PgUserDirectory, SessionRecord, SessionStore,
    UserDirectory,
};
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let dsn = std::env::var("TOKENPAIR_TEST_DSN").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&dsn)
        .await
        .ok()?;
    apply_schema(&pool).await.ok()?;
    Some(pool)
}

fn account() -> Account {
    let id = Uuid::new_v4().to_string();
    Account {
        username: format!("user-{id}"),
        id,
        password_digest: "$argon2id$test".to_string(),
        email: None,
    }
}

fn record(access_token_id: &str, fingerprint: &[u8]) -> SessionRecord {
    SessionRecord {
        access_token_id: access_token_id.to_string(),
        refresh_fingerprint: fingerprint.to_vec(),
    }
}

#[tokio::test]
async fn users_round_trip_and_reject_duplicates() -> Result<()> {
    let Some(pool) = test_pool().await else {
        return Ok(());
    };
    let users = PgUserDirectory::new(pool);
    let account = account();

    users.create(&account).await?;
    assert_eq!(users.find_by_username(&account.username).await?, account);

    let mut duplicate = account.clone();
    duplicate.id = Uuid::new_v4().to_string();
    assert!(matches!(
        users.create(&duplicate).await,
        Err(Error::UserAlreadyExists)
    ));
    assert!(matches!(
        users.find_by_username("no-such-user").await,
        Err(Error::UserNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn sessions_upsert_rotate_and_delete() -> Result<()> {
    let Some(pool) = test_pool().await else {
        return Ok(());
    };
    let users = PgUserDirectory::new(pool.clone());
    let sessions = PgSessionStore::new(pool);
    let account = account();
    users.create(&account).await?;

    assert!(matches!(
        sessions.read(&account.id).await,
        Err(Error::SessionNotFound)
    ));

    sessions.write(&account.id, record("a1", b"f1")).await?;
    sessions.write(&account.id, record("a2", b"f2")).await?;
    assert_eq!(sessions.read(&account.id).await?, record("a2", b"f2"));

    assert!(sessions.rotate(&account.id, b"f2", record("a3", b"f3")).await?);
    assert!(!sessions.rotate(&account.id, b"f2", record("a4", b"f4")).await?);
    assert_eq!(sessions.read(&account.id).await?, record("a3", b"f3"));

    sessions.delete(&account.id).await?;
    sessions.delete(&account.id).await?;
    assert!(!sessions.rotate(&account.id, b"f3", record("a5", b"f5")).await?);
    assert!(matches!(
        sessions.read(&account.id).await,
        Err(Error::SessionNotFound)
    ));
    Ok(())
}
