//! Postgres-backed user directory and session store.

use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::{
    error::Error,
    session::{SessionRecord, SessionStore},
    users::{Account, UserDirectory},
    BoxFuture,
};

/// Tables required by [`PgUserDirectory`] and [`PgSessionStore`].
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Create the tables if they do not exist yet.
///
/// # Errors
///
/// Returns [`Error::Persistence`] if the statements fail.
pub async fn apply_schema(pool: &PgPool) -> Result<(), Error> {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "CREATE",
        db.statement = SCHEMA_SQL
    );
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for PgUserDirectory {
    fn find_by_username<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<Account, Error>> {
        Box::pin(async move {
            let query = "SELECT id, username, password_hash, email FROM users WHERE username = $1";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(username)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?
                .ok_or(Error::UserNotFound)?;

            Ok(Account {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                password_digest: row.try_get("password_hash")?,
                email: row.try_get("email")?,
            })
        })
    }

    fn create<'a>(&'a self, account: &'a Account) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let query = r"
                INSERT INTO users
                    (id, username, password_hash, email)
                VALUES ($1, $2, $3, $4)
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            let result = sqlx::query(query)
                .bind(&account.id)
                .bind(&account.username)
                .bind(&account.password_digest)
                .bind(account.email.as_deref())
                .execute(&self.pool)
                .instrument(span)
                .await;

            match result {
                Ok(_) => Ok(()),
                Err(err) if is_unique_violation(&err) => Err(Error::UserAlreadyExists),
                Err(err) => Err(err.into()),
            }
        })
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionStore for PgSessionStore {
    fn write<'a>(
        &'a self,
        account_id: &'a str,
        record: SessionRecord,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let query = r"
                INSERT INTO user_sessions
                    (user_id, access_token_id, refresh_fingerprint)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO UPDATE
                SET access_token_id = EXCLUDED.access_token_id,
                    refresh_fingerprint = EXCLUDED.refresh_fingerprint,
                    updated_at = NOW()
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(account_id)
                .bind(&record.access_token_id)
                .bind(&record.refresh_fingerprint)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(())
        })
    }

    fn read<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<SessionRecord, Error>> {
        Box::pin(async move {
            let query =
                "SELECT access_token_id, refresh_fingerprint FROM user_sessions WHERE user_id = $1";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(account_id)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?
                .ok_or(Error::SessionNotFound)?;

            Ok(SessionRecord {
                access_token_id: row.try_get("access_token_id")?,
                refresh_fingerprint: row.try_get("refresh_fingerprint")?,
            })
        })
    }

    fn delete<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let query = "DELETE FROM user_sessions WHERE user_id = $1";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(account_id)
                .execute(&self.pool)
                .instrument(span)
                .await?;
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
            // The fingerprint predicate makes this a compare-and-swap: the row
            // lock serializes racing updates and only the first one matches.
            let query = r"
                UPDATE user_sessions
                SET access_token_id = $3,
                    refresh_fingerprint = $4,
                    updated_at = NOW()
                WHERE user_id = $1 AND refresh_fingerprint = $2
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            let result = sqlx::query(query)
                .bind(account_id)
                .bind(expected_fingerprint)
                .bind(&record.access_token_id)
                .bind(&record.refresh_fingerprint)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(result.rows_affected() == 1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct FakeDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error")
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    #[test]
    fn unique_violation_is_detected_by_sqlstate() {
        let duplicate = sqlx::Error::Database(Box::new(FakeDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&duplicate));

        let other = sqlx::Error::Database(Box::new(FakeDbError {
            code: Some("40001"),
        }));
        assert!(!is_unique_violation(&other));

        let no_code = sqlx::Error::Database(Box::new(FakeDbError { code: None }));
        assert!(!is_unique_violation(&no_code));

        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn schema_defines_both_tables() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS user_sessions"));
        assert!(SCHEMA_SQL.contains("ON DELETE CASCADE"));
    }

    #[tokio::test]
    async fn unreachable_database_is_a_persistence_error() {
        let pool = match sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://tokenpair@127.0.0.1:1/tokenpair")
        {
            Ok(pool) => pool,
            Err(err) => panic!("lazy pool should build: {err}"),
        };
        let sessions = PgSessionStore::new(pool);
        assert!(matches!(
            sessions.read("u1").await,
            Err(Error::Persistence(_))
        ));
    }
}
