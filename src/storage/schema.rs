use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// `target` is either a `sqlite:` URL, a filesystem path (created if
    /// missing) or `:memory:`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Migration` if the schema cannot be created and
    /// `DatabaseError::Other` for connection failures.
    pub async fn open(target: &str) -> Result<Self, DatabaseError> {
        let in_memory = target == ":memory:" || target.starts_with("sqlite::memory:");

        let options = if target == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else if target.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(target)?.create_if_missing(true)
        } else {
            SqliteConnectOptions::new()
                .filename(target)
                .create_if_missing(true)
        };

        // Foreign keys are a per-connection setting, so they go on the options
        // every pooled connection is built from.
        let options = options
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // Each in-memory connection would otherwise see its own empty database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate()
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::debug!(target = %target, "Database ready");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                name TEXT UNIQUE NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                name TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                last_fetched_at INTEGER,
                last_fetch_error TEXT,
                last_fetch_error_at INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                UNIQUE(user_id, feed_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                published_at INTEGER,
                description TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Rotation order for the aggregation loop
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched ON feeds(last_fetched_at, id)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_feed_created ON posts(feed_id, created_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // UNIQUE(user_id, feed_id) already covers lookups by user
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feed_follows_feed ON feed_follows(feed_id)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete every row from every table.
    ///
    /// Children go first (posts, follows) so the deletes hold up even
    /// without the `ON DELETE CASCADE` clauses.
    pub async fn reset(&self) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        for table in ["posts", "feed_follows", "feeds", "users"] {
            let result = sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
            tracing::debug!(table = table, rows = result.rows_affected(), "Cleared table");
        }
        tx.commit().await?;
        Ok(())
    }
}
