use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors.
///
/// Unique constraint failures are split out so callers can treat a duplicate
/// user name or post URL as an expected outcome instead of parsing messages.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An INSERT hit a UNIQUE constraint
    #[error("Duplicate value violates unique constraint: {0}")]
    UniqueViolation(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(sqlx::Error),
}

impl DatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DatabaseError::UniqueViolation(db_err.message().to_string());
            }
        }
        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered user. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

/// Feed row as stored.
///
/// `last_fetched_at` drives the aggregation rotation and is stored in
/// microseconds; the other timestamps are seconds. `last_fetch_error` holds
/// the most recent failure and is cleared by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<i64>,
    pub last_fetch_error: Option<String>,
    pub last_fetch_error_at: Option<i64>,
}

/// Feed joined with the name of the user who added it
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedWithOwner {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner_name: String,
    /// Microseconds since the epoch
    pub last_fetched_at: Option<i64>,
    pub last_fetch_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedFollow {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub user_id: i64,
    pub feed_id: i64,
}

/// A feed as seen from a user's follow list
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowedFeed {
    pub feed_id: i64,
    pub feed_name: String,
    pub feed_url: String,
}

/// Post to be inserted by the aggregator
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub published_at: Option<i64>,
    pub description: Option<String>,
}

/// Stored post with the name of the feed it came from
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub feed_id: i64,
    pub feed_name: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<i64>,
    pub description: Option<String>,
}
