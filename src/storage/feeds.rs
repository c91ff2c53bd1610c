use sqlx::{Executor, Sqlite};

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedFollow, FeedWithOwner};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, \
     last_fetched_at, last_fetch_error, last_fetch_error_at";

/// Insert a follow row on any executor, so it can join a transaction
pub(crate) async fn insert_follow<'e, E>(
    executor: E,
    user_id: i64,
    feed_id: i64,
    now: i64,
) -> Result<FeedFollow, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, FeedFollow>(
        r#"
        INSERT INTO feed_follows (created_at, updated_at, user_id, feed_id)
        VALUES (?, ?, ?, ?)
        RETURNING id, created_at, updated_at, user_id, feed_id
    "#,
    )
    .bind(now)
    .bind(now)
    .bind(user_id)
    .bind(feed_id)
    .fetch_one(executor)
    .await
}

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Create a feed owned by `user_id` and make that user follow it.
    ///
    /// Both inserts run in one transaction: if the follow cannot be created
    /// the feed insert is rolled back as well.
    pub async fn create_feed_with_follow(
        &self,
        user_id: i64,
        name: &str,
        url: &str,
    ) -> Result<(Feed, FeedFollow), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            INSERT INTO feeds (created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let follow = insert_follow(&mut *tx, user_id, feed.id, now).await?;

        tx.commit().await?;
        Ok((feed, follow))
    }

    /// Look up a feed by its URL
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// All feeds with the name of the user who added them, in one JOIN
    pub async fn get_feeds_with_owner(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT f.id, f.name, f.url, u.name AS owner_name,
                   f.last_fetched_at, f.last_fetch_error
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at, f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    // ========================================================================
    // Aggregation Rotation
    // ========================================================================

    /// The feed fetched longest ago, never-fetched feeds first
    pub async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Stamp a feed as fetched and return the new `last_fetched_at`.
    ///
    /// The stamp is the wall clock in microseconds, fine enough that
    /// back-to-back ticks still order the rotation.
    pub async fn mark_feed_fetched(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let now = chrono::Utc::now();
        let stamped: (i64,) = sqlx::query_as(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = ?
            RETURNING last_fetched_at
        "#,
        )
        .bind(now.timestamp_micros())
        .bind(now.timestamp())
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stamped.0)
    }

    /// Record a failed fetch without touching the rotation timestamp
    pub async fn record_fetch_error(&self, feed_id: i64, error: &str) -> Result<(), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE feeds SET last_fetch_error = ?, last_fetch_error_at = ? WHERE id = ?")
            .bind(error)
            .bind(now)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clear the recorded error after a successful fetch
    pub async fn clear_fetch_error(&self, feed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE feeds SET last_fetch_error = NULL, last_fetch_error_at = NULL WHERE id = ?",
        )
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn feed_url(n: i64) -> String {
        format!("https://feed{}.example.com/rss", n)
    }

    #[tokio::test]
    async fn test_create_feed_with_follow() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();

        let (feed, follow) = db
            .create_feed_with_follow(user.id, "Blog", &feed_url(1))
            .await
            .unwrap();
        assert_eq!(feed.name, "Blog");
        assert_eq!(feed.user_id, user.id);
        assert!(feed.last_fetched_at.is_none());
        assert_eq!(follow.user_id, user.id);
        assert_eq!(follow.feed_id, feed.id);

        let followed = db.get_feed_follows_for_user(user.id).await.unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].feed_name, "Blog");
    }

    #[tokio::test]
    async fn test_duplicate_feed_url_rejected() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        db.create_feed_with_follow(user.id, "One", &feed_url(1))
            .await
            .unwrap();

        let err = db
            .create_feed_with_follow(user.id, "Two", &feed_url(1))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(db.get_feeds_with_owner().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_feed_rolled_back_when_follow_fails() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_follows BEFORE INSERT ON feed_follows
            BEGIN SELECT RAISE(ABORT, 'follows disabled'); END
        "#,
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let result = db
            .create_feed_with_follow(user.id, "Blog", &feed_url(1))
            .await;
        assert!(matches!(result, Err(DatabaseError::Other(_))));
        assert!(db.get_feed_by_url(&feed_url(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_feeds_with_owner_single_row_per_feed() {
        let db = test_db().await;
        let alice = db.create_user("alice").await.unwrap();
        let bob = db.create_user("bob").await.unwrap();
        let (feed, _) = db
            .create_feed_with_follow(alice.id, "Blog", &feed_url(1))
            .await
            .unwrap();
        // Another follower must not duplicate the listing
        db.create_feed_follow(bob.id, feed.id).await.unwrap();

        let feeds = db.get_feeds_with_owner().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].owner_name, "alice");
        assert_eq!(feeds[0].url, feed_url(1));
    }

    #[tokio::test]
    async fn test_next_feed_rotation() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let (first, _) = db
            .create_feed_with_follow(user.id, "First", &feed_url(1))
            .await
            .unwrap();
        let (second, _) = db
            .create_feed_with_follow(user.id, "Second", &feed_url(2))
            .await
            .unwrap();

        let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, first.id);
        db.mark_feed_fetched(first.id).await.unwrap();

        let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, second.id);
        db.mark_feed_fetched(second.id).await.unwrap();

        let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, first.id);
    }

    #[tokio::test]
    async fn test_next_feed_empty() {
        let db = test_db().await;
        assert!(db.get_next_feed_to_fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_fetched_uses_wall_clock() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let (feed, _) = db
            .create_feed_with_follow(user.id, "Blog", &feed_url(1))
            .await
            .unwrap();

        let mut previous = 0;
        for _ in 0..30 {
            let before = chrono::Utc::now().timestamp_micros();
            let stamp = db.mark_feed_fetched(feed.id).await.unwrap();
            let after = chrono::Utc::now().timestamp_micros();
            assert!(stamp >= before && stamp <= after, "stamp not within wall clock");
            assert!(stamp >= previous);
            previous = stamp;
        }

        let stored = db.get_feed_by_url(&feed_url(1)).await.unwrap().unwrap();
        assert_eq!(stored.last_fetched_at, Some(previous));
    }

    #[tokio::test]
    async fn test_rotation_alternates_after_rapid_marks() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let (a, _) = db
            .create_feed_with_follow(user.id, "A", &feed_url(1))
            .await
            .unwrap();
        for _ in 0..30 {
            db.mark_feed_fetched(a.id).await.unwrap();
        }
        let (b, _) = db
            .create_feed_with_follow(user.id, "B", &feed_url(2))
            .await
            .unwrap();

        let mut picked = Vec::new();
        for _ in 0..6 {
            let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
            db.mark_feed_fetched(next.id).await.unwrap();
            picked.push(next.id);
            // Keep consecutive stamps apart
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        assert_eq!(picked, vec![b.id, a.id, b.id, a.id, b.id, a.id]);
    }

    #[tokio::test]
    async fn test_fetch_error_recorded_and_cleared() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let (feed, _) = db
            .create_feed_with_follow(user.id, "Blog", &feed_url(1))
            .await
            .unwrap();
        let stamped = db.mark_feed_fetched(feed.id).await.unwrap();

        db.record_fetch_error(feed.id, "connection refused")
            .await
            .unwrap();
        let stored = db.get_feed_by_url(&feed_url(1)).await.unwrap().unwrap();
        assert_eq!(stored.last_fetch_error.as_deref(), Some("connection refused"));
        assert!(stored.last_fetch_error_at.is_some());
        assert_eq!(stored.last_fetched_at, Some(stamped));

        db.clear_fetch_error(feed.id).await.unwrap();
        let stored = db.get_feed_by_url(&feed_url(1)).await.unwrap().unwrap();
        assert!(stored.last_fetch_error.is_none());
        assert!(stored.last_fetch_error_at.is_none());
    }
}
