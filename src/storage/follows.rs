use super::feeds::insert_follow;
use super::schema::Database;
use super::types::{DatabaseError, FeedFollow, FollowedFeed};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Make a user follow a feed.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UniqueViolation` if the user already follows the feed.
    pub async fn create_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<FeedFollow, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let follow = insert_follow(&self.pool, user_id, feed_id, now).await?;
        Ok(follow)
    }

    /// Feeds a user follows, in the order they were followed
    pub async fn get_feed_follows_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<FollowedFeed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FollowedFeed>(
            r#"
            SELECT f.id AS feed_id, f.name AS feed_name, f.url AS feed_url
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY ff.created_at, ff.id
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Remove the (user, feed) follow. Returns false if there was none.
    pub async fn delete_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
