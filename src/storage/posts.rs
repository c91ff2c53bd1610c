use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post};

/// Upper bound for a single browse query
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post and return its id.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UniqueViolation` if a post with the same URL exists.
    /// The aggregator treats that as "already seen".
    pub async fn create_post(&self, post: &NewPost) -> Result<i64, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let id: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO posts (created_at, updated_at, feed_id, title, url, published_at, description)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(now)
        .bind(now)
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(post.published_at)
        .bind(&post.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.0)
    }

    /// Newest posts from the feeds a user follows.
    ///
    /// Ordered by insertion time, newest first; the id breaks ties between
    /// posts stored within the same second.
    pub async fn get_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.created_at, p.updated_at, p.feed_id, f.name AS feed_name,
                   p.title, p.url, p.published_at, p.description
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            JOIN feeds f ON f.id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit.clamp(0, MAX_POSTS))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn count_posts_for_feed(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewPost};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn new_post(feed_id: i64, slug: &str) -> NewPost {
        NewPost {
            feed_id,
            title: format!("Post {}", slug),
            url: format!("https://example.com/posts/{}", slug),
            published_at: Some(1704067200),
            description: Some("Test description".to_string()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_post_url_is_unique_violation() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let (feed, _) = db
            .create_feed_with_follow(user.id, "Blog", "https://example.com/rss")
            .await
            .unwrap();

        db.create_post(&new_post(feed.id, "a")).await.unwrap();
        let err = db.create_post(&new_post(feed.id, "a")).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(db.count_posts_for_feed(feed.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_post_requires_existing_feed() {
        let db = test_db().await;
        let err = db.create_post(&new_post(999, "a")).await.unwrap_err();
        assert!(!err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_browse_limit_returns_newest() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let (feed, _) = db
            .create_feed_with_follow(user.id, "Blog", "https://example.com/rss")
            .await
            .unwrap();
        for slug in ["one", "two", "three"] {
            db.create_post(&new_post(feed.id, slug)).await.unwrap();
        }

        let posts = db.get_posts_for_user(user.id, 1).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Post three");
        assert_eq!(posts[0].feed_name, "Blog");

        let posts = db.get_posts_for_user(user.id, 10).await.unwrap();
        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Post three", "Post two", "Post one"]);
    }

    #[tokio::test]
    async fn test_browse_only_followed_feeds() {
        let db = test_db().await;
        let alice = db.create_user("alice").await.unwrap();
        let bob = db.create_user("bob").await.unwrap();
        let (alice_feed, _) = db
            .create_feed_with_follow(alice.id, "Alice", "https://alice.example.com/rss")
            .await
            .unwrap();
        let (bob_feed, _) = db
            .create_feed_with_follow(bob.id, "Bob", "https://bob.example.com/rss")
            .await
            .unwrap();
        db.create_post(&new_post(alice_feed.id, "a")).await.unwrap();
        db.create_post(&new_post(bob_feed.id, "b")).await.unwrap();

        let posts = db.get_posts_for_user(alice.id, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].feed_id, alice_feed.id);
    }

    #[tokio::test]
    async fn test_browse_zero_limit() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let (feed, _) = db
            .create_feed_with_follow(user.id, "Blog", "https://example.com/rss")
            .await
            .unwrap();
        db.create_post(&new_post(feed.id, "a")).await.unwrap();

        assert!(db.get_posts_for_user(user.id, 0).await.unwrap().is_empty());
    }
}
