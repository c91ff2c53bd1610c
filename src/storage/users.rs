use super::schema::Database;
use super::types::{DatabaseError, User};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// `DatabaseError::UniqueViolation` if the name is already taken.
    pub async fn create_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (created_at, updated_at, name)
            VALUES (?, ?, ?)
            RETURNING id, created_at, updated_at, name
        "#,
        )
        .bind(now)
        .bind(now)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// Look up a user by name
    pub async fn get_user(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, created_at, updated_at, name FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// All users, ordered by name
    pub async fn get_users(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, created_at, updated_at, name FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
