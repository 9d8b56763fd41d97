use async_trait::async_trait;
use chrono::Utc;

use crate::{
    db::DbPool,
    error::{AppError, Result},
    models::UserIdentity,
    ws::SessionResolver,
};

/// Session lookups backing the cookie credential
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
}

impl SessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the user owning a non-expired session token
    pub async fn get_user_by_session(&self, token: &str) -> Result<UserIdentity> {
        sqlx::query_as::<_, UserIdentity>(
            r#"
            SELECT u.id, u.nickname, COALESCE(u.avatar, '') AS avatar
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ? AND s.expires_at > ?
            "#,
        )
        .bind(token)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid or expired session".into()))
    }
}

#[async_trait]
impl SessionResolver for SessionStore {
    async fn resolve(&self, token: &str) -> Result<UserIdentity> {
        if token.is_empty() {
            return Err(AppError::Auth("Empty session token".into()));
        }
        self.get_user_by_session(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, init_memory_pool};

    #[tokio::test]
    async fn resolves_live_sessions_only() {
        let pool = init_memory_pool().await.unwrap();
        fixtures::insert_user(&pool, 1, "alice").await;
        let now = Utc::now().timestamp();
        fixtures::insert_session(&pool, "live", 1, now + 3600).await;
        fixtures::insert_session(&pool, "stale", 1, now - 1).await;

        let store = SessionStore::new(pool);
        let user = store.resolve("live").await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.nickname, "alice");
        assert_eq!(user.avatar, "alice.png");

        assert!(matches!(store.resolve("stale").await, Err(AppError::Auth(_))));
        assert!(matches!(store.resolve("missing").await, Err(AppError::Auth(_))));
        assert!(matches!(store.resolve("").await, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn missing_avatar_reads_as_empty() {
        let pool = init_memory_pool().await.unwrap();
        sqlx::query("INSERT INTO users (id, nickname) VALUES (5, 'eve')")
            .execute(&pool)
            .await
            .unwrap();
        fixtures::insert_session(&pool, "eve", 5, Utc::now().timestamp() + 3600).await;

        let store = SessionStore::new(pool);
        let user = store.resolve("eve").await.unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(user.nickname, "eve");
        assert_eq!(user.avatar, "");
    }
}
