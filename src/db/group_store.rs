use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    db::DbPool,
    error::{AppError, Result},
    ws::GroupMembership,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: String,
    pub title: String,
    pub creator_id: i64,
}

/// Group and membership queries
#[derive(Clone)]
pub struct GroupStore {
    pool: DbPool,
}

impl GroupStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Group> {
        sqlx::query_as::<_, Group>("SELECT id, title, creator_id FROM groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {group_id}")))
    }

    pub async fn member_ids(&self, group_id: &str) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM group_members WHERE group_id = ? ORDER BY user_id")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn is_member(&self, group_id: &str, user_id: i64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    pub async fn user_exists(&self, user_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Record an invite. Returns false if the user was already invited.
    pub async fn create_invite(&self, group_id: &str, user_id: i64, inviter_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO group_invites (group_id, user_id, inviter_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(inviter_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl GroupMembership for GroupStore {
    async fn group_members(&self, group_id: &str) -> Result<Vec<i64>> {
        let members = self.member_ids(group_id).await?;
        if members.is_empty() {
            // an empty member list also covers unknown groups
            self.get_group(group_id).await?;
        }
        Ok(members)
    }
}
