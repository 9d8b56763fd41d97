use async_trait::async_trait;

use crate::{
    db::DbPool,
    error::Result,
    models::{ChatMessage, MessageType, StoredMessage},
    ws::MessagePersister,
};

/// Persistence and history queries for chat messages
#[derive(Clone)]
pub struct MessageStore {
    pool: DbPool,
}

impl MessageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Page of the conversation between two users, newest first
    pub async fn fetch_private_messages_paginated(
        &self,
        user_a: i64,
        user_b: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>> {
        let messages = sqlx::query_as::<_, StoredMessage>(
            r#"
            SELECT id, sender_id, receiver_id, group_id, content, created_at
            FROM messages
            WHERE group_id IS NULL
              AND ((sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?))
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Page of a group's messages, newest first
    pub async fn fetch_group_messages_paginated(
        &self,
        group_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StoredMessage>> {
        let messages = sqlx::query_as::<_, StoredMessage>(
            r#"
            SELECT id, sender_id, receiver_id, group_id, content, created_at
            FROM messages
            WHERE group_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}

#[async_trait]
impl MessagePersister for MessageStore {
    async fn save_message(&self, sender_id: i64, message: &ChatMessage) -> Result<()> {
        let (receiver_id, group_id) = match message.kind {
            MessageType::Private => (message.to, None),
            MessageType::Group => (None, message.group_id.as_deref()),
            MessageType::Broadcast => return Ok(()),
        };

        sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, group_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(group_id)
        .bind(&message.content)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!(sender_id, kind = message.kind.as_str(), "message persisted");
        Ok(())
    }
}
