use async_trait::async_trait;

use crate::{
    error::Result,
    models::{ChatMessage, UserIdentity},
};

/// Maps a session credential to the user it belongs to
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<UserIdentity>;
}

/// Source of group membership used for group fan-out
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn group_members(&self, group_id: &str) -> Result<Vec<i64>>;
}

/// Durable record of chat traffic. Broadcast messages are not kept.
#[async_trait]
pub trait MessagePersister: Send + Sync {
    async fn save_message(&self, sender_id: i64, message: &ChatMessage) -> Result<()>;
}
