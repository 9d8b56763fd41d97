use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Authenticated user bound to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserIdentity {
    pub id: i64,
    pub nickname: String,
    pub avatar: String,
}

/// Point-in-time view of an online user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineUser {
    pub user_id: i64,
    pub nickname: String,
    pub avatar: String,
    pub connected_at: DateTime<Utc>,
}
