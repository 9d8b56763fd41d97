use chrono::Utc;
use serde::Serialize;

use crate::models::user::OnlineUser;

/// Notification subtypes and their fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum NotificationEvent {
    UserConnected {
        user_id: i64,
        nickname: String,
        avatar: String,
    },
    UserDisconnected {
        user_id: i64,
        nickname: String,
    },
    /// Sent to a freshly registered connection only
    OnlineUsers { users: Vec<OnlineUser> },
    GroupInvite {
        group_id: String,
        group_title: String,
        inviter_id: i64,
        inviter_nickname: String,
    },
    FollowRequest {
        follower_id: i64,
        follower_nickname: String,
    },
}

/// Non-chat event pushed to clients: `{"type":"notification","subtype":...,"timestamp":...}`
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub type_: &'static str,
    #[serde(flatten)]
    pub event: NotificationEvent,
    pub timestamp: i64,
}

impl Notification {
    pub fn new(event: NotificationEvent) -> Self {
        Self {
            type_: "notification",
            event,
            timestamp: Utc::now().timestamp(),
        }
    }
}
