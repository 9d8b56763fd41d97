use crate::{
    models::{Notification, NotificationEvent, UserIdentity},
    ws::{SharedHub, encode_payload},
};

/// Pushes non-chat events to users who are online
#[derive(Clone)]
pub struct NotificationSender {
    hub: SharedHub,
}

impl NotificationSender {
    pub fn new(hub: SharedHub) -> Self {
        Self { hub }
    }

    /// Best-effort push to `user_id`. Returns whether it was queued.
    pub async fn send_notification(&self, user_id: i64, event: NotificationEvent) -> bool {
        match encode_payload(&Notification::new(event)) {
            Ok(payload) => self.hub.send_to_user(user_id, payload).await,
            Err(e) => {
                tracing::error!(user_id, "Failed to encode notification: {}", e);
                false
            }
        }
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.hub.is_online(user_id).await
    }

    pub async fn send_group_invite(
        &self,
        invitee_id: i64,
        group_id: &str,
        group_title: &str,
        inviter: &UserIdentity,
    ) -> bool {
        self.send_notification(
            invitee_id,
            NotificationEvent::GroupInvite {
                group_id: group_id.to_string(),
                group_title: group_title.to_string(),
                inviter_id: inviter.id,
                inviter_nickname: inviter.nickname.clone(),
            },
        )
        .await
    }

    pub async fn send_follow_request(&self, target_id: i64, follower: &UserIdentity) -> bool {
        self.send_notification(
            target_id,
            NotificationEvent::FollowRequest {
                follower_id: follower.id,
                follower_nickname: follower.nickname.clone(),
            },
        )
        .await
    }
}
