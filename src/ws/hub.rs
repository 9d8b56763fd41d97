use std::{collections::HashMap, sync::Arc};

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    error::Result,
    models::{Notification, NotificationEvent, OnlineUser},
    ws::{Connection, GroupMembership},
};

/// Encode a payload once so every recipient shares the same buffer.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Utf8Bytes> {
    Ok(serde_json::to_string(value)?.into())
}

/// Registry of live connections, keyed by user id, and the router onto their queues.
///
/// Every delivery is a non-blocking `try_send`; a full queue drops that one
/// payload for that one recipient.
pub struct Hub {
    connections: RwLock<HashMap<i64, Arc<Connection>>>,
    groups: Arc<dyn GroupMembership>,
}

pub type SharedHub = Arc<Hub>;

impl Hub {
    pub fn new(groups: Arc<dyn GroupMembership>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            groups,
        }
    }

    /// Insert or replace the entry for the connection's user, then announce it to everyone else.
    pub async fn register(&self, connection: Arc<Connection>) {
        let user_id = connection.user_id();
        let replaced = {
            let mut connections = self.connections.write().await;
            connections.insert(user_id, connection.clone())
        };

        if let Some(previous) = replaced.filter(|previous| previous.id() != connection.id()) {
            tracing::info!(
                user_id,
                connection_id = %previous.id(),
                "Replacing existing connection"
            );
            previous.close();
        }
        tracing::info!(user_id, connection_id = %connection.id(), "Registered connection");

        let user = connection.user();
        self.notify_all_except(
            user_id,
            NotificationEvent::UserConnected {
                user_id,
                nickname: user.nickname.clone(),
                avatar: user.avatar.clone(),
            },
        )
        .await;

        let mut users = self.get_online_users().await;
        users.retain(|online| online.user_id != user_id);
        match encode_payload(&Notification::new(NotificationEvent::OnlineUsers { users })) {
            Ok(payload) => {
                connection.try_send(payload);
            }
            Err(e) => tracing::error!(user_id, "Failed to encode presence snapshot: {}", e),
        }
    }

    /// Remove whatever connection is registered for `user_id`. Idempotent.
    pub async fn unregister(&self, user_id: i64) {
        let removed = self.connections.write().await.remove(&user_id);
        match removed {
            Some(connection) => self.announce_departure(&connection).await,
            None => tracing::debug!(user_id, "Unregister for user that is not online"),
        }
    }

    /// Remove `connection` only if it is still the registered entry for its user.
    ///
    /// A connection that was replaced must not tear down its replacement.
    pub async fn unregister_connection(&self, connection: &Connection) {
        let user_id = connection.user_id();
        let removed = {
            let mut connections = self.connections.write().await;
            match connections.get(&user_id) {
                Some(current) if current.id() == connection.id() => connections.remove(&user_id),
                _ => None,
            }
        };

        match removed {
            Some(connection) => self.announce_departure(&connection).await,
            None => tracing::debug!(
                user_id,
                connection_id = %connection.id(),
                "Connection already replaced or removed"
            ),
        }
    }

    async fn announce_departure(&self, connection: &Connection) {
        let user_id = connection.user_id();
        tracing::info!(user_id, connection_id = %connection.id(), "Unregistered connection");
        self.notify_all_except(
            user_id,
            NotificationEvent::UserDisconnected {
                user_id,
                nickname: connection.user().nickname.clone(),
            },
        )
        .await;
    }

    async fn notify_all_except(&self, excluded: i64, event: NotificationEvent) {
        let payload = match encode_payload(&Notification::new(event)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode presence notification: {}", e);
                return;
            }
        };

        let connections = self.connections.read().await;
        for (user_id, connection) in connections.iter() {
            if *user_id != excluded {
                connection.try_send(payload.clone());
            }
        }
    }

    /// Queue `payload` for `user_id` if online. Returns whether it was queued.
    pub async fn send_to_user(&self, user_id: i64, payload: Utf8Bytes) -> bool {
        let connections = self.connections.read().await;
        match connections.get(&user_id) {
            Some(connection) => connection.try_send(payload),
            None => {
                tracing::debug!(user_id, "Recipient offline, dropping payload");
                false
            }
        }
    }

    /// Current members of `group_id`, as reported by the membership source
    pub async fn group_members(&self, group_id: &str) -> Result<Vec<i64>> {
        self.groups.group_members(group_id).await
    }

    /// Deliver to every member of `group_id` except the sender.
    pub async fn broadcast_to_group(&self, sender_id: i64, group_id: &str, payload: Utf8Bytes) {
        match self.group_members(group_id).await {
            Ok(members) => self.send_to_members(sender_id, members, payload).await,
            Err(e) => {
                tracing::warn!(group_id, sender_id, "Group membership lookup failed: {}", e);
            }
        }
    }

    /// Deliver one copy to each online member of an already resolved member list,
    /// skipping the sender.
    pub async fn send_to_members(
        &self,
        sender_id: i64,
        mut members: Vec<i64>,
        payload: Utf8Bytes,
    ) {
        members.sort_unstable();
        members.dedup();

        let connections = self.connections.read().await;
        for member in members.into_iter().filter(|member| *member != sender_id) {
            if let Some(connection) = connections.get(&member) {
                connection.try_send(payload.clone());
            }
        }
    }

    /// Deliver to every registered connection
    pub async fn broadcast_to_all(&self, payload: Utf8Bytes) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            connection.try_send(payload.clone());
        }
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.connections.read().await.contains_key(&user_id)
    }

    pub async fn online_user_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.connections.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn get_online_users(&self) -> Vec<OnlineUser> {
        let mut users: Vec<OnlineUser> = self
            .connections
            .read()
            .await
            .values()
            .map(|connection| connection.online_user())
            .collect();
        users.sort_by_key(|user| user.user_id);
        users
    }

    /// Get the number of active connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
