use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

use crate::{
    error::{AppError, Result},
    models::{ChatMessage, UserIdentity},
    ws::{Connection, GroupMembership, Hub, MessagePersister},
};

pub fn identity(id: i64) -> UserIdentity {
    UserIdentity {
        id,
        nickname: format!("user{id}"),
        avatar: format!("avatars/{id}.png"),
    }
}

/// Register a fresh connection for `user_id`
pub async fn connect(
    hub: &Hub,
    user_id: i64,
    capacity: usize,
) -> (Arc<Connection>, mpsc::Receiver<Utf8Bytes>) {
    let (connection, outbound) = Connection::new(identity(user_id), capacity);
    hub.register(connection.clone()).await;
    (connection, outbound)
}

/// Everything currently queued, decoded as JSON
pub fn drain(outbound: &mut mpsc::Receiver<Utf8Bytes>) -> Vec<Value> {
    let mut payloads = Vec::new();
    while let Ok(payload) = outbound.try_recv() {
        payloads.push(serde_json::from_str(payload.as_str()).expect("queued payload is JSON"));
    }
    payloads
}

#[derive(Default)]
pub struct StaticGroups {
    groups: HashMap<String, Vec<i64>>,
}

impl StaticGroups {
    pub fn new<'a>(groups: impl IntoIterator<Item = (&'a str, Vec<i64>)>) -> Self {
        Self {
            groups: groups
                .into_iter()
                .map(|(id, members)| (id.to_string(), members))
                .collect(),
        }
    }
}

#[async_trait]
impl GroupMembership for StaticGroups {
    async fn group_members(&self, group_id: &str) -> Result<Vec<i64>> {
        self.groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("group {group_id}")))
    }
}

pub struct FailingGroups;

#[async_trait]
impl GroupMembership for FailingGroups {
    async fn group_members(&self, _group_id: &str) -> Result<Vec<i64>> {
        Err(AppError::Internal("membership source unavailable".into()))
    }
}

#[derive(Default)]
pub struct RecordingPersister {
    saved: Mutex<Vec<(i64, ChatMessage)>>,
    saved_signal: Notify,
}

impl RecordingPersister {
    pub fn saved(&self) -> Vec<(i64, ChatMessage)> {
        self.saved.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages were saved
    pub async fn wait_for(&self, count: usize) -> Vec<(i64, ChatMessage)> {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let notified = self.saved_signal.notified();
                let saved = self.saved();
                if saved.len() >= count {
                    return saved;
                }
                notified.await;
            }
        })
        .await
        .expect("messages persisted in time")
    }
}

#[async_trait]
impl MessagePersister for RecordingPersister {
    async fn save_message(&self, sender_id: i64, message: &ChatMessage) -> Result<()> {
        self.saved.lock().unwrap().push((sender_id, message.clone()));
        self.saved_signal.notify_waiters();
        Ok(())
    }
}

pub struct FailingPersister;

#[async_trait]
impl MessagePersister for FailingPersister {
    async fn save_message(&self, _sender_id: i64, _message: &ChatMessage) -> Result<()> {
        Err(AppError::Internal("disk full".into()))
    }
}
