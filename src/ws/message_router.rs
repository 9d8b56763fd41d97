use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use chrono::Utc;
use tokio::sync::{mpsc, mpsc::error::TrySendError};

use crate::{
    models::{ChatMessage, InboundFrame, MessageType},
    ws::{Connection, MessagePersister, SharedHub, encode_payload},
};

/// Messages waiting for the store before new ones are dropped
pub const PERSIST_QUEUE_CAPACITY: usize = 1024;

type PersistJob = (i64, ChatMessage);

/// Message router trait for handling inbound websocket frames
#[async_trait]
pub trait MessageRouter: Send + Sync {
    /// Handle one text frame from `sender`. Never fails the connection.
    async fn route_frame(&self, sender: &Connection, text: &str);
}

/// Routes chat frames through the hub and queues them for the persister
pub struct ChatRouter {
    hub: SharedHub,
    persist_queue: Option<mpsc::Sender<PersistJob>>,
}

impl ChatRouter {
    /// Build a router. With a persister, this spawns its single writer task, so it
    /// must be called from within a tokio runtime.
    pub fn new(hub: SharedHub, persister: Option<Arc<dyn MessagePersister>>) -> Self {
        let persist_queue = persister.map(|persister| {
            let (sender, receiver) = mpsc::channel(PERSIST_QUEUE_CAPACITY);
            tokio::spawn(run_persist_loop(persister, receiver));
            sender
        });
        Self { hub, persist_queue }
    }

    /// Queue a message for the store without waiting on it.
    fn persist(&self, sender_id: i64, message: &ChatMessage) {
        let Some(queue) = &self.persist_queue else {
            return;
        };
        match queue.try_send((sender_id, message.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    sender_id,
                    kind = message.kind.as_str(),
                    "Persistence queue full, dropping message"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(sender_id, "Persistence queue closed, dropping message");
            }
        }
    }

    async fn dispatch(&self, sender_id: i64, message: &ChatMessage, payload: Utf8Bytes) {
        match message.kind {
            MessageType::Private => {
                self.persist(sender_id, message);
                if let Some(to) = message.to {
                    self.hub.send_to_user(to, payload).await;
                }
            }
            MessageType::Group => {
                let Some(group_id) = message.group_id.as_deref() else {
                    return;
                };
                let members = match self.hub.group_members(group_id).await {
                    Ok(members) => members,
                    Err(e) => {
                        tracing::warn!(
                            group_id,
                            sender_id,
                            "Group membership lookup failed: {}",
                            e
                        );
                        return;
                    }
                };
                if !members.contains(&sender_id) {
                    tracing::debug!(
                        group_id,
                        sender_id,
                        "Sender is not a group member, dropping message"
                    );
                    return;
                }
                self.persist(sender_id, message);
                self.hub.send_to_members(sender_id, members, payload).await;
            }
            MessageType::Broadcast => {
                self.persist(sender_id, message);
                self.hub.broadcast_to_all(payload).await;
            }
        }
    }
}

/// Save queued messages one at a time, in the order they were routed.
async fn run_persist_loop(
    persister: Arc<dyn MessagePersister>,
    mut queue: mpsc::Receiver<PersistJob>,
) {
    while let Some((sender_id, message)) = queue.recv().await {
        if let Err(e) = persister.save_message(sender_id, &message).await {
            tracing::error!(
                sender_id,
                kind = message.kind.as_str(),
                "Failed to persist message: {}",
                e
            );
        }
    }
}

#[async_trait]
impl MessageRouter for ChatRouter {
    async fn route_frame(&self, sender: &Connection, text: &str) {
        let received_at = Utc::now();
        let message = match InboundFrame::decode(text)
            .and_then(|frame| frame.into_message(sender.user(), received_at))
        {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(user_id = sender.user_id(), "Dropping inbound frame: {}", e);
                return;
            }
        };

        let payload = match encode_payload(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(user_id = sender.user_id(), "Failed to encode message: {}", e);
                return;
            }
        };

        self.dispatch(sender.user_id(), &message, payload).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        db::{MessageStore, fixtures, init_memory_pool},
        ws::{
            Hub,
            test_support::{
                FailingGroups, FailingPersister, RecordingPersister, StaticGroups, connect, drain,
            },
        },
    };

    struct Fixture {
        hub: SharedHub,
        persister: Arc<RecordingPersister>,
        router: ChatRouter,
    }

    fn fixture() -> Fixture {
        let hub = Arc::new(Hub::new(Arc::new(StaticGroups::new([("7", vec![1, 2, 3])]))));
        let persister = Arc::new(RecordingPersister::default());
        let router = ChatRouter::new(hub.clone(), Some(persister.clone()));
        Fixture {
            hub,
            persister,
            router,
        }
    }

    #[tokio::test]
    async fn private_message_is_delivered_and_saved() {
        let f = fixture();
        let (alice, mut alice_rx) = connect(&f.hub, 1, 8).await;
        let (_bob, mut bob_rx) = connect(&f.hub, 2, 8).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        f.router
            .route_frame(&alice, r#"{"type":"private","to":2,"content":"hi"}"#)
            .await;

        let delivered = drain(&mut bob_rx);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0]["type"], "private");
        assert_eq!(delivered[0]["content"], "hi");
        assert!(drain(&mut alice_rx).is_empty());

        let saved = f.persister.wait_for(1).await;
        assert_eq!(saved[0].0, 1);
        assert_eq!(saved[0].1.content, "hi");
    }

    #[tokio::test]
    async fn private_message_to_offline_user_is_still_saved() {
        let f = fixture();
        let (alice, _alice_rx) = connect(&f.hub, 1, 8).await;

        f.router
            .route_frame(&alice, r#"{"type":"private","to":404,"content":"later"}"#)
            .await;

        let saved = f.persister.wait_for(1).await;
        assert_eq!(saved[0].1.to, Some(404));
    }

    #[tokio::test]
    async fn timestamp_comes_from_the_server() {
        let f = fixture();
        let (alice, _alice_rx) = connect(&f.hub, 1, 8).await;
        let (_bob, mut bob_rx) = connect(&f.hub, 2, 8).await;
        drain(&mut bob_rx);

        let before = Utc::now().timestamp();
        f.router
            .route_frame(
                &alice,
                r#"{"type":"private","to":2,"content":"x","timestamp":1000}"#,
            )
            .await;
        let after = Utc::now().timestamp();

        let delivered = drain(&mut bob_rx);
        let stamped = delivered[0]["timestamp"].as_i64().unwrap();
        assert_ne!(stamped, 1000);
        assert!((before..=after).contains(&stamped));
    }

    #[tokio::test]
    async fn group_message_reaches_other_members_once() {
        let f = fixture();
        let (alice, mut alice_rx) = connect(&f.hub, 1, 8).await;
        let (_bob, mut bob_rx) = connect(&f.hub, 2, 8).await;
        let (_carol, mut carol_rx) = connect(&f.hub, 3, 8).await;
        for rx in [&mut alice_rx, &mut bob_rx, &mut carol_rx] {
            drain(rx);
        }

        f.router
            .route_frame(&alice, r#"{"type":"group","group_id":"7","content":"hey"}"#)
            .await;

        assert!(drain(&mut alice_rx).is_empty());
        for rx in [&mut bob_rx, &mut carol_rx] {
            let delivered = drain(rx);
            assert_eq!(delivered.len(), 1);
            assert_eq!(delivered[0]["group_id"], "7");
        }

        let saved = f.persister.wait_for(1).await;
        assert_eq!(saved[0].1.group_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn group_message_from_outsider_is_dropped() {
        let f = fixture();
        let (_alice, mut alice_rx) = connect(&f.hub, 1, 8).await;
        let (_bob, mut bob_rx) = connect(&f.hub, 2, 8).await;
        let (mallory, mut mallory_rx) = connect(&f.hub, 4, 8).await;
        for rx in [&mut alice_rx, &mut bob_rx, &mut mallory_rx] {
            drain(rx);
        }

        f.router
            .route_frame(&mallory, r#"{"type":"group","group_id":"7","content":"spam"}"#)
            .await;

        for rx in [&mut alice_rx, &mut bob_rx, &mut mallory_rx] {
            assert!(drain(rx).is_empty());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.persister.saved().is_empty());
    }

    #[tokio::test]
    async fn group_message_is_not_saved_when_membership_is_unknown() {
        let hub = Arc::new(Hub::new(Arc::new(FailingGroups)));
        let persister = Arc::new(RecordingPersister::default());
        let router = ChatRouter::new(hub.clone(), Some(persister.clone()));
        let (alice, _alice_rx) = connect(&hub, 1, 8).await;

        router
            .route_frame(&alice, r#"{"type":"group","group_id":"7","content":"hey"}"#)
            .await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(persister.saved().is_empty());
    }

    #[tokio::test]
    async fn bad_frames_are_dropped_without_saving() {
        let f = fixture();
        let (alice, _alice_rx) = connect(&f.hub, 1, 8).await;
        let (_bob, mut bob_rx) = connect(&f.hub, 2, 8).await;
        drain(&mut bob_rx);

        for frame in [
            "not json",
            r#"{"type":"shout","content":"?"}"#,
            r#"{"type":"private","content":"no recipient"}"#,
        ] {
            f.router.route_frame(&alice, frame).await;
        }

        assert!(drain(&mut bob_rx).is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.persister.saved().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_does_not_block_delivery() {
        let hub = Arc::new(Hub::new(Arc::new(StaticGroups::default())));
        let router = ChatRouter::new(hub.clone(), Some(Arc::new(FailingPersister)));
        let (alice, _alice_rx) = connect(&hub, 1, 8).await;
        let (_bob, mut bob_rx) = connect(&hub, 2, 8).await;
        drain(&mut bob_rx);

        router
            .route_frame(&alice, r#"{"type":"private","to":2,"content":"ok"}"#)
            .await;
        assert_eq!(drain(&mut bob_rx).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn burst_is_stored_in_send_order() {
        let pool = init_memory_pool().await.unwrap();
        fixtures::insert_user(&pool, 1, "alice").await;
        fixtures::insert_user(&pool, 2, "bob").await;
        let store = MessageStore::new(pool);

        let hub = Arc::new(Hub::new(Arc::new(StaticGroups::default())));
        let router = ChatRouter::new(hub.clone(), Some(Arc::new(store.clone())));
        let (alice, _alice_rx) = connect(&hub, 1, 8).await;

        for n in 0..200 {
            let frame = format!(r#"{{"type":"private","to":2,"content":"{n}"}}"#);
            router.route_frame(&alice, &frame).await;
        }

        let history = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let page = store
                    .fetch_private_messages_paginated(1, 2, 200, 0)
                    .await
                    .unwrap();
                if page.len() == 200 {
                    return page;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("burst persisted in time");

        let oldest_first: Vec<String> = history.into_iter().rev().map(|m| m.content).collect();
        let sent: Vec<String> = (0..200).map(|n| n.to_string()).collect();
        assert_eq!(oldest_first, sent);
    }
}
