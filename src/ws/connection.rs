use std::{fmt::Display, sync::Arc, time::Duration};

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use chrono::{DateTime, Utc};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{Notify, mpsc, mpsc::error::TrySendError};
use uuid::Uuid;

use crate::{
    models::{OnlineUser, UserIdentity},
    ws::{MessageRouter, SharedHub},
};

/// How long teardown waits for the write loop to flush its close frame
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One authenticated user's live socket and its bounded outbound queue
pub struct Connection {
    id: Uuid,
    user: UserIdentity,
    sender: mpsc::Sender<Utf8Bytes>,
    connected_at: DateTime<Utc>,
    close_signal: Notify,
}

impl Connection {
    /// Create a connection and the receiving end of its outbound queue
    pub fn new(user: UserIdentity, queue_capacity: usize) -> (Arc<Self>, mpsc::Receiver<Utf8Bytes>) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            user,
            sender,
            connected_at: Utc::now(),
            close_signal: Notify::new(),
        });
        (connection, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn online_user(&self) -> OnlineUser {
        OnlineUser {
            user_id: self.user.id,
            nickname: self.user.nickname.clone(),
            avatar: self.user.avatar.clone(),
            connected_at: self.connected_at,
        }
    }

    /// Queue a payload without waiting. Returns false if it was dropped.
    pub fn try_send(&self, payload: Utf8Bytes) -> bool {
        match self.sender.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    user_id = self.user.id,
                    connection_id = %self.id,
                    "Outbound queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(
                    user_id = self.user.id,
                    connection_id = %self.id,
                    "Outbound queue closed, dropping message"
                );
                false
            }
        }
    }

    /// Ask the write loop to send a close frame and stop
    pub fn close(&self) {
        self.close_signal.notify_one();
    }

    /// Resolves once `close` has been called
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }
}

/// Drain the outbound queue into the socket, in order, until a write fails or close is requested.
///
/// Payloads already queued when close is requested are written before the close frame.
pub async fn run_write_loop<W>(
    connection: Arc<Connection>,
    mut outbound: mpsc::Receiver<Utf8Bytes>,
    mut sink: W,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    loop {
        tokio::select! {
            biased;

            next = outbound.recv() => {
                let Some(payload) = next else { break };
                if let Err(e) = sink.send(Message::Text(payload)).await {
                    tracing::error!(
                        user_id = connection.user_id(),
                        "Error sending WebSocket message: {}",
                        e
                    );
                    return;
                }
            }
            _ = connection.closed() => {
                let frame = CloseFrame {
                    code: close_code::NORMAL,
                    reason: "connection closed".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!(user_id = connection.user_id(), "Close frame not sent: {}", e);
                }
                return;
            }
        }
    }
}

/// Read frames until the client goes away, handing text frames to the router.
///
/// A frame the router cannot use is dropped; it never ends the loop.
pub async fn run_read_loop<R, E>(router: &dyn MessageRouter, connection: &Connection, mut stream: R)
where
    R: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                tracing::debug!(user_id = connection.user_id(), "Received message: {}", text);
                router.route_frame(connection, text.as_str()).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(user_id = connection.user_id(), "Ignoring binary message");
            }
            // pongs are produced by the transport itself
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::info!(user_id = connection.user_id(), "Client sent close frame");
                break;
            }
            Err(e) => {
                tracing::warn!(user_id = connection.user_id(), "WebSocket error: {}", e);
                break;
            }
        }
    }
}

/// Handle an authenticated WebSocket connection
pub async fn handle_socket(
    socket: WebSocket,
    user: UserIdentity,
    hub: SharedHub,
    router: Arc<dyn MessageRouter>,
    queue_capacity: usize,
) {
    let (sender, receiver) = socket.split();
    serve_connection(sender, receiver, user, hub, router, queue_capacity).await;
}

/// Register, run both loops, then unregister before the transport is released.
pub async fn serve_connection<W, R, E>(
    sink: W,
    stream: R,
    user: UserIdentity,
    hub: SharedHub,
    router: Arc<dyn MessageRouter>,
    queue_capacity: usize,
) where
    W: Sink<Message> + Send + Unpin + 'static,
    W::Error: Display + Send,
    R: Stream<Item = std::result::Result<Message, E>> + Send + Unpin,
    E: Display + Send,
{
    let (connection, outbound) = Connection::new(user, queue_capacity);
    let user_id = connection.user_id();
    tracing::info!(user_id, connection_id = %connection.id(), "New websocket connection");

    hub.register(connection.clone()).await;

    let mut writer = tokio::spawn(run_write_loop(connection.clone(), outbound, sink));

    let writer_finished = tokio::select! {
        _ = run_read_loop(router.as_ref(), &connection, stream) => false,
        _ = &mut writer => true,
    };

    hub.unregister_connection(&connection).await;
    connection.close();

    if !writer_finished
        && tokio::time::timeout(WRITER_SHUTDOWN_GRACE, &mut writer)
            .await
            .is_err()
    {
        tracing::warn!(user_id, "Write loop did not stop in time, aborting");
        writer.abort();
    }

    tracing::info!(user_id, connection_id = %connection.id(), "WebSocket connection closed");
}
