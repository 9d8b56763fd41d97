use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::{HeaderMap, Uri},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    handlers::auth::session_credential,
    state::AppState,
    ws::handle_socket,
};

/// Handler for WebSocket connections
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let credential = session_credential(&headers, &uri, &state.config.session_cookie_name);
    ws.on_upgrade(move |socket| handle_websocket(socket, state, credential))
}

/// Resolve the caller, then hand the socket to the hub
async fn handle_websocket(mut socket: WebSocket, state: AppState, credential: Option<String>) {
    let resolved = match credential {
        Some(token) => state.sessions.resolve(&token).await,
        None => Err(AppError::Auth("Missing session credential".into())),
    };

    let user = match resolved {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Rejecting websocket connection: {}", e);
            let frame = CloseFrame {
                code: close_code::POLICY,
                reason: "unauthorized".into(),
            };
            if let Err(e) = socket.send(Message::Close(Some(frame))).await {
                tracing::debug!("Close frame not sent: {}", e);
            }
            return;
        }
    };

    handle_socket(
        socket,
        user,
        state.hub.clone(),
        state.router.clone(),
        state.config.outbound_queue_capacity,
    )
    .await;
}
