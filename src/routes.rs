use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{groups, history, presence, ws_handler},
    state::AppState,
};

async fn health() -> &'static str {
    "Social realtime server is running."
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/api/users/online", get(presence::online_users))
        .route(
            "/api/messages/private/{user_id}",
            get(history::private_history),
        )
        .route("/api/messages/group/{group_id}", get(history::group_history))
        .route(
            "/api/groups/{group_id}/invites",
            post(groups::invite_to_group),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
