use axum::{Json, extract::State};

use crate::{handlers::auth::AuthUser, models::OnlineUser, state::AppState};

/// Users with a live connection right now
pub async fn online_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Json<Vec<OnlineUser>> {
    Json(state.hub.get_online_users().await)
}
