use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    handlers::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteResponse {
    pub invited: bool,
    pub notified: bool,
}

/// Invite a user into a group and tell them right away if they are online
pub async fn invite_to_group(
    State(state): State<AppState>,
    AuthUser(inviter): AuthUser,
    Path(group_id): Path<String>,
    Json(request): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>)> {
    let group = state.groups.get_group(&group_id).await?;
    if !state.groups.is_member(&group_id, inviter.id).await? {
        return Err(AppError::Forbidden(format!("not a member of group {group_id}")));
    }
    if !state.groups.user_exists(request.user_id).await? {
        return Err(AppError::NotFound(format!("user {}", request.user_id)));
    }
    if request.user_id == inviter.id || state.groups.is_member(&group_id, request.user_id).await? {
        return Err(AppError::BadRequest("user is already a member".into()));
    }

    let invited = state
        .groups
        .create_invite(&group_id, request.user_id, inviter.id)
        .await?;
    let notified = state
        .notifier
        .send_group_invite(request.user_id, &group.id, &group.title, &inviter)
        .await;

    tracing::info!(
        group_id = %group.id,
        inviter_id = inviter.id,
        invitee_id = request.user_id,
        notified,
        "Group invite sent"
    );

    let status = if invited { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(InviteResponse { invited, notified })))
}
