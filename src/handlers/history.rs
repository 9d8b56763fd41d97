use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    handlers::auth::AuthUser,
    models::StoredMessage,
    state::AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// `(limit, offset)` with the limit clamped to 1..=100
    pub fn bounds(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// Conversation between the caller and `user_id`, newest first
pub async fn private_history(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<StoredMessage>>> {
    let (limit, offset) = page.bounds();
    let messages = state
        .messages
        .fetch_private_messages_paginated(caller.id, user_id, limit, offset)
        .await?;
    Ok(Json(messages))
}

/// Messages of a group the caller belongs to, newest first
pub async fn group_history(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(group_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<StoredMessage>>> {
    state.groups.get_group(&group_id).await?;
    if !state.groups.is_member(&group_id, caller.id).await? {
        return Err(AppError::Forbidden(format!("not a member of group {group_id}")));
    }

    let (limit, offset) = page.bounds();
    let messages = state
        .messages
        .fetch_group_messages_paginated(&group_id, limit, offset)
        .await?;
    Ok(Json(messages))
}
