use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderMap, Uri, header, request::Parts},
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::UserIdentity,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CredentialQuery {
    pub token: Option<String>,
}

/// Value of the session cookie named `cookie_name`, if present
pub fn session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Session credential from the cookie, falling back to the `token` query parameter
pub fn session_credential(headers: &HeaderMap, uri: &Uri, cookie_name: &str) -> Option<String> {
    session_cookie(headers, cookie_name).or_else(|| {
        Query::<CredentialQuery>::try_from_uri(uri)
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.is_empty())
    })
}

/// The authenticated caller of an HTTP endpoint
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserIdentity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = session_credential(&parts.headers, &parts.uri, &state.config.session_cookie_name)
            .ok_or_else(|| AppError::Auth("Missing session credential".into()))?;
        let user = state.sessions.resolve(&token).await?;
        Ok(AuthUser(user))
    }
}
