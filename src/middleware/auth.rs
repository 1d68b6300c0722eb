//! API-key authentication.
//!
//! Customers authenticate with their personal key, either as
//! `Authorization: Bearer <key>` or an `x-api-key` header. Admin
//! routes sit behind a separate shared key checked by [`admin_auth`].

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::db::models::User;
use crate::error::AppError;
use crate::AppState;

/// The authenticated caller, resolved from the API key header.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = api_key_from(parts)
            .ok_or_else(|| AppError::Unauthorized("API key required".to_string()))?;

        let user = state
            .store
            .find_user_by_api_key(&key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid API key".to_string()))?;

        Ok(AuthedUser(user))
    }
}

fn api_key_from(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }
    parts
        .headers
        .get("x-api-key")
        .and_then(|h| h.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Gate for `/admin` routes. Accepts the shared admin key bare or as a
/// bearer token.
pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let admin_api_key = &state.config.admin_api_key;

    match auth_header {
        Some(auth) if auth == format!("Bearer {admin_api_key}") || auth == *admin_api_key => {
            Ok(next.run(req).await)
        }
        _ => Err(AppError::Unauthorized(
            "admin credentials required".to_string(),
        )),
    }
}
