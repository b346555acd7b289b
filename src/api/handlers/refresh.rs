//! Refresh-token rotation: the presented refresh token is revoked and a new
//! pair is issued with roles from the current principal. Revoking doubles as
//! the claim, so concurrent refreshes with one token rotate it once.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::token_response;
use crate::{
    api::{error::ApiError, AppState},
    auth::{cookie::extract_cookie, AuthError, TokenKind},
};

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

pub async fn refresh(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Response {
    let token = payload
        .and_then(|Json(body)| body.refresh_token)
        .filter(|token| !token.trim().is_empty())
        .or_else(|| extract_cookie(&headers, state.config.cookies().refresh_name()));
    let Some(token) = token else {
        return ApiError::from(AuthError::MissingToken).into_response();
    };

    let now = state.now();
    let (claims, principal) = match state.gate.validate(&token, TokenKind::Refresh, now).await {
        Ok(validated) => validated,
        Err(err) => return ApiError::from(err).into_response(),
    };

    // Only the request that revokes the old token may rotate it.
    match state.revocations.revoke(&claims.jti, claims.exp).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(subject = %claims.sub, "Refresh token already rotated");
            return ApiError::from(AuthError::Revoked).into_response();
        }
        Err(err) => {
            error!(subject = %claims.sub, "Failed to revoke rotated refresh token: {err}");
            return ApiError::from(AuthError::InternalError).into_response();
        }
    }

    match state.issuer.issue_access_and_refresh(&principal, now) {
        Ok(pair) => {
            debug!(subject = %principal.subject, "Rotated refresh token");
            token_response(&pair, state.config.cookies())
        }
        Err(err) => {
            error!(subject = %principal.subject, "Failed to issue tokens: {err}");
            ApiError::from(AuthError::InternalError).into_response()
        }
    }
}
