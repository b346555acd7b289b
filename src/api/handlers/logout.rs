use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    api::{error::ApiError, AppState},
    auth::{
        cookie::{
            clear_cookie, extract_access_token, extract_cookie, ACCESS_COOKIE_PATH,
            REFRESH_COOKIE_PATH,
        },
        AuthError,
    },
};

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Revoke the presented tokens and clear both cookies.
///
/// Tokens that no longer decode (expired, tampered) are skipped; there is
/// nothing left to revoke.
pub async fn logout(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Response {
    let cookies = state.config.cookies();
    let refresh = payload
        .and_then(|Json(body)| body.refresh_token)
        .filter(|token| !token.trim().is_empty())
        .or_else(|| extract_cookie(&headers, cookies.refresh_name()));
    let access = extract_access_token(&headers, cookies);

    let now = state.now();
    for token in [access, refresh].into_iter().flatten() {
        let Ok(claims) = state.issuer.codec().decode(&token, now) else {
            continue;
        };
        if let Err(err) = state.revocations.revoke(&claims.jti, claims.exp).await {
            error!(subject = %claims.sub, "Failed to revoke token on logout: {err}");
            return ApiError::from(AuthError::InternalError).into_response();
        }
        debug!(subject = %claims.sub, kind = claims.kind.as_str(), "Revoked token on logout");
    }

    let mut response_headers = HeaderMap::new();
    for (name, path) in [
        (cookies.name(), ACCESS_COOKIE_PATH),
        (cookies.refresh_name(), REFRESH_COOKIE_PATH),
    ] {
        match clear_cookie(cookies, name, path) {
            Ok(cookie) => {
                response_headers.append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build cleared cookie: {err}"),
        }
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}
