pub mod admin;
pub mod health;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod session;

use axum::{
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::{
    cookie::{token_cookie, ACCESS_COOKIE_PATH, REFRESH_COOKIE_PATH},
    AuthError, CookieSettings, TokenPair,
};

use super::error::ApiError;

/// Body returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Respond with a token pair in the body and as access and refresh cookies.
pub(crate) fn token_response(pair: &TokenPair, cookies: &CookieSettings) -> Response {
    let access = token_cookie(
        cookies,
        cookies.name(),
        ACCESS_COOKIE_PATH,
        &pair.access.token,
        pair.access.claims.lifetime(),
    );
    let refresh = token_cookie(
        cookies,
        cookies.refresh_name(),
        REFRESH_COOKIE_PATH,
        &pair.refresh.token,
        pair.refresh.claims.lifetime(),
    );

    let mut response_headers = HeaderMap::new();
    match (access, refresh) {
        (Ok(access), Ok(refresh)) => {
            response_headers.append(SET_COOKIE, access);
            response_headers.append(SET_COOKIE, refresh);
        }
        (Err(err), _) | (_, Err(err)) => {
            error!("Failed to build token cookies: {err}");
            return ApiError::from(AuthError::InternalError).into_response();
        }
    }

    let body = TokenResponse {
        access_token: pair.access.token.clone(),
        refresh_token: pair.refresh.token.clone(),
        token_type: "Bearer".to_string(),
        expires_in: pair.access.claims.lifetime(),
    };
    (StatusCode::OK, response_headers, Json(body)).into_response()
}
