use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use super::token_response;
use crate::{
    api::{error::ApiError, AppState},
    auth::{
        credentials::{normalize_subject, valid_email},
        AuthError,
    },
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::bad_request(rejection.body_text()).into_response(),
    };

    if !valid_email(&normalize_subject(&request.email)) {
        return ApiError::bad_request("Invalid email address").into_response();
    }

    let principal = match state
        .authenticator
        .login(&request.email, &request.password)
        .await
    {
        Ok(principal) => principal,
        Err(err) => return ApiError::from(err).into_response(),
    };

    match state
        .issuer
        .issue_access_and_refresh(&principal, state.now())
    {
        Ok(pair) => {
            info!(subject = %principal.subject, "Login succeeded");
            token_response(&pair, state.config.cookies())
        }
        Err(err) => {
            error!(subject = %principal.subject, "Failed to issue tokens: {err}");
            ApiError::from(AuthError::InternalError).into_response()
        }
    }
}
