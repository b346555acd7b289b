use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    api::{error::ApiError, middleware::Authenticated, AppState},
    auth::{AuthError, ADMIN_ROLE},
};

/// Clear the lock and failure counter of `subject`. Requires the `ADMIN` role.
pub async fn unlock_principal(
    Authenticated(caller): Authenticated,
    state: Extension<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Response {
    if !caller.has_role(ADMIN_ROLE) {
        warn!(subject = %caller.subject, "Unlock attempted without admin role");
        return ApiError::from(AuthError::Forbidden).into_response();
    }

    match state.authenticator.unlock(&subject).await {
        Ok(true) => {
            info!(admin = %caller.subject, subject = %subject, "Unlocked principal");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => ApiError::not_found("Principal not found").into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
