//! Gate middleware and the extractor handlers use to read its decision.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, SET_COOKIE},
        request::Parts,
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{error::ApiError, AppState};
use crate::auth::{
    cookie::{token_cookie, ACCESS_COOKIE_PATH},
    AuthError, AuthenticatedPrincipal, AuthenticationDecision, CookieSettings, IssuedToken,
};

/// Run the gate for every request.
///
/// Rejections short-circuit with the error body. Otherwise the decision is
/// stored in request extensions, and a proactively reissued access token is
/// attached to whatever the handler returned.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let outcome = state.gate.authenticate(&path, request.headers()).await;

    match outcome.decision {
        AuthenticationDecision::Rejected(err) => {
            debug!(path = %path, code = err.code(), "Request rejected");
            return ApiError::from(err).into_response();
        }
        decision => {
            request.extensions_mut().insert(decision);
        }
    }

    let mut response = next.run(request).await;
    if let Some(issued) = outcome.refreshed {
        attach_refreshed(&mut response, state.config.cookies(), &issued);
    }
    response
}

fn attach_refreshed(response: &mut Response, cookies: &CookieSettings, issued: &IssuedToken) {
    match HeaderValue::from_str(&format!("Bearer {}", issued.token)) {
        Ok(value) => {
            response.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(err) => error!("Failed to build refreshed Authorization header: {err}"),
    }
    match token_cookie(
        cookies,
        cookies.name(),
        ACCESS_COOKIE_PATH,
        &issued.token,
        issued.claims.lifetime(),
    ) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build refreshed access cookie: {err}"),
    }
}

/// The authenticated principal of the current request.
///
/// Rejects with `MissingToken` on allow-listed paths, where no token was checked.
#[derive(Clone, Debug)]
pub struct Authenticated(pub AuthenticatedPrincipal);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthenticationDecision>() {
            Some(AuthenticationDecision::Authenticated(principal)) => {
                Ok(Self(principal.clone()))
            }
            Some(AuthenticationDecision::Rejected(err)) => Err(ApiError::from(*err)),
            Some(AuthenticationDecision::Anonymous) | None => {
                Err(ApiError::from(AuthError::MissingToken))
            }
        }
    }
}
