use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::Authenticated;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub subject: String,
    pub roles: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

pub async fn session(Authenticated(principal): Authenticated) -> impl IntoResponse {
    let response = SessionResponse {
        issued_at: principal.claims.iat,
        expires_at: principal.claims.exp,
        subject: principal.subject,
        roles: principal.roles,
    };
    (StatusCode::OK, Json(response))
}
