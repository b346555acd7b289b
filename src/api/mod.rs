use crate::{
    api::handlers::{admin, health, login, logout, refresh, session},
    auth::{
        spawn_sweeper, AuthConfig, AuthenticationGate, Authenticator, Clock, PrincipalStore,
        RevocationStore, SigningKey, TokenCodec, TokenIssuer,
    },
    cli::telemetry,
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod error;
pub(crate) mod handlers;
pub mod middleware;

pub use error::{ApiError, ErrorBody};
pub use middleware::Authenticated;

/// Everything the handlers and the gate middleware share.
pub struct AppState {
    pub authenticator: Authenticator,
    pub issuer: TokenIssuer,
    pub gate: AuthenticationGate,
    pub revocations: Arc<dyn RevocationStore>,
    pub principals: Arc<dyn PrincipalStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<AuthConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        key: SigningKey,
        config: AuthConfig,
        principals: Arc<dyn PrincipalStore>,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let issuer = TokenIssuer::new(TokenCodec::new(Arc::new(key), config.token_lifetimes()));
        let authenticator =
            Authenticator::new(principals.clone(), config.lockout_policy(), clock.clone());
        let gate = AuthenticationGate::new(
            issuer.clone(),
            revocations.clone(),
            principals.clone(),
            clock.clone(),
            config.clone(),
        );
        Self {
            authenticator,
            issuer,
            gate,
            revocations,
            principals,
            clock,
            config,
        }
    }

    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Build the application router with the gate on every route.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/api/auth/login", post(login::login))
        .route("/api/auth/refresh", post(refresh::refresh))
        .route("/api/auth/logout", post(logout::logout))
        .route("/api/auth/session", get(session::session))
        .route(
            "/api/admin/principals/:subject/unlock",
            post(admin::unlock_principal),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn serve(port: u16, state: Arc<AppState>) -> Result<()> {
    let sweeper = spawn_sweeper(
        state.revocations.clone(),
        state.clock.clone(),
        Duration::from_secs(state.config.revocation_sweep_seconds()),
    );

    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    sweeper.abort();
    telemetry::shutdown_tracer();

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
