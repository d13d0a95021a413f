//! HTTP routes
//!
//! `/login`, `/callback` and `/logout` drive the authorization flow in
//! `pkce_auth`; this module only adapts requests and sessions to it and turns
//! outcomes into redirects and pages.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use pkce_auth::{CallbackQuery, ProviderConfig};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};
use tracing::{error, info, instrument};
use url::Url;

use crate::config::ServerConfig;
use crate::session::{COOKIE_NAME, CookieSession, signing_key};
use crate::{metrics, pages};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ProviderConfig>,
    pub http: reqwest::Client,
    pub started_at: Instant,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes, the session layer and shared state.
///
/// Sessions live in memory and are keyed by a signed cookie. The cookie is
/// marked `Secure` whenever the listener serves TLS.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name(COOKIE_NAME)
        .with_same_site(SameSite::Lax)
        .with_secure(server.tls.is_some())
        .with_signed(signing_key(server.session_secret.expose()));

    let router = Router::new()
        .route("/login", get(login_handler))
        .route("/callback", get(callback_handler))
        .route("/logout", get(logout_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    let router = match &server.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/", get(index_handler)),
    };

    router
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            server.max_connections,
        ))
        .with_state(state)
}

fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// 302 Found to `location`.
fn found(location: &Url) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.as_str())]).into_response()
}

fn error_response(err: &pkce_auth::Error) -> Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, pages::error(err.user_message())).into_response()
}

#[instrument(skip_all, fields(request_id = %request_id()))]
async fn login_handler(State(state): State<AppState>, session: Session) -> Response {
    let session = CookieSession::new(session);
    match pkce_auth::begin_authorization(&session, &state.provider).await {
        Ok(params) => {
            metrics::record_login();
            info!("redirecting to authorization endpoint");
            found(&params.authorization_url(&state.provider.authorization_url))
        }
        Err(e) => {
            error!(error = %e, kind = e.kind(), "cannot start authorization");
            error_response(&e)
        }
    }
}

#[instrument(skip_all, fields(request_id = %request_id()))]
async fn callback_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let session = CookieSession::new(session);
    match pkce_auth::handle_callback(&state.http, &state.provider, &session, query).await {
        Ok(summary) => {
            metrics::record_callback("success");
            (StatusCode::OK, pages::login_success(&summary)).into_response()
        }
        Err(e) => {
            metrics::record_callback(e.kind());
            error_response(&e)
        }
    }
}

#[instrument(skip_all, fields(request_id = %request_id()))]
async fn logout_handler(State(state): State<AppState>, session: Session) -> Response {
    let session = CookieSession::new(session);
    match pkce_auth::logout(&session, &state.provider).await {
        Ok(url) => {
            metrics::record_logout();
            found(&url)
        }
        Err(e) => {
            error!(error = %e, "session could not be destroyed");
            error_response(&e)
        }
    }
}

async fn index_handler() -> impl IntoResponse {
    pages::index()
}

/// Liveness: status and uptime.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
