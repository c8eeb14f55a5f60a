use axum::{
    extract::DefaultBodyLimit,
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{SecondsFormat, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;

use crate::auth::{api as auth_api, auth_middleware, AuthState};
use crate::middleware::request_logging;

/// JSON bodies above this are rejected before a handler runs
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the API router
///
/// `/api/auth/me` and `/api/auth/change-password` sit behind the session
/// middleware; everything else under `/api/auth` is public.
pub fn create_router(state: AuthState, metrics: Option<PrometheusHandle>) -> Router {
    let protected = Router::new()
        .route("/me", get(auth_api::get_me).put(auth_api::update_me))
        .route("/change-password", put(auth_api::change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let auth_routes = Router::new()
        .route("/register", post(auth_api::register))
        .route("/login", post(auth_api::login))
        .route("/logout", post(auth_api::logout))
        .route("/forgot-password", post(auth_api::forgot_password))
        .route("/reset-password", post(auth_api::reset_password))
        .merge(protected);

    let mut router = Router::new()
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health_check))
        .with_state(state);

    if let Some(handle) = metrics {
        router = router.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(request_logging))
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn not_found(uri: Uri) -> Response {
    let message = if uri.path().starts_with("/api/") {
        "Endpoint not found"
    } else {
        "Not found"
    };
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}
