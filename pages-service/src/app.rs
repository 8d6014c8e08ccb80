use axum::extract::State;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method, StatusCode,
};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::error;

use crate::analytics_handlers::{event_analytics, log_event, recent_events};
use crate::app_state::AppState;
use crate::metrics::track_http_errors;
use crate::page_handlers::{
    count_pages, create_page, create_upload, delete_page, get_page, list_pages, publish_page,
    search_pages, update_page,
};
use crate::user_handlers::{me, profile, protected, public};

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(resp) => resp,
        Err(err) => {
            error!(?err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/public", get(public))
        .route("/protected", get(protected))
        .route("/user/profile", get(profile))
        .route("/user/me", get(me))
        .route("/pages", post(create_page).get(list_pages))
        .route("/pages/count", get(count_pages))
        .route("/pages/search", get(search_pages))
        .route(
            "/pages/:id/:title",
            get(get_page).put(update_page).delete(delete_page),
        )
        .route("/pages/:id/:title/publish", post(publish_page))
        .route("/pages/:id/uploads", post(create_upload))
        .route("/analytics", get(recent_events))
        .route("/analytics/event", get(event_analytics))
        .route("/analytics/log", post(log_event))
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api/v1", api_routes())
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_http_errors,
        ))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
