// Router configuration

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{health_handlers::*, workspace_handlers::*},
    observability,
    state::AppState,
    webhook,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        // Health & Info
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        // Workspaces
        .route("/api/workspaces", get(list_workspaces_handler))
        .route("/api/workspaces/add-member", post(add_member_handler))
        // Identity-provider events
        .route(
            "/api/webhooks/identity",
            post(webhook::identity_webhook_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(observability::request_context_layer())
        .with_state(state)
}
