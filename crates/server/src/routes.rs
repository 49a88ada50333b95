pub mod admin;
pub mod auth;

use axum::{
    http::{header, HeaderName, Method},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::{metrics, types::Health};

use self::auth::ServerState;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn prometheus_metrics() -> impl IntoResponse {
    metrics::encode_metrics()
}

/// CORS for the public and key-protected routes: any origin, read-only, no
/// credentials. Admin routes get no CORS headers at all.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([HeaderName::from_static("x-api-key"), header::CONTENT_TYPE])
}

/// Build the full application router: public, key-protected and admin routes.
/// `cors` applies to the public and key-protected routes only.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics));

    let api = Router::new()
        .route("/api/whoami", get(auth::whoami))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    let admin_routes = Router::new()
        .route(
            "/admin/services",
            get(admin::list_services).post(admin::create_service).delete(admin::remove_services),
        )
        .route("/admin/services/reload", post(admin::reload_services))
        // one parameter name per segment: `:id` is a service id for GET/PUT
        // and an identifier for DELETE
        .route(
            "/admin/services/:id",
            get(admin::get_service).put(admin::update_service).delete(admin::remove_service),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin_key));

    public
        .merge(api)
        .layer(cors)
        .merge(admin_routes)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
