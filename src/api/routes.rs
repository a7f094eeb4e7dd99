use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::{auth_middleware, AuthService};

use super::analytics::{
    aggregate_day, cron_aggregate, export_data, get_metrics, get_time_series,
    stream_realtime_metrics,
};
use super::handlers::{health_check, AppState};
use super::websites::{create_website, delete_website, get_website, list_websites, update_website};

pub fn create_api_router(state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let protected_routes = Router::new()
        .route("/api/aggregate", post(aggregate_day))
        .route("/api/cron/aggregate", get(cron_aggregate))
        .route("/api/websites", get(list_websites).post(create_website))
        .route(
            "/api/websites/{id}",
            get(get_website).put(update_website).delete(delete_website),
        )
        .route_layer(middleware::from_fn_with_state(auth_service, auth_middleware))
        .with_state(Arc::clone(&state));

    let public_routes = Router::new()
        .route("/api/metrics", get(get_metrics))
        .route("/api/time-series", get(get_time_series))
        .route("/api/export", get(export_data))
        .route("/api/realtime-metrics", get(stream_realtime_metrics))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .merge(public_routes)
        .layer(CorsLayer::permissive())
}
