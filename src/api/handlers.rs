use axum::{http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::{
    DailyAggregator, Exporter, MetricsMerger, RangeAggregator, SnapshotProvider,
};
use crate::config::AnalyticsConfig;
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub daily: Arc<DailyAggregator>,
    pub range: RangeAggregator,
    pub merger: Arc<MetricsMerger>,
    pub exporter: Exporter,
    pub snapshots: Arc<dyn SnapshotProvider>,
    pub config: AnalyticsConfig,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        snapshots: Arc<dyn SnapshotProvider>,
        config: AnalyticsConfig,
    ) -> Self {
        let daily = Arc::new(DailyAggregator::new(Arc::clone(&storage), config.clone()));
        let merger = Arc::new(MetricsMerger::new(
            Arc::clone(&storage),
            Arc::clone(&snapshots),
            config.clone(),
        ));

        Self {
            range: RangeAggregator::new(Arc::clone(&daily)),
            exporter: Exporter::new(Arc::clone(&storage), Arc::clone(&merger), config.clone()),
            storage,
            daily,
            merger,
            snapshots,
            config,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

pub fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
