//! Analytics API handlers

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{error_response, AppState};
use crate::analytics::{calendar, time_series, AnalyticsError, DateRange, ExportFormat};
use crate::models::{DailySummary, MergedMetrics, RealtimeSnapshot, TimeSeriesPoint};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    pub website_id: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339; defaults to the website's today
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AggregateResponse {
    pub success: bool,
    pub summary: DailySummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronQueryParams {
    pub website_id: Option<String>,
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronResponse {
    pub success: bool,
    pub message: String,
    pub processed_days: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQueryParams {
    pub website_id: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    #[serde(default)]
    pub realtime: bool,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeQueryParams {
    pub website_id: Option<String>,
}

/// One message on the real-time stream
#[derive(Debug, Serialize)]
pub struct RealtimeUpdate {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: RealtimeSnapshot,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub metrics: MergedMetrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesResponse {
    pub time_series_data: Vec<TimeSeriesPoint>,
}

/// Accepts `2024-05-01` as well as full timestamps such as
/// `2024-05-01T00:00:00.000Z`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

async fn today_for(state: &AppState, website_id: &str) -> Result<NaiveDate, AnalyticsError> {
    let tz = calendar::website_timezone(
        state.storage.as_ref(),
        website_id,
        &state.config.default_timezone,
    )
    .await?;
    Ok(calendar::today_in(tz, Utc::now()))
}

fn analytics_failure(context: &str, e: AnalyticsError) -> axum::response::Response {
    match e {
        AnalyticsError::InvalidRange { .. } => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        other => {
            tracing::error!(error = %other, "{}", context);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                .into_response()
        }
    }
}

/// Resolve `fromDate`/`toDate`; a missing bound defaults to the last 7 days
async fn resolve_range(
    state: &AppState,
    website_id: &str,
    params: &RangeQueryParams,
    required: bool,
) -> Result<DateRange, axum::response::Response> {
    let from = params.from_date.as_deref().map(parse_date);
    let to = params.to_date.as_deref().map(parse_date);

    let (from, to) = match (from, to) {
        (Some(None), _) | (_, Some(None)) => {
            return Err(error_response(StatusCode::BAD_REQUEST, "Invalid date").into_response())
        }
        (Some(Some(from)), Some(Some(to))) => (from, to),
        _ if required => {
            return Err(
                error_response(StatusCode::BAD_REQUEST, "Date range is required").into_response(),
            )
        }
        (from, to) => {
            let today = today_for(state, website_id)
                .await
                .map_err(|e| analytics_failure("Failed to resolve website timezone", e))?;
            let to = to.flatten().unwrap_or(today);
            let from = match from.flatten() {
                Some(from) => from,
                None => to.checked_sub_signed(Duration::days(6)).ok_or_else(|| {
                    error_response(StatusCode::BAD_REQUEST, "Invalid date").into_response()
                })?,
            };
            (from, to)
        }
    };

    DateRange::new(from, to).map_err(|e| analytics_failure("Invalid date range", e))
}

fn require_website(website_id: &Option<String>) -> Result<&str, axum::response::Response> {
    match website_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(error_response(StatusCode::BAD_REQUEST, "Website ID is required").into_response()),
    }
}

/// Aggregate one day for one website
pub async fn aggregate_day(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AggregateRequest>,
) -> impl IntoResponse {
    let website_id = match require_website(&payload.website_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let day = match payload.date.as_deref() {
        Some(raw) => match parse_date(raw) {
            Some(day) => day,
            None => return error_response(StatusCode::BAD_REQUEST, "Invalid date").into_response(),
        },
        None => match today_for(&state, website_id).await {
            Ok(today) => today,
            Err(e) => return analytics_failure("Failed to resolve website timezone", e),
        },
    };

    match state.daily.aggregate(website_id, day).await {
        Ok(summary) => Json(AggregateResponse {
            success: true,
            summary,
        })
        .into_response(),
        Err(e) => analytics_failure("Error aggregating analytics data", e),
    }
}

/// Re-aggregate the last `days` days up to and including today
pub async fn cron_aggregate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CronQueryParams>,
) -> impl IntoResponse {
    let website_id = match require_website(&params.website_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    if !(0..=366).contains(&params.days) {
        return error_response(StatusCode::BAD_REQUEST, "days must be between 0 and 366")
            .into_response();
    }

    let end = match today_for(&state, website_id).await {
        Ok(today) => today,
        Err(e) => return analytics_failure("Failed to resolve website timezone", e),
    };
    let Some(start) = end.checked_sub_signed(Duration::days(params.days)) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid date").into_response();
    };

    tracing::info!(website_id, %start, %end, "Starting cron aggregation");
    let results = state.range.aggregate_range(website_id, start, end).await;

    Json(CronResponse {
        success: true,
        message: format!("Aggregated data for {} days", results.len()),
        processed_days: results.len(),
        date_range: DateRange { from: start, to: end },
    })
    .into_response()
}

/// Merged metrics for a date range
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQueryParams>,
) -> impl IntoResponse {
    let website_id = match require_website(&params.website_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let range = match resolve_range(&state, website_id, &params, false).await {
        Ok(range) => range,
        Err(response) => return response,
    };

    match state
        .merger
        .get_metrics(website_id, range, params.realtime)
        .await
    {
        Ok(metrics) => Json(MetricsResponse { metrics }).into_response(),
        Err(e) => analytics_failure("Error fetching metrics", e),
    }
}

/// Server-sent events carrying a fresh snapshot every few seconds,
/// the first one right away. The stream ends when the client disconnects.
pub async fn stream_realtime_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RealtimeQueryParams>,
) -> impl IntoResponse {
    let website_id = match require_website(&params.website_id) {
        Ok(id) => id.to_string(),
        Err(response) => return response,
    };
    let snapshots = Arc::clone(&state.snapshots);
    let period = std::time::Duration::from_secs(state.config.realtime_interval_secs.max(1));

    tracing::debug!(website_id = %website_id, "Opening realtime stream");

    let updates = async_stream::stream! {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match snapshots.snapshot(&website_id).await {
                Ok(snapshot) => {
                    yield Event::default().json_data(RealtimeUpdate {
                        timestamp: Utc::now(),
                        snapshot,
                    });
                }
                Err(e) => {
                    tracing::warn!(website_id = %website_id, error = %e, "Failed to compute realtime snapshot");
                }
            }
        }
    };

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(updates).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// Per-day chart data
pub async fn get_time_series(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQueryParams>,
) -> impl IntoResponse {
    let website_id = match require_website(&params.website_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let range = match resolve_range(&state, website_id, &params, true).await {
        Ok(range) => range,
        Err(response) => return response,
    };

    match time_series(state.storage.as_ref(), website_id, range.from, range.to).await {
        Ok(time_series_data) => Json(TimeSeriesResponse { time_series_data }).into_response(),
        Err(e) => analytics_failure("Error fetching time series data", e),
    }
}

/// Download metrics and raw rows as JSON or CSV
pub async fn export_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeQueryParams>,
) -> impl IntoResponse {
    let website_id = match require_website(&params.website_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let format = match params.format.as_deref().map(str::parse::<ExportFormat>) {
        None => ExportFormat::default(),
        Some(Ok(format)) => format,
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, &e).into_response(),
    };
    let range = match resolve_range(&state, website_id, &params, true).await {
        Ok(range) => range,
        Err(response) => return response,
    };

    match state.exporter.export(website_id, range, format).await {
        Ok(body) => {
            let extension = match format {
                ExportFormat::Json => "json",
                ExportFormat::Csv => "csv",
            };
            let disposition = format!(
                "attachment; filename=\"analytics-{}-{}-{}.{}\"",
                website_id, range.from, range.to, extension
            );
            (
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => analytics_failure("Error exporting analytics data", e),
    }
}
