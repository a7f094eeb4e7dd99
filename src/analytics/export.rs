//! JSON and CSV exports of a website's metrics and raw rows.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::calendar;
use super::error::{AnalyticsError, AnalyticsResult};
use super::metrics::{DateRange, MetricsMerger};
use crate::config::AnalyticsConfig;
use crate::models::{MergedMetrics, RawEvent, RawPageView, RawSession};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unsupported export format '{other}'")),
        }
    }
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub sessions: usize,
    pub page_views: usize,
    pub events: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub website_id: String,
    pub date_range: DateRange,
    pub exported_at: DateTime<Utc>,
    pub total_records: RecordCounts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub metadata: ExportMetadata,
    pub summary: MergedMetrics,
    pub sessions: Vec<RawSession>,
    pub page_views: Vec<RawPageView>,
    pub events: Vec<RawEvent>,
}

pub struct Exporter {
    storage: Arc<dyn Storage>,
    merger: Arc<MetricsMerger>,
    config: AnalyticsConfig,
}

impl Exporter {
    pub fn new(storage: Arc<dyn Storage>, merger: Arc<MetricsMerger>, config: AnalyticsConfig) -> Self {
        Self {
            storage,
            merger,
            config,
        }
    }

    /// Collect the merged metrics and the raw rows of `range`
    pub async fn collect(&self, website_id: &str, range: DateRange) -> AnalyticsResult<ExportData> {
        let summary = self.merger.get_metrics(website_id, range, false).await?;

        let tz = calendar::website_timezone(
            self.storage.as_ref(),
            website_id,
            &self.config.default_timezone,
        )
        .await?;
        let (from, _) = calendar::day_bounds(tz, range.from)?;
        let (_, to) = calendar::day_bounds(tz, range.to)?;
        let limit = Some(self.config.export_row_limit);

        let sessions = self.storage.sessions_between(website_id, from, to, limit).await?;
        let page_views = self
            .storage
            .page_views_between(website_id, from, to, limit)
            .await?;
        let events = self.storage.events_between(website_id, from, to, limit).await?;

        Ok(ExportData {
            metadata: ExportMetadata {
                website_id: website_id.to_string(),
                date_range: range,
                exported_at: Utc::now(),
                total_records: RecordCounts {
                    sessions: sessions.len(),
                    page_views: page_views.len(),
                    events: events.len(),
                },
            },
            summary,
            sessions,
            page_views,
            events,
        })
    }

    pub async fn export(
        &self,
        website_id: &str,
        range: DateRange,
        format: ExportFormat,
    ) -> AnalyticsResult<String> {
        let data = self.collect(website_id, range).await?;

        info!(
            website_id,
            sessions = data.metadata.total_records.sessions,
            page_views = data.metadata.total_records.page_views,
            events = data.metadata.total_records.events,
            ?format,
            "Exporting analytics"
        );

        match format {
            ExportFormat::Json => serde_json::to_string_pretty(&data)
                .map_err(|e| AnalyticsError::Export(e.to_string())),
            ExportFormat::Csv => to_csv(&data),
        }
    }
}

fn iso(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn section<I, R>(title: &str, header: &[&str], rows: I) -> AnalyticsResult<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(header)
        .map_err(|e| AnalyticsError::Export(e.to_string()))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| AnalyticsError::Export(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AnalyticsError::Export(e.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| AnalyticsError::Export(e.to_string()))?;

    Ok(format!("=== {title} ===\n{body}"))
}

/// Sectioned CSV. Units are spelled out next to the values.
pub fn to_csv(data: &ExportData) -> AnalyticsResult<String> {
    let s = &data.summary;

    let summary = section(
        "SUMMARY",
        &["Metric", "Value"],
        [
            ["Total Sessions".to_string(), s.total_sessions.to_string()],
            ["Total Page Views".to_string(), s.total_page_views.to_string()],
            ["Total Visitors".to_string(), s.total_visitors.to_string()],
            ["New Visitors".to_string(), s.new_visitors.to_string()],
            ["Bounce Rate".to_string(), format!("{}%", s.bounce_rate)],
            [
                "Avg Session Duration".to_string(),
                format!("{} min", s.avg_session_duration),
            ],
            ["Avg Time on Page".to_string(), format!("{} sec", s.avg_time_on_page)],
            ["Unique Pages".to_string(), s.unique_pages.to_string()],
            ["Live Users".to_string(), s.live_users.to_string()],
        ],
    )?;

    let devices = section(
        "DEVICE BREAKDOWN",
        &["Device", "Count"],
        s.device_breakdown
            .iter()
            .map(|d| [d.device.clone(), d.count.to_string()]),
    )?;

    let browsers = section(
        "BROWSER BREAKDOWN",
        &["Browser", "Count"],
        s.browser_breakdown
            .iter()
            .map(|b| [b.browser.clone(), b.count.to_string()]),
    )?;

    let sessions = section(
        "SESSIONS",
        &[
            "Session ID",
            "Visitor ID",
            "Start Time",
            "Duration",
            "Page Views",
            "Country",
            "City",
            "Device",
            "Browser",
            "OS",
        ],
        data.sessions.iter().map(|session| {
            [
                session.session_id.clone(),
                session.visitor_id.clone(),
                iso(session.start_time),
                opt(&session.duration),
                session.page_views.to_string(),
                opt(&session.country),
                opt(&session.city),
                opt(&session.device),
                opt(&session.browser),
                opt(&session.os),
            ]
        }),
    )?;

    let page_views = section(
        "PAGE VIEWS",
        &[
            "Path",
            "Title",
            "Duration",
            "Page Load Time",
            "DOM Ready Time",
            "Timestamp",
        ],
        data.page_views.iter().map(|view| {
            [
                view.path.clone(),
                opt(&view.title),
                opt(&view.duration),
                opt(&view.page_load_time),
                opt(&view.dom_ready_time),
                iso(view.timestamp),
            ]
        }),
    )?;

    let events = section(
        "EVENTS",
        &["Event Type", "Event Data", "Timestamp"],
        data.events.iter().map(|event| {
            [
                event.event_type.clone(),
                event.event_data.to_string(),
                iso(event.timestamp),
            ]
        }),
    )?;

    Ok([summary, devices, browsers, sessions, page_views, events].join("\n"))
}
