use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::summary::{
    BrowserCount, CountryCount, DeviceCount, EventTypeCount, OsCount, TopPage, TopReferrer,
};

/// How a metrics request is answered, decided once from where the range ends
/// relative to the website's yesterday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Stored daily summaries only
    Historical,
    /// Stored daily summaries plus today's snapshot
    Mixed,
    /// Today's snapshot only
    Realtime,
}

/// Metrics over an arbitrary date range. Request scoped, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedMetrics {
    pub website_id: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub strategy: MergeStrategy,
    pub total_sessions: i64,
    pub total_page_views: i64,
    pub total_visitors: i64,
    pub new_visitors: i64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
    pub avg_time_on_page: i64,
    pub unique_pages: i64,
    pub device_breakdown: Vec<DeviceCount>,
    pub browser_breakdown: Vec<BrowserCount>,
    pub os_breakdown: Vec<OsCount>,
    pub country_breakdown: Vec<CountryCount>,
    pub event_breakdown: Vec<EventTypeCount>,
    pub top_pages: Vec<TopPage>,
    pub top_referrers: Vec<TopReferrer>,
    /// Point-in-time gauge from the real-time snapshot; 0 for history
    pub live_users: i64,
}

/// Figures computed straight from raw rows for the current local day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeSnapshot {
    pub live_users: i64,
    pub today_sessions: i64,
    pub today_page_views: i64,
    pub top_pages: Vec<TopPage>,
    pub device_breakdown: Vec<DeviceCount>,
    pub browser_breakdown: Vec<BrowserCount>,
}

/// One day of the dashboard chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub sessions: i64,
    pub page_views: i64,
    pub visitors: i64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
    pub avg_time_on_page: i64,
}
