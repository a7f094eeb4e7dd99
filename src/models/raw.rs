//! Rows written by the ingestion pipeline and read by the aggregator.
//!
//! Timestamps are Unix seconds. Durations are seconds.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One visitor session on one website
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    pub website_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub last_activity: Option<i64>,
    pub duration: Option<i64>,
    pub page_views: i64,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub is_new_visitor: bool,
}

/// One navigation within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawPageView {
    pub website_id: String,
    pub session_id: String,
    pub path: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub duration: Option<i64>,
    /// Milliseconds
    pub page_load_time: Option<i64>,
    /// Milliseconds
    pub dom_ready_time: Option<i64>,
    pub timestamp: i64,
}

/// A typed occurrence (form_submit, outbound_link, error, goal, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub website_id: String,
    pub session_id: String,
    pub event_type: String,
    #[sqlx(json)]
    pub event_data: serde_json::Value,
    pub timestamp: i64,
}

impl RawSession {
    /// A session that saw exactly one page
    pub fn is_bounce(&self) -> bool {
        self.page_views == 1
    }
}
