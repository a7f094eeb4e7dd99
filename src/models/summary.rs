use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One entry of a ranked breakdown list.
///
/// Each breakdown kind is its own type so that lists of different kinds can
/// never be merged into each other, and each keeps the field name the
/// dashboard and exports expect (`device`, `browser`, `os`, ...).
pub trait BreakdownEntry: Clone {
    fn new(label: String, count: i64) -> Self;
    fn label(&self) -> &str;
    fn count(&self) -> i64;
}

macro_rules! breakdown_entry {
    ($(#[$meta:meta])* $name:ident, $field:ident, $json:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(rename = $json)]
            pub $field: String,
            pub count: i64,
        }

        impl $name {
            pub fn new(label: String, count: i64) -> Self {
                Self { $field: label, count }
            }
        }

        impl BreakdownEntry for $name {
            fn new(label: String, count: i64) -> Self {
                $name::new(label, count)
            }

            fn label(&self) -> &str {
                &self.$field
            }

            fn count(&self) -> i64 {
                self.count
            }
        }
    };
}

breakdown_entry!(
    /// Sessions per device class (mobile, desktop, tablet)
    DeviceCount, device, "device"
);
breakdown_entry!(BrowserCount, browser, "browser");
breakdown_entry!(OsCount, os, "os");
breakdown_entry!(CountryCount, country, "country");
breakdown_entry!(
    /// Events per event type
    EventTypeCount, event_type, "eventType"
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPage {
    pub path: String,
    pub title: String,
    pub views: i64,
    /// Mean seconds on page
    pub avg_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopReferrer {
    pub referrer: String,
    pub count: i64,
}

/// Pre-aggregated figures for one website on one local calendar day.
///
/// Exactly one row exists per `(website_id, date)`; rewriting a day replaces
/// the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub website_id: String,
    pub date: NaiveDate,
    pub total_sessions: i64,
    pub total_page_views: i64,
    /// Distinct visitor ids
    pub total_visitors: i64,
    pub new_visitors: i64,
    /// Percentage, two decimals
    pub bounce_rate: f64,
    /// Minutes, two decimals
    pub avg_session_duration: f64,
    /// Whole seconds
    pub avg_time_on_page: i64,
    pub unique_pages: i64,
    #[sqlx(json)]
    pub device_breakdown: Vec<DeviceCount>,
    #[sqlx(json)]
    pub browser_breakdown: Vec<BrowserCount>,
    #[sqlx(json)]
    pub os_breakdown: Vec<OsCount>,
    #[sqlx(json)]
    pub country_breakdown: Vec<CountryCount>,
    #[sqlx(json)]
    pub event_breakdown: Vec<EventTypeCount>,
    #[sqlx(json)]
    pub top_pages: Vec<TopPage>,
    #[sqlx(json)]
    pub top_referrers: Vec<TopReferrer>,
}

impl DailySummary {
    /// The record for a day with no traffic
    pub fn empty(website_id: &str, date: NaiveDate) -> Self {
        Self {
            website_id: website_id.to_string(),
            date,
            total_sessions: 0,
            total_page_views: 0,
            total_visitors: 0,
            new_visitors: 0,
            bounce_rate: 0.0,
            avg_session_duration: 0.0,
            avg_time_on_page: 0,
            unique_pages: 0,
            device_breakdown: Vec::new(),
            browser_breakdown: Vec::new(),
            os_breakdown: Vec::new(),
            country_breakdown: Vec::new(),
            event_breakdown: Vec::new(),
            top_pages: Vec::new(),
            top_referrers: Vec::new(),
        }
    }
}
