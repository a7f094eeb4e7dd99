use chrono::NaiveDate;

use super::error::AnalyticsResult;
use crate::models::{DailySummary, TimeSeriesPoint};
use crate::storage::Storage;

impl From<&DailySummary> for TimeSeriesPoint {
    fn from(day: &DailySummary) -> Self {
        Self {
            date: day.date,
            sessions: day.total_sessions,
            page_views: day.total_page_views,
            visitors: day.total_visitors,
            bounce_rate: day.bounce_rate,
            avg_session_duration: day.avg_session_duration,
            avg_time_on_page: day.avg_time_on_page,
        }
    }
}

/// Chart points for the stored days in `from..=to`, oldest first.
/// Days without a stored summary are absent rather than zero.
pub async fn time_series(
    storage: &dyn Storage,
    website_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> AnalyticsResult<Vec<TimeSeriesPoint>> {
    let days = storage.query_summaries(website_id, from, to).await?;
    Ok(days.iter().map(TimeSeriesPoint::from).collect())
}
