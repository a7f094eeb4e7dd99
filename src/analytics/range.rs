use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::calendar;
use super::daily::DailyAggregator;
use crate::models::DailySummary;

/// Runs the daily aggregator over every day of a range, one day at a time
pub struct RangeAggregator {
    daily: Arc<DailyAggregator>,
}

impl RangeAggregator {
    pub fn new(daily: Arc<DailyAggregator>) -> Self {
        Self { daily }
    }

    /// Aggregate `start..=end` in chronological order.
    ///
    /// A day that fails is logged and left out, so the result may be shorter
    /// than the number of days requested. Never fails as a whole.
    pub async fn aggregate_range(
        &self,
        website_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<DailySummary> {
        let days = calendar::days_inclusive(start, end);
        let mut summaries = Vec::with_capacity(days.len());

        for day in &days {
            match self.daily.aggregate(website_id, *day).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    warn!(website_id, %day, error = %e, "Failed to aggregate day, skipping");
                }
            }
        }

        info!(
            website_id,
            requested = days.len(),
            processed = summaries.len(),
            "Range aggregation finished"
        );

        summaries
    }
}
