//! Metrics over arbitrary date ranges.
//!
//! Nothing is cached: every request re-reads the summary store and, when the
//! range reaches today, asks the snapshot provider.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::calendar;
use super::error::{AnalyticsError, AnalyticsResult};
use super::merge::{merge_historical, merge_mixed, merge_realtime};
use super::realtime::SnapshotProvider;
use crate::config::AnalyticsConfig;
use crate::models::{MergeStrategy, MergedMetrics};
use crate::storage::Storage;

/// Inclusive range of local calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> AnalyticsResult<Self> {
        if from > to {
            return Err(AnalyticsError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }
}

/// Pick how to answer a request for `range` when the website's local date is
/// `today`.
pub fn choose_strategy(range: DateRange, today: NaiveDate, include_realtime: bool) -> MergeStrategy {
    let yesterday = today.pred_opt().unwrap_or(today);

    if range.from >= today {
        MergeStrategy::Realtime
    } else if range.to < yesterday && !include_realtime {
        MergeStrategy::Historical
    } else {
        MergeStrategy::Mixed
    }
}

pub struct MetricsMerger {
    storage: Arc<dyn Storage>,
    snapshots: Arc<dyn SnapshotProvider>,
    config: AnalyticsConfig,
}

impl MetricsMerger {
    pub fn new(
        storage: Arc<dyn Storage>,
        snapshots: Arc<dyn SnapshotProvider>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            storage,
            snapshots,
            config,
        }
    }

    pub async fn get_metrics(
        &self,
        website_id: &str,
        range: DateRange,
        include_realtime: bool,
    ) -> AnalyticsResult<MergedMetrics> {
        self.get_metrics_at(website_id, range, include_realtime, Utc::now())
            .await
    }

    /// Same as `get_metrics` with an explicit clock
    pub async fn get_metrics_at(
        &self,
        website_id: &str,
        range: DateRange,
        include_realtime: bool,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<MergedMetrics> {
        let tz = calendar::website_timezone(
            self.storage.as_ref(),
            website_id,
            &self.config.default_timezone,
        )
        .await?;
        let today = calendar::today_in(tz, now);
        let strategy = choose_strategy(range, today, include_realtime);
        let top_n = self.config.top_n;

        debug!(website_id, ?strategy, from = %range.from, to = %range.to, "Merging metrics");

        let metrics = match strategy {
            MergeStrategy::Historical => {
                let days = self
                    .storage
                    .query_summaries(website_id, range.from, range.to)
                    .await?;
                merge_historical(website_id, range.from, range.to, &days, top_n)
            }
            MergeStrategy::Mixed => {
                // Stored rows stop before today; today is the snapshot's
                let last_stored = range.to.min(today.pred_opt().unwrap_or(today));
                let days = if range.from <= last_stored {
                    self.storage
                        .query_summaries(website_id, range.from, last_stored)
                        .await?
                } else {
                    Vec::new()
                };
                let snapshot = self.snapshots.snapshot(website_id).await?;
                merge_mixed(website_id, range.from, range.to, &days, &snapshot, top_n)
            }
            MergeStrategy::Realtime => {
                let snapshot = self.snapshots.snapshot(website_id).await?;
                merge_realtime(website_id, range.from, range.to, &snapshot, top_n)
            }
        };

        Ok(metrics)
    }
}
