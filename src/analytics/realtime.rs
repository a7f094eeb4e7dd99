//! Real-time figures computed straight from raw rows, never persisted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::calendar;
use super::daily::{count_breakdown, rank_top_pages};
use super::error::AnalyticsResult;
use crate::config::AnalyticsConfig;
use crate::models::RealtimeSnapshot;
use crate::storage::Storage;

/// Source of "right now" figures for a website.
///
/// The snapshot only carries sessions, page views, device and browser
/// breakdowns, top pages and live users.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self, website_id: &str) -> AnalyticsResult<RealtimeSnapshot>;
}

/// Snapshot provider that queries the event store
pub struct StoreSnapshotProvider {
    storage: Arc<dyn Storage>,
    config: AnalyticsConfig,
}

impl StoreSnapshotProvider {
    pub fn new(storage: Arc<dyn Storage>, config: AnalyticsConfig) -> Self {
        Self { storage, config }
    }

    /// Snapshot as seen at `now`
    pub async fn snapshot_at(
        &self,
        website_id: &str,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<RealtimeSnapshot> {
        let tz = calendar::website_timezone(
            self.storage.as_ref(),
            website_id,
            &self.config.default_timezone,
        )
        .await?;

        let today = calendar::today_in(tz, now);
        let (midnight, _) = calendar::day_bounds(tz, today)?;
        // Include rows stamped in the current second
        let until = now.timestamp() + 1;

        let live_since = (now - Duration::seconds(self.config.live_window_secs)).timestamp();
        let live_users = self
            .storage
            .count_active_sessions(website_id, live_since)
            .await?;

        let sessions = self
            .storage
            .sessions_between(website_id, midnight, until, None)
            .await?;
        let today_page_views = self
            .storage
            .page_views_between(website_id, midnight, until, None)
            .await?;

        let top_pages_since =
            (now - Duration::hours(self.config.realtime_top_pages_hours)).timestamp();
        let recent_page_views = self
            .storage
            .page_views_between(website_id, top_pages_since, until, None)
            .await?;

        Ok(RealtimeSnapshot {
            live_users,
            today_sessions: sessions.len() as i64,
            today_page_views: today_page_views.len() as i64,
            top_pages: rank_top_pages(&recent_page_views, self.config.top_n),
            device_breakdown: count_breakdown(sessions.iter().map(|s| s.device.as_deref())),
            browser_breakdown: count_breakdown(sessions.iter().map(|s| s.browser.as_deref())),
        })
    }
}

#[async_trait]
impl SnapshotProvider for StoreSnapshotProvider {
    async fn snapshot(&self, website_id: &str) -> AnalyticsResult<RealtimeSnapshot> {
        self.snapshot_at(website_id, Utc::now()).await
    }
}
