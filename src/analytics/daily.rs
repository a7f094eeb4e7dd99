//! Daily rollups: one `DailySummary` per website and local calendar day.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::calendar;
use super::error::AnalyticsResult;
use super::merge::{round2, sort_breakdown, sort_top_pages, sort_top_referrers};
use crate::config::AnalyticsConfig;
use crate::models::{BreakdownEntry, DailySummary, RawEvent, RawPageView, RawSession, TopPage, TopReferrer};
use crate::storage::Storage;

/// Computes a day's summary from raw rows and upserts it into the summary store
pub struct DailyAggregator {
    storage: Arc<dyn Storage>,
    config: AnalyticsConfig,
}

impl DailyAggregator {
    pub fn new(storage: Arc<dyn Storage>, config: AnalyticsConfig) -> Self {
        Self { storage, config }
    }

    /// Aggregate `day` for `website_id` and replace any stored summary for it.
    ///
    /// Read and write failures propagate; nothing is written unless every read
    /// succeeded, and the write is a single statement.
    pub async fn aggregate(&self, website_id: &str, day: NaiveDate) -> AnalyticsResult<DailySummary> {
        let tz = calendar::website_timezone(
            self.storage.as_ref(),
            website_id,
            &self.config.default_timezone,
        )
        .await?;
        let (from, to) = calendar::day_bounds(tz, day)?;

        debug!(website_id, %day, from, to, "Aggregating day");

        let sessions = self
            .storage
            .sessions_between(website_id, from, to, None)
            .await?;
        let page_views = self
            .storage
            .page_views_between(website_id, from, to, None)
            .await?;
        let events = self.storage.events_between(website_id, from, to, None).await?;

        let summary = summarize(
            website_id,
            day,
            &sessions,
            &page_views,
            &events,
            self.config.top_n,
        );

        self.storage.upsert_summary(&summary).await?;

        info!(
            website_id,
            %day,
            sessions = summary.total_sessions,
            page_views = summary.total_page_views,
            "Stored daily summary"
        );

        Ok(summary)
    }
}

/// Group non-null labels into a sorted breakdown
pub(crate) fn count_breakdown<'a, E, I>(labels: I) -> Vec<E>
where
    E: BreakdownEntry,
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for label in labels.into_iter().flatten() {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut entries: Vec<E> = counts
        .into_iter()
        .map(|(label, count)| E::new(label.to_string(), count))
        .collect();
    sort_breakdown(&mut entries);
    entries
}

/// Group page views by (path, title), averaging the known durations
pub(crate) fn rank_top_pages(page_views: &[RawPageView], top_n: usize) -> Vec<TopPage> {
    #[derive(Default)]
    struct Group {
        views: i64,
        duration_sum: i64,
        duration_count: i64,
    }

    let mut groups: BTreeMap<(&str, &str), Group> = BTreeMap::new();
    for view in page_views {
        let group = groups
            .entry((view.path.as_str(), view.title.as_deref().unwrap_or("")))
            .or_default();
        group.views += 1;
        if let Some(duration) = view.duration {
            group.duration_sum += duration;
            group.duration_count += 1;
        }
    }

    let mut pages: Vec<TopPage> = groups
        .into_iter()
        .map(|((path, title), group)| TopPage {
            path: path.to_string(),
            title: title.to_string(),
            views: group.views,
            avg_time: if group.duration_count > 0 {
                round2(group.duration_sum as f64 / group.duration_count as f64)
            } else {
                0.0
            },
        })
        .collect();

    sort_top_pages(&mut pages);
    pages.truncate(top_n);
    pages
}

fn rank_top_referrers(page_views: &[RawPageView], top_n: usize) -> Vec<TopReferrer> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for referrer in page_views
        .iter()
        .filter_map(|v| v.referrer.as_deref())
        .filter(|r| !r.is_empty())
    {
        *counts.entry(referrer).or_insert(0) += 1;
    }

    let mut referrers: Vec<TopReferrer> = counts
        .into_iter()
        .map(|(referrer, count)| TopReferrer {
            referrer: referrer.to_string(),
            count,
        })
        .collect();

    sort_top_referrers(&mut referrers);
    referrers.truncate(top_n);
    referrers
}

/// Compute the summary for one day from the rows that fall inside it.
///
/// Pure and deterministic: the same rows always produce the same record.
pub fn summarize(
    website_id: &str,
    date: NaiveDate,
    sessions: &[RawSession],
    page_views: &[RawPageView],
    events: &[RawEvent],
    top_n: usize,
) -> DailySummary {
    let total_sessions = sessions.len() as i64;
    let total_page_views = page_views.len() as i64;

    let total_visitors = sessions
        .iter()
        .map(|s| s.visitor_id.as_str())
        .collect::<HashSet<_>>()
        .len() as i64;
    let new_visitors = sessions.iter().filter(|s| s.is_new_visitor).count() as i64;
    let bounced = sessions.iter().filter(|s| s.is_bounce()).count() as i64;
    let total_duration: i64 = sessions.iter().filter_map(|s| s.duration).sum();

    let (bounce_rate, avg_session_duration) = if total_sessions > 0 {
        (
            round2(bounced as f64 / total_sessions as f64 * 100.0),
            round2(total_duration as f64 / total_sessions as f64 / 60.0),
        )
    } else {
        (0.0, 0.0)
    };

    let known_durations: Vec<i64> = page_views.iter().filter_map(|v| v.duration).collect();
    let avg_time_on_page = if known_durations.is_empty() {
        0
    } else {
        (known_durations.iter().sum::<i64>() as f64 / known_durations.len() as f64).round() as i64
    };

    let unique_pages = page_views
        .iter()
        .map(|v| v.path.as_str())
        .collect::<HashSet<_>>()
        .len() as i64;

    DailySummary {
        website_id: website_id.to_string(),
        date,
        total_sessions,
        total_page_views,
        total_visitors,
        new_visitors,
        bounce_rate,
        avg_session_duration,
        avg_time_on_page,
        unique_pages,
        device_breakdown: count_breakdown(sessions.iter().map(|s| s.device.as_deref())),
        browser_breakdown: count_breakdown(sessions.iter().map(|s| s.browser.as_deref())),
        os_breakdown: count_breakdown(sessions.iter().map(|s| s.os.as_deref())),
        country_breakdown: count_breakdown(sessions.iter().map(|s| s.country.as_deref())),
        event_breakdown: count_breakdown(events.iter().map(|e| Some(e.event_type.as_str()))),
        top_pages: rank_top_pages(page_views, top_n),
        top_referrers: rank_top_referrers(page_views, top_n),
    }
}
