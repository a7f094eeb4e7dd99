//! Folding daily summaries and real-time snapshots into one metrics record.
//!
//! Counts are summed. Bounce rate and session duration are averaged with the
//! day's session count as weight, time on page with the day's page views.
//! Unique pages take the maximum across days.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{
    BreakdownEntry, BrowserCount, CountryCount, DailySummary, DeviceCount, EventTypeCount,
    MergeStrategy, MergedMetrics, OsCount, RealtimeSnapshot, TopPage, TopReferrer,
};

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Count descending, label ascending
pub fn sort_breakdown<E: BreakdownEntry>(entries: &mut [E]) {
    entries.sort_by(|a, b| {
        b.count()
            .cmp(&a.count())
            .then_with(|| a.label().cmp(b.label()))
    });
}

/// Add `incoming` into `existing` by label
pub fn merge_breakdown<E: BreakdownEntry>(existing: &mut Vec<E>, incoming: &[E]) {
    for entry in incoming {
        match existing.iter_mut().find(|e| e.label() == entry.label()) {
            Some(found) => *found = E::new(entry.label().to_string(), found.count() + entry.count()),
            None => existing.push(entry.clone()),
        }
    }
    sort_breakdown(existing);
}

/// Views descending, then path and title ascending
pub fn sort_top_pages(pages: &mut [TopPage]) {
    pages.sort_by(|a, b| {
        b.views
            .cmp(&a.views)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.title.cmp(&b.title))
    });
}

/// Views and view-weighted seconds of one path
#[derive(Debug, Default)]
struct PageTotals {
    title: String,
    views: i64,
    weighted_time: f64,
}

/// Top pages summed by path across days. Nothing is cut until `into_top`,
/// so a page that falls out of one day's list keeps its views.
#[derive(Debug, Default)]
pub struct TopPageTally {
    pages: HashMap<String, PageTotals>,
}

impl TopPageTally {
    pub fn add(&mut self, pages: &[TopPage]) {
        for page in pages {
            let totals = self.pages.entry(page.path.clone()).or_default();
            totals.views += page.views;
            totals.weighted_time += page.avg_time * page.views as f64;
            if totals.title.is_empty() {
                totals.title = page.title.clone();
            }
        }
    }

    /// The `top_n` pages by views, with the average time rounded once
    pub fn into_top(self, top_n: usize) -> Vec<TopPage> {
        let mut pages: Vec<TopPage> = self
            .pages
            .into_iter()
            .map(|(path, totals)| TopPage {
                path,
                title: totals.title,
                views: totals.views,
                avg_time: if totals.views > 0 {
                    round2(totals.weighted_time / totals.views as f64)
                } else {
                    0.0
                },
            })
            .collect();

        sort_top_pages(&mut pages);
        pages.truncate(top_n);
        pages
    }
}

/// Count descending, referrer ascending
pub fn sort_top_referrers(referrers: &mut [TopReferrer]) {
    referrers.sort_by(|a, b| match b.count.cmp(&a.count) {
        Ordering::Equal => a.referrer.cmp(&b.referrer),
        other => other,
    });
}

/// Referrer counts summed across days, cut in `into_top`
#[derive(Debug, Default)]
pub struct ReferrerTally {
    counts: HashMap<String, i64>,
}

impl ReferrerTally {
    pub fn add(&mut self, referrers: &[TopReferrer]) {
        for referrer in referrers {
            *self.counts.entry(referrer.referrer.clone()).or_insert(0) += referrer.count;
        }
    }

    pub fn into_top(self, top_n: usize) -> Vec<TopReferrer> {
        let mut referrers: Vec<TopReferrer> = self
            .counts
            .into_iter()
            .map(|(referrer, count)| TopReferrer { referrer, count })
            .collect();

        sort_top_referrers(&mut referrers);
        referrers.truncate(top_n);
        referrers
    }
}

/// Running totals while folding days together
#[derive(Debug, Default)]
struct MetricsFold {
    top_n: usize,
    total_sessions: i64,
    total_page_views: i64,
    total_visitors: i64,
    new_visitors: i64,
    /// Sessions of the days that carry bounce and duration figures
    session_weight: i64,
    weighted_bounce_rate: f64,
    weighted_session_duration: f64,
    /// Page views of the days that carry a time-on-page figure
    page_view_weight: i64,
    weighted_time_on_page: f64,
    unique_pages: i64,
    device_breakdown: Vec<DeviceCount>,
    browser_breakdown: Vec<BrowserCount>,
    os_breakdown: Vec<OsCount>,
    country_breakdown: Vec<CountryCount>,
    event_breakdown: Vec<EventTypeCount>,
    top_pages: TopPageTally,
    top_referrers: ReferrerTally,
    live_users: i64,
}

impl MetricsFold {
    fn new(top_n: usize) -> Self {
        Self {
            top_n,
            ..Self::default()
        }
    }

    fn add_summary(&mut self, day: &DailySummary) {
        self.total_sessions += day.total_sessions;
        self.total_page_views += day.total_page_views;
        self.total_visitors += day.total_visitors;
        self.new_visitors += day.new_visitors;

        self.session_weight += day.total_sessions;
        self.weighted_bounce_rate += day.bounce_rate * day.total_sessions as f64;
        self.weighted_session_duration += day.avg_session_duration * day.total_sessions as f64;

        self.page_view_weight += day.total_page_views;
        self.weighted_time_on_page += day.avg_time_on_page as f64 * day.total_page_views as f64;

        self.unique_pages = self.unique_pages.max(day.unique_pages);

        merge_breakdown(&mut self.device_breakdown, &day.device_breakdown);
        merge_breakdown(&mut self.browser_breakdown, &day.browser_breakdown);
        merge_breakdown(&mut self.os_breakdown, &day.os_breakdown);
        merge_breakdown(&mut self.country_breakdown, &day.country_breakdown);
        merge_breakdown(&mut self.event_breakdown, &day.event_breakdown);
        self.top_pages.add(&day.top_pages);
        self.top_referrers.add(&day.top_referrers);
    }

    /// The snapshot has no bounce, duration or visitor figures, so today's
    /// sessions and page views raise the totals without entering the weights.
    fn add_snapshot(&mut self, snapshot: &RealtimeSnapshot) {
        self.total_sessions += snapshot.today_sessions;
        self.total_page_views += snapshot.today_page_views;

        merge_breakdown(&mut self.device_breakdown, &snapshot.device_breakdown);
        merge_breakdown(&mut self.browser_breakdown, &snapshot.browser_breakdown);
        self.top_pages.add(&snapshot.top_pages);

        self.live_users = snapshot.live_users;
    }

    fn finish(
        self,
        website_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
        strategy: MergeStrategy,
    ) -> MergedMetrics {
        let (bounce_rate, avg_session_duration) = if self.session_weight > 0 {
            let weight = self.session_weight as f64;
            (
                round2(self.weighted_bounce_rate / weight),
                round2(self.weighted_session_duration / weight),
            )
        } else {
            (0.0, 0.0)
        };

        let avg_time_on_page = if self.page_view_weight > 0 {
            (self.weighted_time_on_page / self.page_view_weight as f64).round() as i64
        } else {
            0
        };

        MergedMetrics {
            website_id: website_id.to_string(),
            date_from,
            date_to,
            strategy,
            total_sessions: self.total_sessions,
            total_page_views: self.total_page_views,
            total_visitors: self.total_visitors,
            new_visitors: self.new_visitors,
            bounce_rate,
            avg_session_duration,
            avg_time_on_page,
            unique_pages: self.unique_pages,
            device_breakdown: self.device_breakdown,
            browser_breakdown: self.browser_breakdown,
            os_breakdown: self.os_breakdown,
            country_breakdown: self.country_breakdown,
            event_breakdown: self.event_breakdown,
            top_pages: self.top_pages.into_top(self.top_n),
            top_referrers: self.top_referrers.into_top(self.top_n),
            live_users: self.live_users,
        }
    }
}

/// Stored days only; `live_users` stays 0
pub fn merge_historical(
    website_id: &str,
    date_from: NaiveDate,
    date_to: NaiveDate,
    days: &[DailySummary],
    top_n: usize,
) -> MergedMetrics {
    let mut fold = MetricsFold::new(top_n);
    for day in days {
        fold.add_summary(day);
    }
    fold.finish(website_id, date_from, date_to, MergeStrategy::Historical)
}

/// Stored days plus today's snapshot. OS, country, event and referrer lists
/// come from the stored days alone.
pub fn merge_mixed(
    website_id: &str,
    date_from: NaiveDate,
    date_to: NaiveDate,
    days: &[DailySummary],
    snapshot: &RealtimeSnapshot,
    top_n: usize,
) -> MergedMetrics {
    let mut fold = MetricsFold::new(top_n);
    for day in days {
        fold.add_summary(day);
    }
    fold.add_snapshot(snapshot);
    fold.finish(website_id, date_from, date_to, MergeStrategy::Mixed)
}

pub fn merge_realtime(
    website_id: &str,
    date_from: NaiveDate,
    date_to: NaiveDate,
    snapshot: &RealtimeSnapshot,
    top_n: usize,
) -> MergedMetrics {
    let mut fold = MetricsFold::new(top_n);
    fold.add_snapshot(snapshot);
    fold.finish(website_id, date_from, date_to, MergeStrategy::Realtime)
}
