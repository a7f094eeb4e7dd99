//! Integration tests for range metrics and the real-time snapshot

use async_trait::async_trait;
use beacon::analytics::{
    AnalyticsResult, DateRange, MetricsMerger, SnapshotProvider, StoreSnapshotProvider,
};
use beacon::config::AnalyticsConfig;
use beacon::models::{
    DailySummary, DeviceCount, MergeStrategy, RawPageView, RawSession, RealtimeSnapshot, TopPage,
};
use beacon::storage::{SqliteStorage, Storage};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

/// Noon UTC on June 10th
fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_718_020_800, 0).unwrap()
}

fn summary(day: u32, sessions: i64, bounce_rate: f64) -> DailySummary {
    DailySummary {
        total_sessions: sessions,
        total_page_views: sessions * 2,
        total_visitors: sessions,
        bounce_rate,
        avg_session_duration: 2.0,
        avg_time_on_page: 30,
        unique_pages: 4,
        device_breakdown: vec![DeviceCount::new("mobile".to_string(), sessions)],
        top_pages: vec![TopPage {
            path: "/".to_string(),
            title: "Home".to_string(),
            views: sessions,
            avg_time: 30.0,
        }],
        ..DailySummary::empty("site", date(day))
    }
}

/// Fixed snapshot that remembers how often it was asked
struct FakeSnapshots {
    snapshot: RealtimeSnapshot,
    calls: AtomicUsize,
}

impl FakeSnapshots {
    fn new() -> Self {
        Self {
            snapshot: RealtimeSnapshot {
                live_users: 4,
                today_sessions: 5,
                today_page_views: 7,
                top_pages: vec![TopPage {
                    path: "/launch".to_string(),
                    title: "Launch".to_string(),
                    views: 7,
                    avg_time: 12.0,
                }],
                device_breakdown: vec![DeviceCount::new("mobile".to_string(), 2)],
                browser_breakdown: vec![],
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SnapshotProvider for FakeSnapshots {
    async fn snapshot(&self, _website_id: &str) -> AnalyticsResult<RealtimeSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }
}

async fn setup() -> (Arc<dyn Storage>, Arc<FakeSnapshots>, MetricsMerger) {
    let storage = create_test_storage().await;
    storage.upsert_summary(&summary(3, 10, 20.0)).await.unwrap();
    storage.upsert_summary(&summary(5, 30, 60.0)).await.unwrap();
    // A partial row for today that must never be read
    storage.upsert_summary(&summary(10, 100, 0.0)).await.unwrap();

    let snapshots = Arc::new(FakeSnapshots::new());
    let merger = MetricsMerger::new(
        Arc::clone(&storage),
        Arc::clone(&snapshots) as Arc<dyn SnapshotProvider>,
        AnalyticsConfig::default(),
    );
    (storage, snapshots, merger)
}

#[tokio::test]
async fn test_past_range_uses_stored_days_only() {
    let (_storage, snapshots, merger) = setup().await;

    let range = DateRange::new(date(1), date(8)).unwrap();
    let metrics = merger.get_metrics_at("site", range, false, now()).await.unwrap();

    assert_eq!(metrics.strategy, MergeStrategy::Historical);
    assert_eq!(metrics.total_sessions, 40);
    assert_eq!(metrics.total_page_views, 80);
    assert_eq!(metrics.bounce_rate, 50.0);
    assert_eq!(metrics.avg_session_duration, 2.0);
    assert_eq!(metrics.avg_time_on_page, 30);
    assert_eq!(metrics.unique_pages, 4);
    assert_eq!(metrics.live_users, 0);
    assert_eq!(
        metrics.device_breakdown,
        vec![DeviceCount::new("mobile".to_string(), 40)]
    );
    assert_eq!(snapshots.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_range_through_today_adds_snapshot() {
    let (_storage, snapshots, merger) = setup().await;

    let range = DateRange::new(date(1), date(10)).unwrap();
    let metrics = merger.get_metrics_at("site", range, false, now()).await.unwrap();

    assert_eq!(metrics.strategy, MergeStrategy::Mixed);
    // Stored days 3 and 5 plus the snapshot; the stored row for today is ignored
    assert_eq!(metrics.total_sessions, 45);
    assert_eq!(metrics.total_page_views, 87);
    assert_eq!(metrics.total_visitors, 40);
    // Snapshot sessions carry no bounce figure and leave the average alone
    assert_eq!(metrics.bounce_rate, 50.0);
    assert_eq!(metrics.live_users, 4);
    assert_eq!(
        metrics.device_breakdown,
        vec![DeviceCount::new("mobile".to_string(), 42)]
    );
    assert_eq!(metrics.top_pages[0].path, "/");
    assert_eq!(metrics.top_pages[0].views, 40);
    assert_eq!(metrics.top_pages[1].path, "/launch");
    assert_eq!(snapshots.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_range_ending_yesterday_keeps_stored_yesterday() {
    let (storage, snapshots, merger) = setup().await;
    storage.upsert_summary(&summary(9, 20, 50.0)).await.unwrap();

    let range = DateRange::new(date(1), date(9)).unwrap();
    let metrics = merger.get_metrics_at("site", range, false, now()).await.unwrap();

    assert_eq!(metrics.strategy, MergeStrategy::Mixed);
    // Stored days 3, 5 and 9 plus the snapshot
    assert_eq!(metrics.total_sessions, 65);
    assert_eq!(metrics.total_page_views, 127);
    assert_eq!(metrics.total_visitors, 60);
    assert_eq!(metrics.bounce_rate, 50.0);
    assert_eq!(metrics.live_users, 4);
    assert_eq!(metrics.top_pages[0].path, "/");
    assert_eq!(metrics.top_pages[0].views, 60);
    assert_eq!(snapshots.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_requested_realtime_on_past_range_is_mixed() {
    let (_storage, snapshots, merger) = setup().await;

    let range = DateRange::new(date(1), date(4)).unwrap();
    let metrics = merger.get_metrics_at("site", range, true, now()).await.unwrap();

    assert_eq!(metrics.strategy, MergeStrategy::Mixed);
    assert_eq!(metrics.total_sessions, 15);
    assert_eq!(metrics.bounce_rate, 20.0);
    assert_eq!(metrics.live_users, 4);
    assert_eq!(snapshots.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_today_only_uses_snapshot() {
    let (_storage, _snapshots, merger) = setup().await;

    let range = DateRange::new(date(10), date(10)).unwrap();
    let metrics = merger.get_metrics_at("site", range, false, now()).await.unwrap();

    assert_eq!(metrics.strategy, MergeStrategy::Realtime);
    assert_eq!(metrics.total_sessions, 5);
    assert_eq!(metrics.total_page_views, 7);
    assert_eq!(metrics.bounce_rate, 0.0);
    assert_eq!(metrics.avg_time_on_page, 0);
    assert_eq!(metrics.live_users, 4);
    assert!(metrics.os_breakdown.is_empty());
}

#[tokio::test]
async fn test_range_without_rows_is_all_zero() {
    let storage = create_test_storage().await;
    let merger = MetricsMerger::new(
        Arc::clone(&storage),
        Arc::new(FakeSnapshots::new()),
        AnalyticsConfig::default(),
    );

    let range = DateRange::new(date(1), date(2)).unwrap();
    let metrics = merger.get_metrics_at("site", range, false, now()).await.unwrap();

    assert_eq!(metrics.total_sessions, 0);
    assert_eq!(metrics.bounce_rate, 0.0);
    assert_eq!(metrics.avg_session_duration, 0.0);
    assert!(metrics.device_breakdown.is_empty());
}

#[tokio::test]
async fn test_store_snapshot_counts_today_and_live_sessions() {
    let storage = create_test_storage().await;
    let now = now();
    let ts = now.timestamp();
    let midnight = ts - 12 * 3_600;

    let session = |id: &str, start_time: i64, last_activity: i64, device: &str| RawSession {
        website_id: "site".to_string(),
        session_id: id.to_string(),
        visitor_id: id.to_string(),
        start_time,
        end_time: None,
        last_activity: Some(last_activity),
        duration: None,
        page_views: 1,
        device: Some(device.to_string()),
        browser: Some("Safari".to_string()),
        os: None,
        country: None,
        city: None,
        region: None,
        is_new_visitor: false,
    };
    // Live and started today
    storage
        .upsert_session(&session("a", midnight + 3_600, ts - 60, "mobile"))
        .await
        .unwrap();
    // Started today, idle for an hour
    storage
        .upsert_session(&session("b", midnight + 7_200, ts - 3_600, "desktop"))
        .await
        .unwrap();
    // Live but started yesterday
    storage
        .upsert_session(&session("c", midnight - 3_600, ts - 120, "tablet"))
        .await
        .unwrap();

    let view = |path: &str, timestamp: i64| RawPageView {
        website_id: "site".to_string(),
        session_id: "a".to_string(),
        path: path.to_string(),
        title: None,
        referrer: None,
        duration: None,
        page_load_time: None,
        dom_ready_time: None,
        timestamp,
    };
    storage.insert_page_view(&view("/", midnight + 3_600)).await.unwrap();
    storage.insert_page_view(&view("/", ts - 30)).await.unwrap();
    storage.insert_page_view(&view("/old", ts - 20 * 3_600)).await.unwrap();
    storage.insert_page_view(&view("/ancient", ts - 30 * 3_600)).await.unwrap();

    let provider = StoreSnapshotProvider::new(Arc::clone(&storage), AnalyticsConfig::default());
    let snapshot = provider.snapshot_at("site", now).await.unwrap();

    assert_eq!(snapshot.live_users, 2);
    assert_eq!(snapshot.today_sessions, 2);
    assert_eq!(snapshot.today_page_views, 2);
    let paths: Vec<&str> = snapshot.top_pages.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(paths, vec!["/", "/old"]);
    assert_eq!(
        snapshot.device_breakdown,
        vec![
            DeviceCount::new("desktop".to_string(), 1),
            DeviceCount::new("mobile".to_string(), 1),
        ]
    );
}
