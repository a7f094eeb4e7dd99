//! Integration tests for the event store and the summary store
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, both backends are tested

use beacon::models::{
    DailySummary, DeviceCount, RawEvent, RawPageView, RawSession, TopPage, UpdateWebsiteRequest,
    Website,
};
use beacon::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use chrono::NaiveDate;
use std::sync::Arc;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create PostgreSQL test storage
async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

/// Unique per run so repeated runs against one Postgres database don't collide
fn unique_id(prefix: &str) -> String {
    format!(
        "{}-{}",
        prefix,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn session(website_id: &str, session_id: &str, start_time: i64) -> RawSession {
    RawSession {
        website_id: website_id.to_string(),
        session_id: session_id.to_string(),
        visitor_id: format!("v-{session_id}"),
        start_time,
        end_time: None,
        last_activity: Some(start_time),
        duration: None,
        page_views: 1,
        device: Some("desktop".to_string()),
        browser: Some("Firefox".to_string()),
        os: None,
        country: Some("DE".to_string()),
        city: None,
        region: None,
        is_new_visitor: true,
    }
}

fn page_view(website_id: &str, path: &str, timestamp: i64) -> RawPageView {
    RawPageView {
        website_id: website_id.to_string(),
        session_id: "s1".to_string(),
        path: path.to_string(),
        title: Some("Home".to_string()),
        referrer: Some("https://search.test".to_string()),
        duration: Some(30),
        page_load_time: Some(120),
        dom_ready_time: None,
        timestamp,
    }
}

fn summary(website_id: &str, day: NaiveDate, sessions: i64) -> DailySummary {
    DailySummary {
        total_sessions: sessions,
        total_page_views: sessions * 2,
        total_visitors: sessions,
        bounce_rate: 25.5,
        avg_session_duration: 1.25,
        avg_time_on_page: 40,
        unique_pages: 3,
        device_breakdown: vec![DeviceCount::new("mobile".to_string(), sessions)],
        top_pages: vec![TopPage {
            path: "/".to_string(),
            title: "Home".to_string(),
            views: sessions,
            avg_time: 12.5,
        }],
        ..DailySummary::empty(website_id, day)
    }
}

async fn check_website_conflict(storage: Arc<dyn Storage>) {
    let id = unique_id("site");
    let website = Website {
        id: id.clone(),
        name: "Site".to_string(),
        domain: format!("{id}.test"),
        timezone: "Europe/Berlin".to_string(),
        created_at: 1_700_000_000,
    };

    let created = storage.create_website(&website).await.unwrap();
    assert_eq!(created.timezone, "Europe/Berlin");

    let again = storage.create_website(&website).await;
    assert!(matches!(again, Err(StorageError::Conflict)));

    let fetched = storage.get_website(&id).await.unwrap().unwrap();
    assert_eq!(fetched.domain, website.domain);
    assert!(storage.get_website("missing").await.unwrap().is_none());
}

fn website(id: &str, created_at: i64) -> Website {
    Website {
        id: id.to_string(),
        name: format!("Site {id}"),
        domain: format!("{id}.test"),
        timezone: "UTC".to_string(),
        created_at,
    }
}

async fn check_website_lifecycle(storage: Arc<dyn Storage>) {
    let first = unique_id("first");
    let second = unique_id("second");
    storage.create_website(&website(&second, 200)).await.unwrap();
    storage.create_website(&website(&first, 100)).await.unwrap();

    let listed: Vec<String> = storage
        .list_websites()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .filter(|id| *id == first || *id == second)
        .collect();
    assert_eq!(listed, vec![first.clone(), second.clone()]);

    // Only the given fields change
    let updated = storage
        .update_website(
            &first,
            &UpdateWebsiteRequest {
                timezone: Some("Asia/Tokyo".to_string()),
                ..UpdateWebsiteRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.timezone, "Asia/Tokyo");
    assert_eq!(updated.name, format!("Site {first}"));

    let taken = storage
        .update_website(
            &first,
            &UpdateWebsiteRequest {
                domain: Some(format!("{second}.test")),
                ..UpdateWebsiteRequest::default()
            },
        )
        .await;
    assert!(matches!(taken, Err(StorageError::Conflict)));

    let missing = storage
        .update_website("missing-site", &UpdateWebsiteRequest::default())
        .await
        .unwrap();
    assert!(missing.is_none());

    // Deleting removes the website's rows as well
    let day = date(3);
    storage.upsert_summary(&summary(&first, day, 2)).await.unwrap();
    storage.upsert_session(&session(&first, "s1", 1_717_372_800)).await.unwrap();

    assert!(storage.delete_website(&first).await.unwrap());
    assert!(!storage.delete_website(&first).await.unwrap());
    assert!(storage.get_website(&first).await.unwrap().is_none());
    assert!(storage.query_summaries(&first, day, day).await.unwrap().is_empty());
    assert!(storage
        .sessions_between(&first, 0, i64::MAX, None)
        .await
        .unwrap()
        .is_empty());
    assert!(storage.get_website(&second).await.unwrap().is_some());
}

async fn check_session_upsert_and_windows(storage: Arc<dyn Storage>) {
    let site = unique_id("events");
    let base = 1_717_372_800; // 2024-06-03T00:00:00Z

    storage.upsert_session(&session(&site, "s1", base + 10)).await.unwrap();
    storage.upsert_session(&session(&site, "s2", base + 20)).await.unwrap();

    // Second write of s1 updates it in place
    let mut updated = session(&site, "s1", base + 10);
    updated.page_views = 4;
    updated.duration = Some(300);
    updated.last_activity = Some(base + 310);
    storage.upsert_session(&updated).await.unwrap();

    // Exactly at the upper bound: excluded
    storage.upsert_session(&session(&site, "s3", base + 86_400)).await.unwrap();

    let sessions = storage
        .sessions_between(&site, base, base + 86_400, None)
        .await
        .unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, "s1");
    assert_eq!(sessions[0].page_views, 4);
    assert_eq!(sessions[0].duration, Some(300));
    assert!(sessions[0].is_new_visitor);

    let limited = storage
        .sessions_between(&site, base, base + 86_400, Some(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    // s1 (last seen base+310) and s3 are active, s2 (base+20) is not
    assert_eq!(storage.count_active_sessions(&site, base + 300).await.unwrap(), 2);
    assert_eq!(storage.count_active_sessions(&site, base + 1_000).await.unwrap(), 1);

    storage.insert_page_view(&page_view(&site, "/", base + 5)).await.unwrap();
    storage
        .insert_page_view(&page_view(&site, "/late", base + 86_400))
        .await
        .unwrap();
    let views = storage
        .page_views_between(&site, base, base + 86_400, None)
        .await
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].page_load_time, Some(120));

    storage
        .insert_event(&RawEvent {
            website_id: site.clone(),
            session_id: "s1".to_string(),
            event_type: "signup".to_string(),
            event_data: serde_json::json!({"plan": "pro"}),
            timestamp: base + 60,
        })
        .await
        .unwrap();
    let events = storage
        .events_between(&site, base, base + 86_400, None)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_data["plan"], "pro");
}

async fn check_summary_upsert_replaces(storage: Arc<dyn Storage>) {
    let site = unique_id("summary");

    storage.upsert_summary(&summary(&site, date(3), 5)).await.unwrap();
    let replacement = summary(&site, date(3), 8);
    storage.upsert_summary(&replacement).await.unwrap();
    // Writing the same record twice changes nothing
    storage.upsert_summary(&replacement).await.unwrap();

    let stored = storage.query_summaries(&site, date(3), date(3)).await.unwrap();
    assert_eq!(stored, vec![replacement]);
}

async fn check_summary_query_order(storage: Arc<dyn Storage>) {
    let site = unique_id("ordered");

    for day in [5, 1, 3, 9] {
        storage.upsert_summary(&summary(&site, date(day), day as i64)).await.unwrap();
    }
    storage.upsert_summary(&summary("other-site", date(2), 1)).await.unwrap();

    let stored = storage.query_summaries(&site, date(1), date(5)).await.unwrap();
    let days: Vec<NaiveDate> = stored.iter().map(|s| s.date).collect();
    assert_eq!(days, vec![date(1), date(3), date(5)]);

    let empty = storage.query_summaries(&site, date(10), date(20)).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_website_conflict_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_website_conflict(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_website_lifecycle_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_website_lifecycle(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_session_upsert_and_windows_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_session_upsert_and_windows(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_summary_upsert_replaces_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_summary_upsert_replaces(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_summary_query_order_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_summary_query_order(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_storage_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        eprintln!("Skipping PostgreSQL tests: DATABASE_URL not set");
        return;
    };

    check_website_conflict(Arc::clone(&storage)).await;
    check_website_lifecycle(Arc::clone(&storage)).await;
    check_session_upsert_and_windows(Arc::clone(&storage)).await;
    check_summary_upsert_replaces(Arc::clone(&storage)).await;
    check_summary_query_order(storage).await;
}
