use crate::models::{
    DailySummary, RawEvent, RawPageView, RawSession, UpdateWebsiteRequest, Website,
};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;

const SESSION_COLUMNS: &str = "website_id, session_id, visitor_id, start_time, end_time, \
     last_activity, duration, page_views, device, browser, os, country, city, region, \
     is_new_visitor";

const PAGE_VIEW_COLUMNS: &str = "website_id, session_id, path, title, referrer, duration, \
     page_load_time, dom_ready_time, timestamp";

const EVENT_COLUMNS: &str = "website_id, session_id, event_type, event_data, timestamp";

const SUMMARY_COLUMNS: &str = "website_id, date, total_sessions, total_page_views, \
     total_visitors, new_visitors, bounce_rate, avg_session_duration, avg_time_on_page, \
     unique_pages, device_breakdown, browser_breakdown, os_breakdown, country_breakdown, \
     event_breakdown, top_pages, top_referrers";

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn unix_now() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS websites (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                domain TEXT NOT NULL UNIQUE,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id BIGSERIAL PRIMARY KEY,
                website_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                visitor_id TEXT NOT NULL,
                start_time BIGINT NOT NULL,
                end_time BIGINT,
                last_activity BIGINT,
                duration BIGINT,
                page_views BIGINT NOT NULL DEFAULT 0,
                device TEXT,
                browser TEXT,
                os TEXT,
                country TEXT,
                city TEXT,
                region TEXT,
                is_new_visitor BOOLEAN NOT NULL DEFAULT TRUE,
                UNIQUE (website_id, session_id)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_website_start ON sessions(website_id, start_time)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page_views (
                id BIGSERIAL PRIMARY KEY,
                website_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                path TEXT NOT NULL,
                title TEXT,
                referrer TEXT,
                duration BIGINT,
                page_load_time BIGINT,
                dom_ready_time BIGINT,
                timestamp BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_page_views_website_ts ON page_views(website_id, timestamp)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id BIGSERIAL PRIMARY KEY,
                website_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                event_data JSONB NOT NULL DEFAULT 'null',
                timestamp BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_website_ts ON events(website_id, timestamp)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_summary (
                website_id TEXT NOT NULL,
                date DATE NOT NULL,
                total_sessions BIGINT NOT NULL DEFAULT 0,
                total_page_views BIGINT NOT NULL DEFAULT 0,
                total_visitors BIGINT NOT NULL DEFAULT 0,
                new_visitors BIGINT NOT NULL DEFAULT 0,
                bounce_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
                avg_session_duration DOUBLE PRECISION NOT NULL DEFAULT 0,
                avg_time_on_page BIGINT NOT NULL DEFAULT 0,
                unique_pages BIGINT NOT NULL DEFAULT 0,
                device_breakdown JSONB NOT NULL DEFAULT '[]',
                browser_breakdown JSONB NOT NULL DEFAULT '[]',
                os_breakdown JSONB NOT NULL DEFAULT '[]',
                country_breakdown JSONB NOT NULL DEFAULT '[]',
                event_breakdown JSONB NOT NULL DEFAULT '[]',
                top_pages JSONB NOT NULL DEFAULT '[]',
                top_referrers JSONB NOT NULL DEFAULT '[]',
                updated_at BIGINT NOT NULL,
                PRIMARY KEY (website_id, date)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_website(&self, website: &Website) -> StorageResult<Website> {
        let result = sqlx::query(
            r#"
            INSERT INTO websites (id, name, domain, timezone, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&website.id)
        .bind(&website.name)
        .bind(&website.domain)
        .bind(&website.timezone)
        .bind(website.created_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(website.clone())
    }

    async fn get_website(&self, website_id: &str) -> Result<Option<Website>> {
        let website = sqlx::query_as::<_, Website>(
            r#"
            SELECT id, name, domain, timezone, created_at
            FROM websites
            WHERE id = $1
            "#,
        )
        .bind(website_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(website)
    }

    async fn list_websites(&self) -> Result<Vec<Website>> {
        let websites = sqlx::query_as::<_, Website>(
            r#"
            SELECT id, name, domain, timezone, created_at
            FROM websites
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(websites)
    }

    async fn update_website(
        &self,
        website_id: &str,
        update: &UpdateWebsiteRequest,
    ) -> StorageResult<Option<Website>> {
        let result = sqlx::query(
            r#"
            UPDATE websites
            SET name = COALESCE($1, name),
                domain = COALESCE($2, domain),
                timezone = COALESCE($3, timezone)
            WHERE id = $4
            "#,
        )
        .bind(&update.name)
        .bind(&update.domain)
        .bind(&update.timezone)
        .bind(website_id)
        .execute(self.pool.as_ref())
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => return Ok(None),
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StorageError::Conflict)
            }
            Err(e) => return Err(StorageError::Other(e.into())),
        }

        self.get_website(website_id).await.map_err(StorageError::Other)
    }

    async fn delete_website(&self, website_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        for table in ["sessions", "page_views", "events", "analytics_summary"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE website_id = $1"))
                .bind(website_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM websites WHERE id = $1")
            .bind(website_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_session(&self, session: &RawSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                website_id, session_id, visitor_id, start_time, end_time, last_activity,
                duration, page_views, device, browser, os, country, city, region,
                is_new_visitor
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (website_id, session_id) DO UPDATE SET
                end_time = excluded.end_time,
                last_activity = excluded.last_activity,
                duration = excluded.duration,
                page_views = excluded.page_views
            "#,
        )
        .bind(&session.website_id)
        .bind(&session.session_id)
        .bind(&session.visitor_id)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.last_activity)
        .bind(session.duration)
        .bind(session.page_views)
        .bind(&session.device)
        .bind(&session.browser)
        .bind(&session.os)
        .bind(&session.country)
        .bind(&session.city)
        .bind(&session.region)
        .bind(session.is_new_visitor)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_page_view(&self, page_view: &RawPageView) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO page_views (
                website_id, session_id, path, title, referrer, duration,
                page_load_time, dom_ready_time, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&page_view.website_id)
        .bind(&page_view.session_id)
        .bind(&page_view.path)
        .bind(&page_view.title)
        .bind(&page_view.referrer)
        .bind(page_view.duration)
        .bind(page_view.page_load_time)
        .bind(page_view.dom_ready_time)
        .bind(page_view.timestamp)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_event(&self, event: &RawEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (website_id, session_id, event_type, event_data, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&event.website_id)
        .bind(&event.session_id)
        .bind(&event.event_type)
        .bind(Json(&event.event_data))
        .bind(event.timestamp)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn sessions_between(
        &self,
        website_id: &str,
        from: i64,
        to: i64,
        limit: Option<i64>,
    ) -> Result<Vec<RawSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE website_id = $1 AND start_time >= $2 AND start_time < $3 \
             ORDER BY start_time ASC, id ASC LIMIT $4"
        );

        // LIMIT NULL is LIMIT ALL
        let sessions = sqlx::query_as::<_, RawSession>(&sql)
            .bind(website_id)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(sessions)
    }

    async fn page_views_between(
        &self,
        website_id: &str,
        from: i64,
        to: i64,
        limit: Option<i64>,
    ) -> Result<Vec<RawPageView>> {
        let sql = format!(
            "SELECT {PAGE_VIEW_COLUMNS} FROM page_views \
             WHERE website_id = $1 AND timestamp >= $2 AND timestamp < $3 \
             ORDER BY timestamp ASC, id ASC LIMIT $4"
        );

        let page_views = sqlx::query_as::<_, RawPageView>(&sql)
            .bind(website_id)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(page_views)
    }

    async fn events_between(
        &self,
        website_id: &str,
        from: i64,
        to: i64,
        limit: Option<i64>,
    ) -> Result<Vec<RawEvent>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE website_id = $1 AND timestamp >= $2 AND timestamp < $3 \
             ORDER BY timestamp ASC, id ASC LIMIT $4"
        );

        let events = sqlx::query_as::<_, RawEvent>(&sql)
            .bind(website_id)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(events)
    }

    async fn count_active_sessions(&self, website_id: &str, since: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM sessions
            WHERE website_id = $1 AND last_activity >= $2
            "#,
        )
        .bind(website_id)
        .bind(since)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn upsert_summary(&self, summary: &DailySummary) -> Result<()> {
        let now = unix_now()?;

        sqlx::query(
            r#"
            INSERT INTO analytics_summary (
                website_id, date, total_sessions, total_page_views, total_visitors,
                new_visitors, bounce_rate, avg_session_duration, avg_time_on_page,
                unique_pages, device_breakdown, browser_breakdown, os_breakdown,
                country_breakdown, event_breakdown, top_pages, top_referrers, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (website_id, date) DO UPDATE SET
                total_sessions = excluded.total_sessions,
                total_page_views = excluded.total_page_views,
                total_visitors = excluded.total_visitors,
                new_visitors = excluded.new_visitors,
                bounce_rate = excluded.bounce_rate,
                avg_session_duration = excluded.avg_session_duration,
                avg_time_on_page = excluded.avg_time_on_page,
                unique_pages = excluded.unique_pages,
                device_breakdown = excluded.device_breakdown,
                browser_breakdown = excluded.browser_breakdown,
                os_breakdown = excluded.os_breakdown,
                country_breakdown = excluded.country_breakdown,
                event_breakdown = excluded.event_breakdown,
                top_pages = excluded.top_pages,
                top_referrers = excluded.top_referrers,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&summary.website_id)
        .bind(summary.date)
        .bind(summary.total_sessions)
        .bind(summary.total_page_views)
        .bind(summary.total_visitors)
        .bind(summary.new_visitors)
        .bind(summary.bounce_rate)
        .bind(summary.avg_session_duration)
        .bind(summary.avg_time_on_page)
        .bind(summary.unique_pages)
        .bind(Json(&summary.device_breakdown))
        .bind(Json(&summary.browser_breakdown))
        .bind(Json(&summary.os_breakdown))
        .bind(Json(&summary.country_breakdown))
        .bind(Json(&summary.event_breakdown))
        .bind(Json(&summary.top_pages))
        .bind(Json(&summary.top_referrers))
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn query_summaries(
        &self,
        website_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM analytics_summary \
             WHERE website_id = $1 AND date >= $2 AND date <= $3 \
             ORDER BY date ASC"
        );

        let summaries = sqlx::query_as::<_, DailySummary>(&sql)
            .bind(website_id)
            .bind(from)
            .bind(to)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(summaries)
    }
}
