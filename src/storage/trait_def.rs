use crate::models::{
    DailySummary, RawEvent, RawPageView, RawSession, UpdateWebsiteRequest, Website,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("website already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Time windows are half-open `[from, to)` in Unix seconds.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    // Websites

    /// Register a website; fails with `Conflict` if the id or domain is taken
    async fn create_website(&self, website: &Website) -> StorageResult<Website>;

    async fn get_website(&self, website_id: &str) -> Result<Option<Website>>;

    /// All websites, oldest first
    async fn list_websites(&self) -> Result<Vec<Website>>;

    /// Apply the given fields; `None` if the website does not exist,
    /// `Conflict` if the new domain belongs to another website
    async fn update_website(
        &self,
        website_id: &str,
        update: &UpdateWebsiteRequest,
    ) -> StorageResult<Option<Website>>;

    /// Remove a website together with its raw rows and summaries.
    /// Returns false if it did not exist.
    async fn delete_website(&self, website_id: &str) -> Result<bool>;

    // Event store

    /// Insert a session, or replace the mutable fields of an existing one
    /// with the same `(website_id, session_id)`
    async fn upsert_session(&self, session: &RawSession) -> Result<()>;

    async fn insert_page_view(&self, page_view: &RawPageView) -> Result<()>;

    async fn insert_event(&self, event: &RawEvent) -> Result<()>;

    /// Sessions whose start time falls in the window, oldest first
    async fn sessions_between(
        &self,
        website_id: &str,
        from: i64,
        to: i64,
        limit: Option<i64>,
    ) -> Result<Vec<RawSession>>;

    async fn page_views_between(
        &self,
        website_id: &str,
        from: i64,
        to: i64,
        limit: Option<i64>,
    ) -> Result<Vec<RawPageView>>;

    async fn events_between(
        &self,
        website_id: &str,
        from: i64,
        to: i64,
        limit: Option<i64>,
    ) -> Result<Vec<RawEvent>>;

    /// Number of sessions with activity at or after `since`
    async fn count_active_sessions(&self, website_id: &str, since: i64) -> Result<i64>;

    // Summary store

    /// Write the whole record for `(website_id, date)` in one statement,
    /// replacing any previous row for that key
    async fn upsert_summary(&self, summary: &DailySummary) -> Result<()>;

    /// Summaries for `from..=to`, ascending by date
    async fn query_summaries(
        &self,
        website_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>>;
}
