use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A read from the event store or a read/write on the summary store failed
    #[error(transparent)]
    Storage(#[from] anyhow::Error),

    #[error("local midnight of {date} does not exist in {timezone}")]
    DayBoundary { date: NaiveDate, timezone: String },

    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("failed to encode export: {0}")]
    Export(String),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
