//! Website analytics rollups
//!
//! Raw sessions, page views and events are folded into one `DailySummary`
//! per website and local day. Summaries for a date range are merged with a
//! real-time snapshot of today to answer dashboard and export requests.

pub mod calendar;
pub mod daily;
pub mod error;
pub mod export;
pub mod merge;
pub mod metrics;
pub mod range;
pub mod realtime;
pub mod timeseries;

pub use daily::{summarize, DailyAggregator};
pub use error::{AnalyticsError, AnalyticsResult};
pub use export::{ExportFormat, Exporter};
pub use metrics::{choose_strategy, DateRange, MetricsMerger};
pub use range::RangeAggregator;
pub use realtime::{SnapshotProvider, StoreSnapshotProvider};
pub use timeseries::time_series;
