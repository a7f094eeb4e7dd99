mod metrics;
mod raw;
mod summary;
mod website;

pub use metrics::{MergeStrategy, MergedMetrics, RealtimeSnapshot, TimeSeriesPoint};
pub use raw::{RawEvent, RawPageView, RawSession};
pub use summary::{
    BreakdownEntry, BrowserCount, CountryCount, DailySummary, DeviceCount, EventTypeCount,
    OsCount, TopPage, TopReferrer,
};
pub use website::{CreateWebsiteRequest, UpdateWebsiteRequest, Website};
