//! Local calendar days for a website.
//!
//! A reporting day is the half-open interval between two consecutive local
//! midnights in the website's timezone, expressed in Unix seconds.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use super::error::{AnalyticsError, AnalyticsResult};
use crate::storage::Storage;

/// Parse an IANA zone name, falling back to `default` and then to UTC
pub fn parse_timezone(name: &str, default: &str) -> Tz {
    name.trim()
        .parse::<Tz>()
        .or_else(|_| default.parse::<Tz>())
        .unwrap_or(Tz::UTC)
}

/// Timezone of a website, or `default` for unknown websites
pub async fn website_timezone(
    storage: &dyn Storage,
    website_id: &str,
    default: &str,
) -> AnalyticsResult<Tz> {
    let website = storage.get_website(website_id).await?;

    Ok(match website {
        Some(site) => {
            if site.timezone.parse::<Tz>().is_err() {
                warn!(
                    website_id,
                    timezone = %site.timezone,
                    "Website has an invalid timezone, using {}", default
                );
            }
            parse_timezone(&site.timezone, default)
        }
        None => parse_timezone(default, default),
    })
}

/// First instant of `date` in `tz`.
///
/// Where midnight falls in a DST gap the day starts at the first valid local
/// time after it; where it is ambiguous the earlier instant wins.
pub fn local_midnight_utc(tz: Tz, date: NaiveDate) -> AnalyticsResult<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AnalyticsError::DayBoundary {
            date,
            timezone: tz.name().to_string(),
        })?;

    for minutes in (0..=180).step_by(15) {
        let candidate = midnight + Duration::minutes(minutes);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(a, b) => return Ok(a.min(b).with_timezone(&Utc)),
            LocalResult::None => continue,
        }
    }

    Err(AnalyticsError::DayBoundary {
        date,
        timezone: tz.name().to_string(),
    })
}

/// `[local midnight of date, local midnight of date + 1)` in Unix seconds
pub fn day_bounds(tz: Tz, date: NaiveDate) -> AnalyticsResult<(i64, i64)> {
    let next = date.succ_opt().ok_or_else(|| AnalyticsError::DayBoundary {
        date,
        timezone: tz.name().to_string(),
    })?;

    let start = local_midnight_utc(tz, date)?;
    let end = local_midnight_utc(tz, next)?;
    Ok((start.timestamp(), end.timestamp()))
}

/// The calendar date at `now` in `tz`
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Every date from `start` to `end`, both included. Empty if `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_utc_day_is_86400_seconds() {
        let (start, end) = day_bounds(Tz::UTC, date(2024, 3, 1)).unwrap();
        assert_eq!(start, 1_709_251_200);
        assert_eq!(end - start, 86_400);
    }

    #[test]
    fn test_local_midnight_follows_website_zone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let (start, _) = day_bounds(tz, date(2024, 1, 15)).unwrap();
        // EST is UTC-5
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 15, 5, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn test_dst_change_shortens_day() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let (start, end) = day_bounds(tz, date(2024, 3, 31)).unwrap();
        assert_eq!(end - start, 23 * 3600);
    }

    #[test]
    fn test_invalid_timezone_falls_back() {
        assert_eq!(parse_timezone("Not/AZone", "Europe/Paris").name(), "Europe/Paris");
        assert_eq!(parse_timezone("Not/AZone", "also bad"), Tz::UTC);
    }

    #[test]
    fn test_days_inclusive() {
        let days = days_inclusive(date(2024, 2, 27), date(2024, 3, 1));
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], date(2024, 2, 29));
        assert!(days_inclusive(date(2024, 3, 2), date(2024, 3, 1)).is_empty());
    }
}
