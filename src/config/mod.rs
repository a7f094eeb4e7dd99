use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub auth: AuthConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Keys accepted by the aggregation trigger endpoints.
/// An empty list disables the check (local development).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Tunables shared by the aggregator, the merger and the snapshot provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// IANA zone used when a website has no (valid) timezone of its own
    #[serde(default = "AnalyticsConfig::default_timezone")]
    pub default_timezone: String,

    /// Cap for top pages and top referrers lists
    #[serde(default = "AnalyticsConfig::default_top_n")]
    pub top_n: usize,

    /// A session counts as live if its last activity is this recent
    #[serde(default = "AnalyticsConfig::default_live_window_secs")]
    pub live_window_secs: i64,

    /// Window for the real-time top pages list
    #[serde(default = "AnalyticsConfig::default_realtime_top_pages_hours")]
    pub realtime_top_pages_hours: i64,

    /// Maximum raw rows of each kind included in an export
    #[serde(default = "AnalyticsConfig::default_export_row_limit")]
    pub export_row_limit: i64,

    /// Seconds between two pushes on the real-time stream
    #[serde(default = "AnalyticsConfig::default_realtime_interval_secs")]
    pub realtime_interval_secs: u64,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl AnalyticsConfig {
    fn default_timezone() -> String {
        "UTC".to_string()
    }

    const fn default_top_n() -> usize {
        20
    }

    const fn default_live_window_secs() -> i64 {
        300
    }

    const fn default_realtime_top_pages_hours() -> i64 {
        24
    }

    const fn default_export_row_limit() -> i64 {
        10_000
    }

    const fn default_realtime_interval_secs() -> u64 {
        5
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_timezone: Self::default_timezone(),
            top_n: Self::default_top_n(),
            live_window_secs: Self::default_live_window_secs(),
            realtime_top_pages_hours: Self::default_realtime_top_pages_hours(),
            export_row_limit: Self::default_export_row_limit(),
            realtime_interval_secs: Self::default_realtime_interval_secs(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./beacon.db?mode=rwc".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or_else(DatabaseConfig::default_max_connections);

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let api_keys = std::env::var("CRON_API_KEYS")
            .map(|v| parse_key_list(&v))
            .unwrap_or_default();

        let default_timezone = std::env::var("DEFAULT_TIMEZONE")
            .unwrap_or_else(|_| AnalyticsConfig::default_timezone());

        if default_timezone.parse::<chrono_tz::Tz>().is_err() {
            anyhow::bail!("DEFAULT_TIMEZONE '{default_timezone}' is not a valid IANA timezone");
        }

        let top_n = std::env::var("ANALYTICS_TOP_N")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(AnalyticsConfig::default_top_n);

        let live_window_secs = std::env::var("ANALYTICS_LIVE_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(AnalyticsConfig::default_live_window_secs);

        let realtime_top_pages_hours = std::env::var("ANALYTICS_REALTIME_TOP_PAGES_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(AnalyticsConfig::default_realtime_top_pages_hours);

        let export_row_limit = std::env::var("ANALYTICS_EXPORT_ROW_LIMIT")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(AnalyticsConfig::default_export_row_limit);

        let realtime_interval_secs = std::env::var("ANALYTICS_REALTIME_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or_else(AnalyticsConfig::default_realtime_interval_secs);

        if api_keys.is_empty() {
            tracing::warn!("CRON_API_KEYS is not set, protected endpoints accept any caller");
        }

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            auth: AuthConfig { api_keys },
            analytics: AnalyticsConfig {
                default_timezone,
                top_n,
                live_window_secs,
                realtime_top_pages_hours,
                export_row_limit,
                realtime_interval_secs,
            },
        })
    }
}

/// Comma-separated keys; blanks are skipped
fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}
