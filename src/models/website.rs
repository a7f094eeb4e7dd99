use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked site. The timezone decides where a reporting day begins.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Website {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub timezone: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebsiteRequest {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub timezone: Option<String>,
}

/// Fields left out keep their stored value
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebsiteRequest {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub timezone: Option<String>,
}

impl CreateWebsiteRequest {
    /// Build the stored record, filling in `default_timezone` when none was given
    pub fn into_website(self, default_timezone: &str, created_at: i64) -> Website {
        Website {
            id: self.id,
            name: self.name,
            domain: self.domain,
            timezone: self
                .timezone
                .filter(|tz| !tz.trim().is_empty())
                .unwrap_or_else(|| default_timezone.to_string()),
            created_at,
        }
    }
}
