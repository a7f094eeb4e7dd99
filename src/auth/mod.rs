use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;

/// Guards the endpoints that trigger aggregation runs
pub struct AuthService {
    api_keys: Arc<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ApiKeyParam {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            api_keys: Arc::new(config.api_keys),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    pub fn validate_key(&self, key: &str) -> bool {
        // No keys configured: open (dev mode)
        if self.api_keys.is_empty() {
            return true;
        }

        // Constant-time comparison
        self.api_keys
            .iter()
            .any(|k| k.as_bytes().ct_eq(key.as_bytes()).into())
    }
}

/// Accepts the key from the `X-API-Key` header or the `apiKey` query
/// parameter, which schedulers that can only issue plain GETs rely on.
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    request: Request,
    next: Next,
) -> Response {
    let header_key = request
        .headers()
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let api_key = header_key.or_else(|| {
        Query::<ApiKeyParam>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(param)| param.api_key)
    });

    if auth_service.validate_key(api_key.as_deref().unwrap_or("")) {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected aggregation request with invalid API key");
        (StatusCode::UNAUTHORIZED, "Invalid or missing API key").into_response()
    }
}
