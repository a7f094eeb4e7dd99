//! Website registry handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;

use super::handlers::{error_response, AppState, ErrorResponse, SuccessResponse};
use crate::models::{CreateWebsiteRequest, UpdateWebsiteRequest, Website};
use crate::storage::StorageError;

type ApiResult<T> = Result<(StatusCode, Json<T>), (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize)]
pub struct WebsiteListResponse {
    pub websites: Vec<Website>,
}

#[derive(Debug, Serialize)]
pub struct WebsiteResponse {
    pub website: Website,
}

fn check_timezone(timezone: Option<&str>) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
        Some(tz) if tz.parse::<Tz>().is_err() => Err(error_response(
            StatusCode::BAD_REQUEST,
            &format!("Unknown timezone: {}", tz),
        )),
        _ => Ok(()),
    }
}

fn storage_failure(context: &str, e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %e, "{}", context);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    error_response(StatusCode::NOT_FOUND, "Website not found")
}

/// List registered websites
pub async fn list_websites(State(state): State<Arc<AppState>>) -> ApiResult<WebsiteListResponse> {
    let websites = state
        .storage
        .list_websites()
        .await
        .map_err(|e| storage_failure("Failed to list websites", e))?;

    Ok((StatusCode::OK, Json(WebsiteListResponse { websites })))
}

/// Register a website
pub async fn create_website(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateWebsiteRequest>,
) -> ApiResult<WebsiteResponse> {
    if payload.id.trim().is_empty()
        || payload.name.trim().is_empty()
        || payload.domain.trim().is_empty()
    {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "id, name and domain are required",
        ));
    }
    check_timezone(payload.timezone.as_deref())?;

    let website = payload.into_website(&state.config.default_timezone, Utc::now().timestamp());
    match state.storage.create_website(&website).await {
        Ok(website) => {
            tracing::info!(website_id = %website.id, "Registered website");
            Ok((StatusCode::CREATED, Json(WebsiteResponse { website })))
        }
        Err(StorageError::Conflict) => Err(error_response(
            StatusCode::CONFLICT,
            "Website id or domain already exists",
        )),
        Err(e) => Err(storage_failure("Failed to create website", e)),
    }
}

pub async fn get_website(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
) -> ApiResult<WebsiteResponse> {
    match state.storage.get_website(&website_id).await {
        Ok(Some(website)) => Ok((StatusCode::OK, Json(WebsiteResponse { website }))),
        Ok(None) => Err(not_found()),
        Err(e) => Err(storage_failure("Failed to fetch website", e)),
    }
}

/// Change name, domain or timezone. Summaries already written keep the
/// day boundaries of the old timezone until they are re-aggregated.
pub async fn update_website(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
    Json(payload): Json<UpdateWebsiteRequest>,
) -> ApiResult<WebsiteResponse> {
    check_timezone(payload.timezone.as_deref())?;
    if [&payload.name, &payload.domain]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| v.trim().is_empty()))
    {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "name and domain cannot be empty",
        ));
    }

    match state.storage.update_website(&website_id, &payload).await {
        Ok(Some(website)) => Ok((StatusCode::OK, Json(WebsiteResponse { website }))),
        Ok(None) => Err(not_found()),
        Err(StorageError::Conflict) => Err(error_response(
            StatusCode::CONFLICT,
            "Domain already belongs to another website",
        )),
        Err(e) => Err(storage_failure("Failed to update website", e)),
    }
}

/// Delete a website and all of its data
pub async fn delete_website(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
) -> ApiResult<SuccessResponse> {
    match state.storage.delete_website(&website_id).await {
        Ok(true) => {
            tracing::info!(website_id = %website_id, "Deleted website");
            Ok((
                StatusCode::OK,
                Json(SuccessResponse {
                    message: "Website deleted successfully".to_string(),
                }),
            ))
        }
        Ok(false) => Err(not_found()),
        Err(e) => Err(storage_failure("Failed to delete website", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_timezone() {
        assert!(check_timezone(None).is_ok());
        assert!(check_timezone(Some("")).is_ok());
        assert!(check_timezone(Some("Europe/Berlin")).is_ok());

        let (status, _) = check_timezone(Some("Mars/Olympus")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
