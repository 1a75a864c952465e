use crate::config::ApiConfig;
use crate::exposure::{ExposureTracker, VideoExposure};
use crate::store::CounterStore;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, header::HeaderName, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<ExposureTracker>,
    pub store: Arc<dyn CounterStore>,
    pub environment: String,
}

/// Read endpoint response: current counts, least-exposed first
#[derive(Debug, Serialize)]
pub struct ExposureListResponse {
    pub videos: Vec<VideoExposure>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub environment: String,
}

/// Write endpoint response
#[derive(Debug, Serialize)]
pub struct RecordExposureResponse {
    pub success: bool,
    pub recorded: usize,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/v1/exposure", get(list_exposure).post(record_exposure))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "exposure-service"
    }))
}

/// Readiness check endpoint.
///
/// A degraded KV store is still a serving state (zeroed counts, dropped
/// batches), so the probe result goes in the body and the status stays
/// 200 either way.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.read_all().await {
        Ok(_) => Json(serde_json::json!({
            "status": "ready",
            "kv": "connected"
        })),
        Err(e) => {
            warn!(error = %e, "Readiness probe found KV store degraded");
            Json(serde_json::json!({
                "status": "ready",
                "kv": "degraded",
                "error": e.to_string()
            }))
        }
    }
}

/// Current exposure counts, least-exposed videos first.
///
/// The rotation component picks from the front of the list, so responses
/// must always be computed fresh; caching is disabled outright.
#[instrument(skip(state))]
async fn list_exposure(
    State(state): State<AppState>,
) -> ([(HeaderName, &'static str); 1], Json<ExposureListResponse>) {
    let videos = state.tracker.sorted_by_exposure().await;

    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(ExposureListResponse {
            videos,
            last_updated: Utc::now(),
            environment: state.environment.clone(),
        }),
    )
}

/// Record a batch of client-reported exposures.
///
/// The body is parsed loosely so malformed shapes get a 400 instead of a
/// framework rejection. A failed store write still answers 200 with
/// `success: false`: the beacon on the landing page must never see a
/// telemetry failure as an error.
#[instrument(skip(state, body))]
async fn record_exposure(
    State(state): State<AppState>,
    body: Option<Json<serde_json::Value>>,
) -> Result<Json<RecordExposureResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(Json(body)) = body else {
        return Err(bad_request("Request body must be a JSON object"));
    };

    let video_ids = parse_video_ids(&body).map_err(bad_request)?;
    let recorded = video_ids.len();

    if state.tracker.record_exposures(&video_ids).await {
        Ok(Json(RecordExposureResponse {
            success: true,
            recorded,
            message: format!("Recorded {recorded} exposure(s)"),
        }))
    } else {
        Ok(Json(RecordExposureResponse {
            success: false,
            recorded: 0,
            message: "Exposure batch could not be persisted".to_string(),
        }))
    }
}

/// Extract the list of video ids to increment from the request body.
///
/// Non-string entries are dropped, string entries are trimmed and blank
/// ones dropped; an input that leaves nothing to record is rejected.
fn parse_video_ids(body: &serde_json::Value) -> Result<Vec<String>, &'static str> {
    let ids = body.get("videoIds").ok_or("videoIds is required")?;
    let ids = ids.as_array().ok_or("videoIds must be an array")?;

    let ids: Vec<String> = ids
        .iter()
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err("videoIds must contain at least one video id");
    }

    Ok(ids)
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "invalid_request".to_string(),
            message: message.into(),
        }),
    )
}

/// Start the exposure API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting exposure API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VIDEO_CATALOG;
    use crate::store::{MemoryCounterStore, StoreError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    /// Store whose writes always fail, as an unreachable KV API would
    struct WriteFailingStore;

    #[async_trait]
    impl CounterStore for WriteFailingStore {
        async fn read_all(&self) -> Result<Option<HashMap<String, u64>>, StoreError> {
            Ok(None)
        }

        async fn write_all(&self, _counts: &HashMap<String, u64>) -> Result<(), StoreError> {
            Err(StoreError::UnexpectedStatus { status: 502 })
        }
    }

    fn test_state(store: Arc<dyn CounterStore>) -> AppState {
        AppState {
            tracker: Arc::new(ExposureTracker::new(store.clone())),
            store,
            environment: "test".to_string(),
        }
    }

    #[test]
    fn test_parse_video_ids_filters_and_trims() {
        let ids = parse_video_ids(&json!({
            "videoIds": ["kol-mia-unboxing", "  kol-dex-teardown  ", "", 42, null]
        }))
        .unwrap();

        assert_eq!(ids, vec!["kol-mia-unboxing", "kol-dex-teardown"]);
    }

    #[test]
    fn test_parse_video_ids_rejects_bad_shapes() {
        assert!(parse_video_ids(&json!({})).is_err());
        assert!(parse_video_ids(&json!({"videoIds": "not-an-array"})).is_err());
        assert!(parse_video_ids(&json!({"videoIds": []})).is_err());
        assert!(parse_video_ids(&json!({"videoIds": ["", "  "]})).is_err());
    }

    #[tokio::test]
    async fn test_record_exposure_rejects_invalid_body() {
        let state = test_state(Arc::new(MemoryCounterStore::new()));

        let response = record_exposure(
            State(state.clone()),
            Some(Json(json!({"videoIds": "not-an-array"}))),
        )
        .await;
        let (status, _) = response.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let response = record_exposure(State(state), None).await;
        let (status, _) = response.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_record_exposure_applies_batch() {
        let store = Arc::new(MemoryCounterStore::new());
        let state = test_state(store);
        let first = VIDEO_CATALOG[0].id;
        let second = VIDEO_CATALOG[1].id;

        let Json(response) = record_exposure(
            State(state.clone()),
            Some(Json(json!({"videoIds": [first, first, second]}))),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(response.recorded, 3);

        let counts = state.tracker.all_counts().await;
        assert_eq!(counts[first], 2);
        assert_eq!(counts[second], 1);
    }

    #[tokio::test]
    async fn test_record_exposure_masks_store_failure() {
        let state = test_state(Arc::new(WriteFailingStore));

        let Json(response) = record_exposure(
            State(state),
            Some(Json(json!({"videoIds": [VIDEO_CATALOG[0].id]}))),
        )
        .await
        .unwrap();

        assert!(!response.success);
        assert_eq!(response.recorded, 0);
    }

    #[tokio::test]
    async fn test_list_exposure_sorted_and_uncached() {
        let seeded = HashMap::from([
            (VIDEO_CATALOG[0].id.to_string(), 5),
            (VIDEO_CATALOG[1].id.to_string(), 1),
        ]);
        let state = test_state(Arc::new(MemoryCounterStore::seeded(seeded)));

        let (headers, Json(response)) = list_exposure(State(state)).await;

        assert_eq!(headers[0].0, header::CACHE_CONTROL);
        assert_eq!(headers[0].1, "no-store");
        assert_eq!(response.environment, "test");
        assert_eq!(response.videos.len(), VIDEO_CATALOG.len());
        for pair in response.videos.windows(2) {
            assert!(pair[0].count <= pair[1].count);
        }
        assert_eq!(
            response.videos.last().unwrap().video_id,
            VIDEO_CATALOG[0].id
        );
    }
}
