//! HTTP trigger and status endpoints.
//!
//! Thin transport over the processor: a scheduled POST runs ingestion and
//! the update scan, a gated GET permits manual runs, and a read endpoint
//! reports store health. Once a run starts, per-document errors are
//! absorbed into counters; only a failure before any accounting maps to a
//! 500 here.

use crate::processor::PolicyProcessor;
use crate::store::PolicyStore;
use crate::types::{
    PolicyError, PolicyStatus, ProcessingResult, ProcessingStats, RiskLevel, DEFAULT_DAYS_BACK,
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<PolicyProcessor>,
    pub store: Arc<dyn PolicyStore>,
    pub cron_secret: String,
    pub admin_key: String,
}

#[derive(Debug, Serialize)]
pub struct CollectResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub result: ProcessingResult,
    pub stats: ProcessingStats,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RecentPolicy {
    pub policy_name: String,
    pub jurisdiction: Option<String>,
    pub status: Option<PolicyStatus>,
    pub risk_classification: RiskLevel,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Distributions {
    pub status: HashMap<String, i64>,
    pub risk: HashMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub database: String,
    pub last_collection: Option<DateTime<Utc>>,
    pub next_collection: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub stats: ProcessingStats,
    pub recent_policies: Vec<RecentPolicy>,
    pub distributions: Distributions,
    pub system_status: SystemStatus,
}

#[derive(Debug, Deserialize)]
pub struct ManualCollectParams {
    pub admin_key: Option<String>,
    pub days_back: Option<i64>,
}

#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    Internal(String),
}

impl From<PolicyError> for AppError {
    fn from(e: PolicyError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            AppError::Internal(message) => {
                error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "success": false,
                        "error": message,
                        "timestamp": Utc::now(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// POST /api/collect - scheduled collection run.
///
/// Runs ingestion over the default window, then the update scan, gated by
/// the cron credential.
async fn collect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CollectResponse>, AppError> {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if state.cron_secret.is_empty()
        || authorization != format!("Bearer {}", state.cron_secret)
    {
        return Err(AppError::Unauthorized);
    }

    info!("Starting automated policy collection...");

    let result = state.processor.process_latest(DEFAULT_DAYS_BACK).await?;
    state.processor.update_existing().await;
    let stats = state.processor.stats().await?;

    Ok(Json(CollectResponse {
        success: true,
        timestamp: Utc::now(),
        message: format!(
            "Processed {} articles, added {} new policies, found {} duplicates",
            result.processed, result.added, result.duplicates
        ),
        result,
        stats,
    }))
}

/// GET /api/collect - manual trigger with a caller-supplied window.
async fn collect_manual(
    State(state): State<AppState>,
    Query(params): Query<ManualCollectParams>,
) -> Result<Json<CollectResponse>, AppError> {
    if state.admin_key.is_empty() || params.admin_key.as_deref() != Some(&state.admin_key) {
        return Err(AppError::Unauthorized);
    }

    let days_back = params.days_back.unwrap_or(DEFAULT_DAYS_BACK);
    info!("Manual policy collection triggered ({} days back)", days_back);

    let result = state.processor.process_latest(days_back).await?;
    let stats = state.processor.stats().await?;

    Ok(Json(CollectResponse {
        success: true,
        timestamp: Utc::now(),
        result,
        stats,
        message: "Manual collection completed".to_string(),
    }))
}

/// GET /api/status - recent records, distributions, and health fields.
async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let stats = state.store.stats().await?;
    let recent = state.store.recent(10).await?;
    let status_counts = state.store.status_counts().await?;
    let risk_counts = state.store.risk_counts().await?;

    let recent_policies = recent
        .into_iter()
        .map(|stored| RecentPolicy {
            policy_name: stored.record.policy_name,
            jurisdiction: stored.record.jurisdiction,
            status: stored.record.status,
            risk_classification: stored.record.risk_classification,
            created_at: stored.created_at,
        })
        .collect();

    Ok(Json(StatusResponse {
        success: true,
        timestamp: Utc::now(),
        system_status: SystemStatus {
            database: "connected".to_string(),
            last_collection: stats.last_update,
            next_collection: "Daily at 6:00 AM UTC".to_string(),
        },
        stats,
        recent_policies,
        distributions: Distributions {
            status: status_counts,
            risk: risk_counts,
        },
    }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/collect", post(collect).get(collect_manual))
        .route("/api/status", get(status))
        .with_state(state)
}

pub async fn serve(state: AppState, bind_addr: &str) -> crate::types::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| PolicyError::General(format!("failed to bind {}: {}", bind_addr, e)))?;

    info!("Policy monitor listening on {}", bind_addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| PolicyError::General(format!("server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SourceAggregator;
    use crate::extractor::PolicyExtractor;
    use crate::llm::MockLanguageModel;
    use crate::store::MemoryPolicyStore;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let store = Arc::new(MemoryPolicyStore::new());
        let extractor = PolicyExtractor::new(Arc::new(MockLanguageModel::new()));
        let processor = PolicyProcessor::new(SourceAggregator::new(), extractor, store.clone())
            .with_delays(Duration::ZERO, Duration::ZERO);

        AppState {
            processor: Arc::new(processor),
            store,
            cron_secret: "cron-secret".to_string(),
            admin_key: "admin-key".to_string(),
        }
    }

    #[tokio::test]
    async fn collect_requires_cron_credential() {
        let app = create_router(test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/api/collect")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn collect_accepts_bearer_secret() {
        let app = create_router(test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/api/collect")
            .header("authorization", "Bearer cron-secret")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn manual_collect_requires_admin_key() {
        let app = create_router(test_state());

        let request = Request::builder()
            .uri("/api/collect?admin_key=wrong")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_is_open() {
        let app = create_router(test_state());

        let request = Request::builder()
            .uri("/api/status")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
