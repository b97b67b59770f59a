//! Health check endpoint

use axum::{Json, extract::State, http::StatusCode};

use crate::api::{error::ApiResult, state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Returns 503 when the store reports itself unhealthy
pub async fn health_check(
    State(state): State<ApiState>,
) -> ApiResult<(StatusCode, Json<HealthResponse>)> {
    let health = state.registry.health().await?;

    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        status,
        Json(HealthResponse {
            status: if health.healthy { "ok" } else { "degraded" }.to_string(),
            storage: health.message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    ))
}
