//! Target management endpoints
//!
//! Every route is scoped to the owner from `X-Owner-Id`; targets of other
//! owners answer 404.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::TargetId;
use crate::api::{
    error::{ApiError, ApiResult},
    extract::Owner,
    state::ApiState,
    types::{
        AddTargetRequest, HistoryQuery, HistoryResponse, IntervalRequest, TargetView,
        TargetsResponse,
    },
};
use crate::registry::DEFAULT_HISTORY_LIMIT;

/// Upper bound for `?limit=` on history
const MAX_HISTORY_LIMIT: usize = 1000;

async fn view(state: &ApiState, owner: Owner, id: TargetId) -> ApiResult<Json<TargetView>> {
    let target = state
        .registry
        .target(Some(owner.0), id)
        .await?
        .ok_or_else(|| ApiError::target_not_found(id))?;
    let job = state.registry.job_info(id).await;

    Ok(Json(TargetView::new(target, job)))
}

/// GET /api/v1/targets
pub async fn list_targets(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
) -> ApiResult<Json<TargetsResponse>> {
    let mut targets = Vec::new();

    for target in state.registry.list_targets(owner_id).await? {
        let job = state.registry.job_info(target.id).await;
        targets.push(TargetView::new(target, job));
    }

    Ok(Json(TargetsResponse {
        count: targets.len(),
        targets,
    }))
}

/// POST /api/v1/targets
///
/// Stores the target and schedules its first probe one interval from now
pub async fn add_target(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Json(request): Json<AddTargetRequest>,
) -> ApiResult<(StatusCode, Json<TargetView>)> {
    let target = state
        .registry
        .add_target(owner_id, &request.url, request.interval)
        .await?;
    let job = state.registry.job_info(target.id).await;

    Ok((StatusCode::CREATED, Json(TargetView::new(target, job))))
}

/// DELETE /api/v1/targets/:id
pub async fn remove_target(
    State(state): State<ApiState>,
    owner: Owner,
    Path(id): Path<TargetId>,
) -> ApiResult<StatusCode> {
    if !state.registry.remove_target(Some(owner.0), id).await? {
        return Err(ApiError::target_not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/targets/:id/interval
pub async fn set_interval(
    State(state): State<ApiState>,
    owner: Owner,
    Path(id): Path<TargetId>,
    Json(request): Json<IntervalRequest>,
) -> ApiResult<Json<TargetView>> {
    if !state
        .registry
        .set_interval(Some(owner.0), id, request.seconds)
        .await?
    {
        return Err(ApiError::target_not_found(id));
    }

    view(&state, owner, id).await
}

/// POST /api/v1/targets/:id/pause
pub async fn pause_target(
    State(state): State<ApiState>,
    owner: Owner,
    Path(id): Path<TargetId>,
) -> ApiResult<Json<TargetView>> {
    if !state.registry.pause_target(Some(owner.0), id).await? {
        return Err(ApiError::target_not_found(id));
    }

    view(&state, owner, id).await
}

/// POST /api/v1/targets/:id/resume
pub async fn resume_target(
    State(state): State<ApiState>,
    owner: Owner,
    Path(id): Path<TargetId>,
) -> ApiResult<Json<TargetView>> {
    if !state.registry.resume_target(Some(owner.0), id).await? {
        return Err(ApiError::target_not_found(id));
    }

    view(&state, owner, id).await
}

/// GET /api/v1/targets/:id/history?limit=
///
/// Most recent outcomes first, 10 by default
pub async fn get_history(
    State(state): State<ApiState>,
    owner: Owner,
    Path(id): Path<TargetId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let outcomes = state
        .registry
        .history(Some(owner.0), id, limit)
        .await?
        .ok_or_else(|| ApiError::target_not_found(id))?;

    Ok(Json(HistoryResponse {
        target_id: id,
        count: outcomes.len(),
        outcomes,
    }))
}
