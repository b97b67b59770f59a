//! Owner registration endpoint

use axum::{Json, extract::State, http::StatusCode};

use crate::api::{
    error::ApiResult, extract::Owner, state::ApiState, types::RegisterOwnerRequest,
};

/// PUT /api/v1/owner
///
/// Registers (or replaces) the chat notifications are delivered to
pub async fn register_owner(
    State(state): State<ApiState>,
    Owner(owner_id): Owner,
    Json(request): Json<RegisterOwnerRequest>,
) -> ApiResult<StatusCode> {
    state
        .registry
        .register_owner(owner_id, request.chat_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
