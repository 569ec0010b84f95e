//! Trigger Routes
//!
//! Internal endpoints for services that cannot link the crate directly.
//! They go through the same [`EventTrigger`](crate::triggers::EventTrigger)
//! methods as in-process callers.
//!
//! - POST /api/v1/notifications/:user_id - Notify every device of a user
//! - POST /api/v1/broadcast/role/:role - Custom event to a role room
//! - POST /api/v1/broadcast - Custom event to every connection

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::BroadcastRequest;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::hub::Role;
use crate::triggers::{Notification, TriggerReport};

/// POST /api/v1/notifications/:user_id
pub async fn send_notification(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(notification): Json<Notification>,
) -> ApiResult<Json<TriggerReport>> {
    if user_id.trim().is_empty() {
        return Err(ApiError::Validation("user id cannot be empty".to_string()));
    }
    if notification.title.trim().is_empty() {
        return Err(ApiError::Validation("notification title cannot be empty".to_string()));
    }

    let report = state.triggers.send_notification(&user_id, notification).await;
    Ok(Json(report))
}

/// POST /api/v1/broadcast/role/:role
pub async fn broadcast_to_role(
    State(state): State<Arc<AppState>>,
    Path(role): Path<String>,
    Json(request): Json<BroadcastRequest>,
) -> ApiResult<Json<TriggerReport>> {
    let role: Role = role.parse()?;
    let report = state
        .triggers
        .broadcast_to_role(role, &request.event, request.data)
        .await?;
    Ok(Json(report))
}

/// POST /api/v1/broadcast
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BroadcastRequest>,
) -> ApiResult<Json<TriggerReport>> {
    let report = state.triggers.broadcast(&request.event, request.data).await?;
    Ok(Json(report))
}
