//! GET /api/v1/stats

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::hub::HubStats;

/// Connection count, authenticated users and active rooms
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<HubStats> {
    Json(state.hub.stats().await)
}
