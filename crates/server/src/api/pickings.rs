use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use packer_core::{Picking, PickingFilter, PickingState};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for picking listings
const MAX_LIMIT: i64 = 1000;

/// Default limit for picking listings
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for listing pickings
#[derive(Debug, Deserialize)]
pub struct ListPickingsQuery {
    /// Filter by state (draft, confirmed, assigned, done, cancelled)
    pub state: Option<String>,
    pub operation_type_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing pickings
#[derive(Debug, Serialize)]
pub struct PickingListResponse {
    pub pickings: Vec<Picking>,
    /// Total number of matching pickings
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_pickings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPickingsQuery>,
) -> Result<Json<PickingListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut filter = PickingFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref raw) = query.state {
        let picking_state: PickingState = raw.parse().map_err(ApiError::unprocessable)?;
        filter = filter.with_state(picking_state);
    }
    if let Some(operation_type_id) = query.operation_type_id {
        filter = filter.with_operation_type(operation_type_id);
    }

    let pickings = state.stock().list_pickings(&filter)?;
    let total = state.stock().count_pickings(&filter)?;

    Ok(Json(PickingListResponse {
        pickings,
        total,
        limit,
        offset,
    }))
}

pub async fn get_picking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Picking>, ApiError> {
    state
        .stock()
        .get_picking(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("picking not found: {}", id)))
}
