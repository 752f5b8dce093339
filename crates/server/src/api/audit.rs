use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use packer_core::{AuditFilter, AuditRecord};

use super::error::ApiError;
use crate::state::AppState;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    /// Filter by picking ID
    pub picking_id: Option<i64>,
    /// Filter by event type
    pub event_type: Option<String>,
    /// Filter by user ID
    pub user_id: Option<String>,
    /// Filter events after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter events before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for audit query endpoint
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Total number of matching events
    pub total: i64,
    /// Limit used for this query
    pub limit: i64,
    /// Offset used for this query
    pub offset: i64,
}

/// Query audit events
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, ApiError> {
    let mut filter = AuditFilter::new()
        .with_limit(params.limit.unwrap_or(DEFAULT_LIMIT))
        .with_offset(params.offset.unwrap_or(0));

    if let Some(picking_id) = params.picking_id {
        filter = filter.with_picking_id(picking_id);
    }
    if let Some(ref event_type) = params.event_type {
        filter = filter.with_event_type(event_type);
    }
    if let Some(ref user_id) = params.user_id {
        filter = filter.with_user_id(user_id);
    }
    if params.from.is_some() || params.to.is_some() {
        filter = filter.with_time_range(params.from, params.to);
    }

    let events = state.audit_store().query(&filter)?;
    // count ignores limit and offset
    let total = state.audit_store().count(&filter)?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}
