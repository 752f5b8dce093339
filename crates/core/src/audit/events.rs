use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Packing events
    /// A picking was created, filled and packed in one step.
    PickingPacked {
        picking_id: i64,
        picking_name: String,
        operation_type_id: i64,
        requested_by: String,
        line_count: u32,
        /// Names of the lots created for the lines, in line order
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        lot_names: Vec<String>,
        package_name: String,
        /// Picking state after packing
        state: String,
    },
    /// A packed picking request was rejected; nothing was persisted.
    PackedPickingFailed {
        operation_type_id: i64,
        requested_by: String,
        line_count: u32,
        error: String,
    },

    // Master data events
    MasterDataCreated {
        user_id: String,
        /// Kind of record, e.g. "product" or "operation_type"
        model: String,
        record_id: i64,
        name: String,
    },
    StockAdjusted {
        user_id: String,
        product_id: i64,
        location_id: i64,
        /// New on-hand quantity
        quantity: f64,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::PickingPacked { .. } => "picking_packed",
            Self::PackedPickingFailed { .. } => "packed_picking_failed",
            Self::MasterDataCreated { .. } => "master_data_created",
            Self::StockAdjusted { .. } => "stock_adjusted",
        }
    }

    /// Extract picking_id if this event relates to a persisted picking
    pub fn picking_id(&self) -> Option<i64> {
        match self {
            Self::PickingPacked { picking_id, .. } => Some(*picking_id),
            _ => None,
        }
    }

    /// Extract user_id if this event was triggered by a user action
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::PickingPacked { requested_by, .. }
            | Self::PackedPickingFailed { requested_by, .. } => Some(requested_by),
            Self::MasterDataCreated { user_id, .. } | Self::StockAdjusted { user_id, .. } => {
                Some(user_id)
            }
            _ => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub picking_id: Option<i64>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}
