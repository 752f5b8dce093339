use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AuditRecord;

/// Largest page a single audit query may return.
pub const MAX_AUDIT_PAGE: i64 = 1000;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Filter for querying audit events
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub picking_id: Option<i64>,
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_picking_id(mut self, picking_id: i64) -> Self {
        self.picking_id = Some(picking_id);
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Page size, clamped to `1..=MAX_AUDIT_PAGE`.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit.clamp(1, MAX_AUDIT_PAGE);
        self
    }

    /// Negative offsets are treated as zero.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset.max(0);
        self
    }
}

/// Trait for audit event storage
pub trait AuditStore: Send + Sync {
    /// Insert an audit record, returns the assigned ID
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Query audit records, newest first
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults() {
        let filter = AuditFilter::new();
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);
        assert!(filter.picking_id.is_none());
    }

    #[test]
    fn test_filter_pagination_is_clamped() {
        let filter = AuditFilter::new().with_limit(5000).with_offset(-3);
        assert_eq!(filter.limit, MAX_AUDIT_PAGE);
        assert_eq!(filter.offset, 0);

        assert_eq!(AuditFilter::new().with_limit(0).limit, 1);
    }
}
