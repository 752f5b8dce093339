//! Stock storage traits, typed requests and errors.

use thiserror::Error;

use super::types::{
    Company, Location, LocationUsage, Lot, Move, OperationType, Package, Partner, Picking,
    PickingKind, PickingState, Product, Quant,
};

/// Error type for stock operations.
#[derive(Debug, Error)]
pub enum StockError {
    /// Referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A business rule rejected the values.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Cannot perform operation due to the picking's current state.
    #[error("Cannot {operation} picking {picking_id}: current state is {state}")]
    InvalidState {
        picking_id: i64,
        state: String,
        operation: String,
    },

    /// A uniqueness rule was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl StockError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

// ============================================================================
// Master Data Requests
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewPartner {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub default_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub name: String,
    pub usage: LocationUsage,
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewOperationType {
    pub name: String,
    pub kind: PickingKind,
    pub sequence_prefix: String,
    pub default_location_id: Option<i64>,
    pub default_location_dest_id: Option<i64>,
    pub company_id: i64,
}

// ============================================================================
// Transactional Requests
// ============================================================================

/// Request to create a picking header.
#[derive(Debug, Clone)]
pub struct NewPicking {
    pub operation_type_id: i64,
    pub owner_id: Option<i64>,
    /// Source location; the operation type default when `None`.
    pub location_id: Option<i64>,
    /// Destination location; the operation type default when `None`.
    pub location_dest_id: Option<i64>,
    pub created_by: String,
}

/// Request to create a move-line nested in a [`NewMove`].
#[derive(Debug, Clone)]
pub struct NewMoveLine {
    pub product_id: i64,
    pub quantity_done: f64,
}

/// Request to create a move with its move-lines inside a picking.
#[derive(Debug, Clone)]
pub struct NewMove {
    pub picking_id: i64,
    pub product_id: i64,
    pub name: String,
    pub location_id: i64,
    pub location_dest_id: i64,
    pub lines: Vec<NewMoveLine>,
}

/// Request to create a lot. A `None` name takes the next lot sequence value.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub name: Option<String>,
    pub product_id: i64,
    pub company_id: i64,
}

/// Filter for querying pickings.
#[derive(Debug, Clone, Default)]
pub struct PickingFilter {
    /// Filter by state.
    pub state: Option<PickingState>,
    /// Filter by operation type.
    pub operation_type_id: Option<i64>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl PickingFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            state: None,
            operation_type_id: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_state(mut self, state: PickingState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_operation_type(mut self, operation_type_id: i64) -> Self {
        self.operation_type_id = Some(operation_type_id);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A unit of work over the stock records.
///
/// Everything done through one unit of work becomes visible atomically on
/// [`commit`](UnitOfWork::commit). Dropping it without committing discards
/// every change.
pub trait UnitOfWork {
    fn create_company(&mut self, request: NewCompany) -> Result<Company, StockError>;

    fn create_location(&mut self, request: NewLocation) -> Result<Location, StockError>;

    fn create_operation_type(
        &mut self,
        request: NewOperationType,
    ) -> Result<OperationType, StockError>;

    /// Look up a product inside this unit of work.
    fn product(&mut self, id: i64) -> Result<Product, StockError>;

    /// Create a draft picking. Unset locations fall back to the operation type defaults.
    fn create_picking(&mut self, request: NewPicking) -> Result<Picking, StockError>;

    /// Create a move and its move-lines. Lines are returned in request order.
    fn create_move(&mut self, request: NewMove) -> Result<Move, StockError>;

    /// Create lots. The result is positional: `result[i]` comes from `requests[i]`.
    fn create_lots(&mut self, requests: &[NewLot]) -> Result<Vec<Lot>, StockError>;

    /// Link a lot to a move-line.
    fn assign_lot(&mut self, move_line_id: i64, lot_id: i64) -> Result<(), StockError>;

    /// Mark a draft picking as to-do and try to reserve its moves.
    fn confirm_picking(&mut self, picking_id: i64) -> Result<PickingState, StockError>;

    /// Put every done, unpacked move-line of the picking into a new package.
    fn put_in_pack(&mut self, picking_id: i64) -> Result<Package, StockError>;

    fn rename_package(&mut self, package_id: i64, name: &str) -> Result<Package, StockError>;

    /// Load a picking with its moves and move-lines.
    fn picking(&mut self, picking_id: i64) -> Result<Picking, StockError>;

    /// Make all changes durable.
    fn commit(self: Box<Self>) -> Result<(), StockError>;
}

/// Trait for stock storage backends.
pub trait StockStore: Send + Sync {
    /// Start a unit of work. Other store calls block until it is committed or dropped.
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StockError>;

    fn create_company(&self, request: NewCompany) -> Result<Company, StockError>;

    fn create_partner(&self, request: NewPartner) -> Result<Partner, StockError>;

    fn create_product(&self, request: NewProduct) -> Result<Product, StockError>;

    fn create_location(&self, request: NewLocation) -> Result<Location, StockError>;

    fn create_operation_type(
        &self,
        request: NewOperationType,
    ) -> Result<OperationType, StockError>;

    fn list_companies(&self) -> Result<Vec<Company>, StockError>;

    fn list_partners(&self) -> Result<Vec<Partner>, StockError>;

    fn list_products(&self) -> Result<Vec<Product>, StockError>;

    fn list_locations(&self) -> Result<Vec<Location>, StockError>;

    fn list_operation_types(&self) -> Result<Vec<OperationType>, StockError>;

    /// Set the on-hand quantity of a product at a location.
    fn set_quant(
        &self,
        product_id: i64,
        location_id: i64,
        quantity: f64,
    ) -> Result<Quant, StockError>;

    /// On-hand quantity of a product at a location (zero when never set).
    fn quant(&self, product_id: i64, location_id: i64) -> Result<Quant, StockError>;

    fn get_picking(&self, id: i64) -> Result<Option<Picking>, StockError>;

    fn list_pickings(&self, filter: &PickingFilter) -> Result<Vec<Picking>, StockError>;

    fn count_pickings(&self, filter: &PickingFilter) -> Result<i64, StockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picking_filter_builder() {
        let filter = PickingFilter::new()
            .with_state(PickingState::Assigned)
            .with_operation_type(3)
            .with_limit(10)
            .with_offset(20);

        assert_eq!(filter.state, Some(PickingState::Assigned));
        assert_eq!(filter.operation_type_id, Some(3));
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset, 20);
    }

    #[test]
    fn test_error_messages() {
        let err = StockError::not_found("product", 42);
        assert_eq!(err.to_string(), "product not found: 42");

        let err = StockError::InvalidState {
            picking_id: 7,
            state: "done".to_string(),
            operation: "put in pack".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot put in pack picking 7: current state is done"
        );
    }
}
