use crate::stock::{
    Company, Location, Lot, Move, NewCompany, NewLocation, NewLot, NewMove, NewOperationType,
    NewPicking, OperationType, Package, Picking, PickingState, Product, StockError, UnitOfWork,
};

/// Wraps a unit of work, recording each call by name and optionally failing one of them.
pub struct RecordingUnitOfWork<'a> {
    inner: Box<dyn UnitOfWork + 'a>,
    calls: Vec<&'static str>,
    fail_on: Option<&'static str>,
}

impl<'a> RecordingUnitOfWork<'a> {
    pub fn new(inner: Box<dyn UnitOfWork + 'a>) -> Self {
        Self {
            inner,
            calls: Vec::new(),
            fail_on: None,
        }
    }

    /// Make the named operation fail with a database error instead of running.
    pub fn fail_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Names of the mutating operations called so far, in order.
    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    fn record(&mut self, operation: &'static str) -> Result<(), StockError> {
        self.calls.push(operation);
        if self.fail_on == Some(operation) {
            return Err(StockError::Database(format!("injected failure in {}", operation)));
        }
        Ok(())
    }
}

impl UnitOfWork for RecordingUnitOfWork<'_> {
    fn create_company(&mut self, request: NewCompany) -> Result<Company, StockError> {
        self.record("create_company")?;
        self.inner.create_company(request)
    }

    fn create_location(&mut self, request: NewLocation) -> Result<Location, StockError> {
        self.record("create_location")?;
        self.inner.create_location(request)
    }

    fn create_operation_type(
        &mut self,
        request: NewOperationType,
    ) -> Result<OperationType, StockError> {
        self.record("create_operation_type")?;
        self.inner.create_operation_type(request)
    }

    fn product(&mut self, id: i64) -> Result<Product, StockError> {
        self.inner.product(id)
    }

    fn create_picking(&mut self, request: NewPicking) -> Result<Picking, StockError> {
        self.record("create_picking")?;
        self.inner.create_picking(request)
    }

    fn create_move(&mut self, request: NewMove) -> Result<Move, StockError> {
        self.record("create_move")?;
        self.inner.create_move(request)
    }

    fn create_lots(&mut self, requests: &[NewLot]) -> Result<Vec<Lot>, StockError> {
        self.record("create_lots")?;
        self.inner.create_lots(requests)
    }

    fn assign_lot(&mut self, move_line_id: i64, lot_id: i64) -> Result<(), StockError> {
        self.record("assign_lot")?;
        self.inner.assign_lot(move_line_id, lot_id)
    }

    fn confirm_picking(&mut self, picking_id: i64) -> Result<PickingState, StockError> {
        self.record("confirm_picking")?;
        self.inner.confirm_picking(picking_id)
    }

    fn put_in_pack(&mut self, picking_id: i64) -> Result<Package, StockError> {
        self.record("put_in_pack")?;
        self.inner.put_in_pack(picking_id)
    }

    fn rename_package(&mut self, package_id: i64, name: &str) -> Result<Package, StockError> {
        self.record("rename_package")?;
        self.inner.rename_package(package_id, name)
    }

    fn picking(&mut self, picking_id: i64) -> Result<Picking, StockError> {
        self.inner.picking(picking_id)
    }

    fn commit(self: Box<Self>) -> Result<(), StockError> {
        let this = *self;
        this.inner.commit()
    }
}
