//! Stock records: pickings, moves, move-lines, lots, packages and the master data they reference.

pub mod bootstrap;
mod sqlite_store;
mod store;
mod types;

pub use bootstrap::{ensure_default_warehouse, seed_warehouse, Warehouse};
pub use sqlite_store::{SqliteStockStore, SqliteUnitOfWork};
pub use store::{
    NewCompany, NewLocation, NewLot, NewMove, NewMoveLine, NewOperationType, NewPartner,
    NewPicking, NewProduct, PickingFilter, StockError, StockStore, UnitOfWork,
};
pub use types::{
    Company, Location, LocationUsage, Lot, Move, MoveLine, MoveState, OperationType, Package,
    Partner, Picking, PickingKind, PickingState, Product, Quant,
};
