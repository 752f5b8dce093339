//! One-step creation of a packed picking from a list of product lines.

mod orchestrator;
mod service;
mod types;

pub use orchestrator::{create_packed_picking, lot_values, move_values, picking_values};
pub use service::PackingService;
pub use types::{PackLine, PackedPicking, PackedPickingRequest, PackingError};
