//! HTTP surface of the packer: wizard endpoints, master data, pickings and audit.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
