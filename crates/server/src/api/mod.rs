pub mod audit;
pub mod error;
pub mod handlers;
pub mod master_data;
pub mod middleware;
pub mod pickings;
pub mod routes;
pub mod wizard;

pub use error::{ApiError, ErrorResponse};
pub use middleware::AuthUser;
pub use routes::create_router;
