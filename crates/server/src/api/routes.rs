use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, handlers, master_data, pickings, wizard};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Master data
        .route(
            "/products",
            get(master_data::list_products).post(master_data::create_product),
        )
        .route(
            "/locations",
            get(master_data::list_locations).post(master_data::create_location),
        )
        .route(
            "/partners",
            get(master_data::list_partners).post(master_data::create_partner),
        )
        .route(
            "/operation-types",
            get(master_data::list_operation_types).post(master_data::create_operation_type),
        )
        .route("/stock/quants", post(master_data::set_quant))
        // Pickings
        .route("/pickings", get(pickings::list_pickings))
        .route("/pickings/{id}", get(pickings::get_picking))
        // Pack Products wizard
        .route(
            "/wizards/pack-products",
            get(wizard::get_pack_products_form).post(wizard::submit_pack_products),
        )
        // Audit
        .route("/audit", get(audit::query_audit))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
