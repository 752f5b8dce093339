//! Master data endpoints: products, locations, partners, operation types and on-hand stock.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use packer_core::stock::{
    Location, LocationUsage, NewLocation, NewOperationType, NewPartner, NewProduct,
    OperationType, Partner, PickingKind, Product, Quant,
};
use packer_core::AuditEvent;

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::state::AppState;

/// Request body for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub default_code: Option<String>,
}

/// Request body for creating a location
#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub usage: LocationUsage,
    #[serde(default)]
    pub company_id: Option<i64>,
}

/// Request body for creating a partner
#[derive(Debug, Deserialize)]
pub struct CreatePartnerRequest {
    pub name: String,
}

/// Request body for creating an operation type
#[derive(Debug, Deserialize)]
pub struct CreateOperationTypeRequest {
    pub name: String,
    pub kind: PickingKind,
    pub sequence_prefix: String,
    #[serde(default)]
    pub default_location_id: Option<i64>,
    #[serde(default)]
    pub default_location_dest_id: Option<i64>,
    /// Defaults to the first company.
    #[serde(default)]
    pub company_id: Option<i64>,
}

/// Request body for setting the on-hand quantity of a product at a location
#[derive(Debug, Deserialize)]
pub struct SetQuantRequest {
    pub product_id: i64,
    pub location_id: i64,
    pub quantity: f64,
}

async fn record_created(state: &AppState, user_id: String, model: &str, id: i64, name: &str) {
    tracing::info!("Created {} {} ({}) for {}", model, id, name, user_id);
    state
        .audit()
        .emit(AuditEvent::MasterDataCreated {
            user_id,
            model: model.to_string(),
            record_id: id,
            name: name.to_string(),
        })
        .await;
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.stock().list_products()?))
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.stock().create_product(NewProduct {
        name: body.name,
        default_code: body.default_code,
    })?;
    record_created(&state, user_id, "product", product.id, &product.name).await;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_locations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Location>>, ApiError> {
    Ok(Json(state.stock().list_locations()?))
}

pub async fn create_location(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    let location = state
        .stock()
        .create_location(NewLocation {
            name: body.name,
            usage: body.usage,
            company_id: body.company_id,
        })
        .map_err(ApiError::from_body)?;
    record_created(&state, user_id, "location", location.id, &location.name).await;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn list_partners(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Partner>>, ApiError> {
    Ok(Json(state.stock().list_partners()?))
}

pub async fn create_partner(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreatePartnerRequest>,
) -> Result<(StatusCode, Json<Partner>), ApiError> {
    let partner = state
        .stock()
        .create_partner(NewPartner { name: body.name })?;
    record_created(&state, user_id, "partner", partner.id, &partner.name).await;
    Ok((StatusCode::CREATED, Json(partner)))
}

pub async fn list_operation_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OperationType>>, ApiError> {
    Ok(Json(state.stock().list_operation_types()?))
}

pub async fn create_operation_type(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateOperationTypeRequest>,
) -> Result<(StatusCode, Json<OperationType>), ApiError> {
    let company_id = match body.company_id {
        Some(id) => id,
        None => state
            .stock()
            .list_companies()?
            .first()
            .map(|company| company.id)
            .ok_or_else(|| ApiError::unprocessable("No company exists; set company_id"))?,
    };

    let operation_type = state
        .stock()
        .create_operation_type(NewOperationType {
            name: body.name,
            kind: body.kind,
            sequence_prefix: body.sequence_prefix,
            default_location_id: body.default_location_id,
            default_location_dest_id: body.default_location_dest_id,
            company_id,
        })
        .map_err(ApiError::from_body)?;
    record_created(
        &state,
        user_id,
        "operation_type",
        operation_type.id,
        &operation_type.name,
    )
    .await;
    Ok((StatusCode::CREATED, Json(operation_type)))
}

pub async fn set_quant(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<SetQuantRequest>,
) -> Result<Json<Quant>, ApiError> {
    let quant = state
        .stock()
        .set_quant(body.product_id, body.location_id, body.quantity)
        .map_err(ApiError::from_body)?;

    tracing::info!(
        "Set on-hand quantity of product {} at location {} to {}",
        quant.product_id,
        quant.location_id,
        quant.quantity
    );
    state
        .audit()
        .emit(AuditEvent::StockAdjusted {
            user_id,
            product_id: quant.product_id,
            location_id: quant.location_id,
            quantity: quant.quantity,
        })
        .await;

    Ok(Json(quant))
}
