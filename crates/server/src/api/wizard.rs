//! Pack Products wizard endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use packer_core::wizard::FormDefinition;
use packer_core::{form_definition, PackProductsWizard, WizardContext, WizardOutcome};

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::state::AppState;

/// Describe the form so clients can render it.
pub async fn get_pack_products_form() -> Json<FormDefinition> {
    Json(form_definition())
}

/// Submit the form.
///
/// Returns `201 Created` with the new picking, or `200 OK` with a window
/// action opening it when `go_to_picking=true`.
pub async fn submit_pack_products(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(context): Query<WizardContext>,
    Json(form): Json<PackProductsWizard>,
) -> Result<Response, ApiError> {
    let outcome = form
        .submit(state.packing(), context, &user_id)
        .map_err(ApiError::from_body)?;

    Ok(match outcome {
        WizardOutcome::Picking(picking) => (StatusCode::CREATED, Json(picking)).into_response(),
        WizardOutcome::Action(action) => (StatusCode::OK, Json(action)).into_response(),
    })
}
