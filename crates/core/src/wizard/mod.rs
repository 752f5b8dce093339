//! The Pack Products wizard: a transient form that feeds the packing service.

mod form;

pub use form::{form_definition, FieldKind, FormDefinition, FormField, MENU_PATH};

use serde::{Deserialize, Serialize};

use crate::packing::{PackLine, PackedPickingRequest, PackingError, PackingService};
use crate::stock::Picking;

/// One row of the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackProductsLine {
    pub product_id: i64,
    pub qty_done: f64,
    #[serde(default)]
    pub serial: Option<String>,
}

/// Values submitted through the Pack Products form. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackProductsWizard {
    pub operation_type_id: i64,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub location_dest_id: Option<i64>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub create_lots: bool,
    #[serde(default)]
    pub set_ready: bool,
    #[serde(default)]
    pub lines: Vec<PackProductsLine>,
}

/// Caller context for a submission.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WizardContext {
    /// Return a navigation action to the new picking instead of the picking itself.
    #[serde(default)]
    pub go_to_picking: bool,
}

/// Action telling the client to open a record in a form view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub name: String,
    pub model: String,
    pub res_id: i64,
    pub view_mode: String,
}

impl WindowAction {
    pub fn open_picking(picking_id: i64) -> Self {
        Self {
            action_type: "window".to_string(),
            name: "Packed Picking".to_string(),
            model: "stock.picking".to_string(),
            res_id: picking_id,
            view_mode: "form".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WizardOutcome {
    Picking(Picking),
    Action(WindowAction),
}

impl PackProductsWizard {
    /// The packing request for this form, lines kept in order.
    pub fn to_request(&self) -> PackedPickingRequest {
        PackedPickingRequest {
            operation_type_id: self.operation_type_id,
            lines: self
                .lines
                .iter()
                .map(|line| PackLine {
                    product_id: line.product_id,
                    quantity: line.qty_done,
                    serial: line.serial.clone(),
                })
                .collect(),
            owner_id: self.owner_id,
            location_id: self.location_id,
            location_dest_id: self.location_dest_id,
            package_name: self.package_name.clone(),
            create_lots: self.create_lots,
            set_ready: self.set_ready,
        }
    }

    /// Pack the form's lines into a new picking.
    pub fn submit(
        &self,
        service: &PackingService,
        context: WizardContext,
        requested_by: &str,
    ) -> Result<WizardOutcome, PackingError> {
        if self.lines.is_empty() {
            return Err(PackingError::EmptyLines);
        }

        let picking = service.create_packed_picking(&self.to_request(), requested_by)?;
        if context.go_to_picking {
            Ok(WizardOutcome::Action(WindowAction::open_picking(picking.id)))
        } else {
            Ok(WizardOutcome::Picking(picking))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::fixtures;

    fn wizard(operation_type_id: i64, lines: Vec<PackProductsLine>) -> PackProductsWizard {
        PackProductsWizard {
            operation_type_id,
            owner_id: None,
            location_id: None,
            location_dest_id: None,
            package_name: None,
            create_lots: false,
            set_ready: false,
            lines,
        }
    }

    #[test]
    fn test_to_request_keeps_line_order() {
        let mut form = wizard(
            3,
            vec![
                PackProductsLine {
                    product_id: 8,
                    qty_done: 2.0,
                    serial: Some("A".to_string()),
                },
                PackProductsLine {
                    product_id: 5,
                    qty_done: 1.0,
                    serial: None,
                },
            ],
        );
        form.create_lots = true;
        form.package_name = Some("Box".to_string());

        let request = form.to_request();
        assert_eq!(request.operation_type_id, 3);
        assert_eq!(
            request.lines,
            vec![PackLine::new(8, 2.0).with_serial("A"), PackLine::new(5, 1.0)]
        );
        assert!(request.create_lots);
        assert!(!request.set_ready);
        assert_eq!(request.package_name.as_deref(), Some("Box"));
    }

    #[test]
    fn test_deserialize_form_body() {
        let body = r#"{
            "operation_type_id": 2,
            "package_name": "Crate",
            "set_ready": true,
            "lines": [{"product_id": 1, "qty_done": 4}]
        }"#;
        let form: PackProductsWizard = serde_json::from_str(body).unwrap();
        assert!(form.set_ready);
        assert!(!form.create_lots);
        assert_eq!(form.lines[0].qty_done, 4.0);
        assert_eq!(form.lines[0].serial, None);
    }

    #[test]
    fn test_submit_without_lines() {
        let (store, warehouse) = fixtures::store_with_warehouse();
        let service = PackingService::new(Arc::new(store));

        let result = wizard(warehouse.delivery.id, vec![]).submit(
            &service,
            WizardContext::default(),
            "tester",
        );
        assert!(matches!(result, Err(PackingError::EmptyLines)));
    }

    #[test]
    fn test_submit_returns_picking_or_action() {
        let (store, warehouse) = fixtures::store_with_warehouse();
        let products = fixtures::products(&store, 1);
        let service = PackingService::new(Arc::new(store));
        let form = wizard(
            warehouse.delivery.id,
            vec![PackProductsLine {
                product_id: products[0].id,
                qty_done: 1.0,
                serial: None,
            }],
        );

        let picking = match form
            .submit(&service, WizardContext::default(), "tester")
            .unwrap()
        {
            WizardOutcome::Picking(picking) => picking,
            other => panic!("expected a picking, got {:?}", other),
        };

        let action = form
            .submit(
                &service,
                WizardContext {
                    go_to_picking: true,
                },
                "tester",
            )
            .unwrap();
        match action {
            WizardOutcome::Action(action) => {
                assert_eq!(action.action_type, "window");
                assert_eq!(action.name, "Packed Picking");
                assert_eq!(action.model, "stock.picking");
                assert_eq!(action.view_mode, "form");
                assert_ne!(action.res_id, picking.id);
            }
            other => panic!("expected an action, got {:?}", other),
        }
    }

    #[test]
    fn test_window_action_json() {
        let json = serde_json::to_value(WindowAction::open_picking(42)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "window",
                "name": "Packed Picking",
                "model": "stock.picking",
                "res_id": 42,
                "view_mode": "form"
            })
        );
    }
}
