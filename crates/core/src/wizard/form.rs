//! Static description of the Pack Products form, served to clients that render it.

use serde::Serialize;

pub const MENU_PATH: [&str; 3] = ["Inventory", "Operations", "Pack Products"];

pub const CREATE_LOTS_HELP: &str =
    "If checked, system will create lots for the products automatically.";

pub const SET_READY_HELP: &str = "If checked, system will try to set picking to the 'Ready' state.";

/// Input widget of a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Checkbox,
    /// Reference to a record, listed by the given API collection.
    Reference { collection: &'static str },
    /// Nested rows described by `FormDefinition::line_fields`.
    Lines,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<&'static str>,
}

impl FormField {
    fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            help: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormDefinition {
    pub title: &'static str,
    pub menu_path: Vec<&'static str>,
    pub fields: Vec<FormField>,
    pub line_fields: Vec<FormField>,
    pub submit_label: &'static str,
}

/// The Pack Products form.
pub fn form_definition() -> FormDefinition {
    use FieldKind::*;

    FormDefinition {
        title: "Pack Products",
        menu_path: MENU_PATH.to_vec(),
        fields: vec![
            FormField::new("package_name", "Package Name", Text),
            FormField::new(
                "operation_type_id",
                "Operation Type",
                Reference {
                    collection: "operation-types",
                },
            )
            .required(),
            FormField::new(
                "owner_id",
                "Owner",
                Reference {
                    collection: "partners",
                },
            ),
            FormField::new(
                "location_id",
                "Location",
                Reference {
                    collection: "locations",
                },
            ),
            FormField::new(
                "location_dest_id",
                "Location Destination",
                Reference {
                    collection: "locations",
                },
            ),
            FormField::new("create_lots", "Create Lots", Checkbox).help(CREATE_LOTS_HELP),
            FormField::new("set_ready", "Set Ready", Checkbox).help(SET_READY_HELP),
            FormField::new("lines", "Lines", Lines).required(),
        ],
        line_fields: vec![
            FormField::new(
                "product_id",
                "Product",
                Reference {
                    collection: "products",
                },
            )
            .required(),
            FormField::new("qty_done", "Quantity Done", Number).required(),
            FormField::new("serial", "Serial", Text),
        ],
        submit_label: "Pack",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        let form = form_definition();
        let required: Vec<&str> = form
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        assert_eq!(required, vec!["operation_type_id", "lines"]);
    }

    #[test]
    fn test_serializes_widgets_and_help() {
        let json = serde_json::to_value(form_definition()).unwrap();
        assert_eq!(
            json["menu_path"],
            serde_json::json!(["Inventory", "Operations", "Pack Products"])
        );

        let create_lots = &json["fields"][5];
        assert_eq!(create_lots["name"], "create_lots");
        assert_eq!(create_lots["widget"], "checkbox");
        assert_eq!(create_lots["help"], CREATE_LOTS_HELP);

        let operation_type = &json["fields"][1];
        assert_eq!(operation_type["widget"], "reference");
        assert_eq!(operation_type["collection"], "operation-types");
        assert!(json["fields"][0].get("help").is_none());
    }
}
