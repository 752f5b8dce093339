use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stock::{Lot, Package, Picking, StockError};

/// One product line to put into the picking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackLine {
    pub product_id: i64,
    /// Done quantity, copied verbatim onto the move-line.
    pub quantity: f64,
    /// Lot name to use when lots are created. Blank means "use the sequence".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

impl PackLine {
    pub fn new(product_id: i64, quantity: f64) -> Self {
        Self {
            product_id,
            quantity,
            serial: None,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// The serial, if it holds anything besides whitespace.
    pub fn usable_serial(&self) -> Option<&str> {
        self.serial.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Everything needed to create, fill and pack one picking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedPickingRequest {
    pub operation_type_id: i64,
    pub lines: Vec<PackLine>,
    #[serde(default)]
    pub owner_id: Option<i64>,
    /// Overrides the operation type's default source location.
    #[serde(default)]
    pub location_id: Option<i64>,
    /// Overrides the operation type's default destination location.
    #[serde(default)]
    pub location_dest_id: Option<i64>,
    /// Final name of the package; the package sequence name is kept when unset.
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub create_lots: bool,
    #[serde(default)]
    pub set_ready: bool,
}

impl PackedPickingRequest {
    pub fn new(operation_type_id: i64, lines: Vec<PackLine>) -> Self {
        Self {
            operation_type_id,
            lines,
            owner_id: None,
            location_id: None,
            location_dest_id: None,
            package_name: None,
            create_lots: false,
            set_ready: false,
        }
    }

    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_locations(mut self, location_id: i64, location_dest_id: i64) -> Self {
        self.location_id = Some(location_id);
        self.location_dest_id = Some(location_dest_id);
        self
    }

    pub fn with_package_name(mut self, name: impl Into<String>) -> Self {
        self.package_name = Some(name.into());
        self
    }

    pub fn with_lots(mut self) -> Self {
        self.create_lots = true;
        self
    }

    pub fn ready(mut self) -> Self {
        self.set_ready = true;
        self
    }
}

/// Result of a packed picking run.
#[derive(Debug, Clone)]
pub struct PackedPicking {
    /// The picking as persisted after the last step.
    pub picking: Picking,
    pub package: Package,
    /// Lots created for the lines, in line order. Empty unless lots were requested.
    pub lots: Vec<Lot>,
}

#[derive(Debug, Error)]
pub enum PackingError {
    #[error("At least one product line is required")]
    EmptyLines,

    #[error(transparent)]
    Stock(#[from] StockError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_serial() {
        assert_eq!(PackLine::new(1, 1.0).usable_serial(), None);
        assert_eq!(PackLine::new(1, 1.0).with_serial("  ").usable_serial(), None);
        assert_eq!(
            PackLine::new(1, 1.0).with_serial("SER1").usable_serial(),
            Some("SER1")
        );
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let json = r#"{"operation_type_id": 2, "lines": [{"product_id": 5, "quantity": 1.5}]}"#;
        let request: PackedPickingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request, PackedPickingRequest::new(2, vec![PackLine::new(5, 1.5)]));
    }

    #[test]
    fn test_stock_error_passes_through() {
        let err: PackingError = StockError::not_found("product", 9).into();
        assert_eq!(err.to_string(), "product not found: 9");
    }
}
