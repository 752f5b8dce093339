//! Core stock data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Master Data
// ============================================================================

/// A legal entity owning stock records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

/// A person or organisation that can own goods in a picking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Partner {
    pub id: i64,
    pub name: String,
}

/// A storable product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Internal reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_code: Option<String>,
}

/// What a location represents. Only internal and transit locations hold
/// on-hand stock that must be available before a move can be reserved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationUsage {
    Internal,
    Supplier,
    Customer,
    Transit,
    Inventory,
    View,
}

impl LocationUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Supplier => "supplier",
            Self::Customer => "customer",
            Self::Transit => "transit",
            Self::Inventory => "inventory",
            Self::View => "view",
        }
    }

    /// Whether goods leaving this location must be covered by on-hand quantity.
    pub fn tracks_stock(&self) -> bool {
        matches!(self, Self::Internal | Self::Transit)
    }
}

impl std::str::FromStr for LocationUsage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Self::Internal),
            "supplier" => Ok(Self::Supplier),
            "customer" => Ok(Self::Customer),
            "transit" => Ok(Self::Transit),
            "inventory" => Ok(Self::Inventory),
            "view" => Ok(Self::View),
            other => Err(format!("unknown location usage: {}", other)),
        }
    }
}

/// A physical or virtual place goods move from or to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub usage: LocationUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
}

/// Category of an operation type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PickingKind {
    Incoming,
    Outgoing,
    Internal,
}

impl PickingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Internal => "internal",
        }
    }
}

impl std::str::FromStr for PickingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Self::Incoming),
            "outgoing" => Ok(Self::Outgoing),
            "internal" => Ok(Self::Internal),
            other => Err(format!("unknown picking kind: {}", other)),
        }
    }
}

/// Configuration of a kind of picking: default locations and naming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationType {
    pub id: i64,
    pub name: String,
    pub kind: PickingKind,
    /// Prefix of picking names, e.g. "WH/OUT/".
    pub sequence_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_location_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_location_dest_id: Option<i64>,
    pub company_id: i64,
}

/// On-hand quantity of a product at a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quant {
    pub product_id: i64,
    pub location_id: i64,
    pub quantity: f64,
    /// Part of `quantity` held by assigned moves of open pickings.
    #[serde(default)]
    pub reserved_quantity: f64,
}

// ============================================================================
// Lifecycle States
// ============================================================================

/// Picking lifecycle state.
///
/// `draft -> confirmed -> assigned -> done`, or `cancelled`.
/// A confirmed picking is waiting for stock; an assigned one is ready.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PickingState {
    Draft,
    Confirmed,
    Assigned,
    Done,
    Cancelled,
}

impl PickingState {
    pub const ALL: [PickingState; 5] = [
        Self::Draft,
        Self::Confirmed,
        Self::Assigned,
        Self::Done,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Assigned => "assigned",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// No further changes are allowed once a picking is done or cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for PickingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PickingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "confirmed" => Ok(Self::Confirmed),
            "assigned" => Ok(Self::Assigned),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown picking state: {}", other)),
        }
    }
}

/// Move lifecycle state. Mirrors the picking states; a picking's state is
/// derived from its moves once confirmed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    Draft,
    Confirmed,
    Assigned,
    Done,
    Cancelled,
}

impl MoveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Assigned => "assigned",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for MoveState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "confirmed" => Ok(Self::Confirmed),
            "assigned" => Ok(Self::Assigned),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown move state: {}", other)),
        }
    }
}

// ============================================================================
// Transactional Records
// ============================================================================

/// A serial or batch identity for a product within a company.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lot {
    pub id: i64,
    pub name: String,
    pub product_id: i64,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A container grouping the output of move-lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One concrete unit of execution of a move.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveLine {
    pub id: i64,
    pub move_id: i64,
    pub picking_id: i64,
    pub product_id: i64,
    pub quantity_done: f64,
    pub company_id: i64,
    pub location_id: i64,
    pub location_dest_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_package_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_package_name: Option<String>,
}

/// A planned movement of one product within a picking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Move {
    pub id: i64,
    pub picking_id: i64,
    pub product_id: i64,
    /// Description, defaults to the product name.
    pub name: String,
    /// Demand quantity.
    pub quantity: f64,
    pub state: MoveState,
    pub location_id: i64,
    pub location_dest_id: i64,
    pub lines: Vec<MoveLine>,
}

/// A goods movement document between two locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Picking {
    pub id: i64,
    /// Reference generated from the operation type sequence, e.g. "WH/OUT/00001".
    pub name: String,
    pub operation_type_id: i64,
    pub state: PickingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    pub location_id: i64,
    pub location_dest_id: i64,
    pub company_id: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub moves: Vec<Move>,
}

impl Picking {
    /// All move-lines of the picking, in creation order.
    pub fn move_lines(&self) -> impl Iterator<Item = &MoveLine> {
        self.moves.iter().flat_map(|m| m.lines.iter())
    }

    /// Distinct result packages referenced by the picking's move-lines.
    pub fn package_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .move_lines()
            .filter_map(|l| l.result_package_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, package: Option<i64>) -> MoveLine {
        MoveLine {
            id,
            move_id: id,
            picking_id: 1,
            product_id: id,
            quantity_done: 1.0,
            company_id: 1,
            location_id: 1,
            location_dest_id: 2,
            owner_id: None,
            lot_id: None,
            lot_name: None,
            result_package_id: package,
            result_package_name: None,
        }
    }

    fn picking_with(lines: Vec<MoveLine>) -> Picking {
        let now = Utc::now();
        Picking {
            id: 1,
            name: "WH/OUT/00001".to_string(),
            operation_type_id: 1,
            state: PickingState::Draft,
            owner_id: None,
            location_id: 1,
            location_dest_id: 2,
            company_id: 1,
            created_by: "tester".to_string(),
            created_at: now,
            updated_at: now,
            moves: lines
                .into_iter()
                .map(|l| Move {
                    id: l.move_id,
                    picking_id: 1,
                    product_id: l.product_id,
                    name: "Thing".to_string(),
                    quantity: l.quantity_done,
                    state: MoveState::Draft,
                    location_id: 1,
                    location_dest_id: 2,
                    lines: vec![l],
                })
                .collect(),
        }
    }

    #[test]
    fn test_picking_state_round_trip_strings() {
        for state in PickingState::ALL {
            assert_eq!(state.as_str().parse::<PickingState>().unwrap(), state);
        }
        assert!("waiting".parse::<PickingState>().is_err());
    }

    #[test]
    fn test_picking_state_serializes_snake_case() {
        let json = serde_json::to_string(&PickingState::Assigned).unwrap();
        assert_eq!(json, "\"assigned\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(PickingState::Done.is_terminal());
        assert!(PickingState::Cancelled.is_terminal());
        assert!(!PickingState::Draft.is_terminal());
        assert!(!PickingState::Confirmed.is_terminal());
        assert!(!PickingState::Assigned.is_terminal());
    }

    #[test]
    fn test_location_usage_tracks_stock() {
        assert!(LocationUsage::Internal.tracks_stock());
        assert!(LocationUsage::Transit.tracks_stock());
        assert!(!LocationUsage::Supplier.tracks_stock());
        assert!(!LocationUsage::Customer.tracks_stock());
        assert_eq!("view".parse::<LocationUsage>().unwrap(), LocationUsage::View);
    }

    #[test]
    fn test_package_ids_are_distinct() {
        let picking = picking_with(vec![line(1, Some(7)), line(2, Some(7)), line(3, None)]);
        assert_eq!(picking.move_lines().count(), 3);
        assert_eq!(picking.package_ids(), vec![7]);
    }
}
