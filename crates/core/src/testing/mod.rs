//! Testing utilities: seeded stores and a recording unit of work.
//!
//! # Example
//!
//! ```rust,ignore
//! use packer_core::testing::{fixtures, RecordingUnitOfWork};
//!
//! let (store, warehouse) = fixtures::store_with_warehouse();
//! let products = fixtures::products(&store, 3);
//!
//! let mut uow = RecordingUnitOfWork::new(store.begin()?).fail_on("put_in_pack");
//! // run the orchestrator against `uow`, then inspect `uow.calls()`
//! ```

mod recording;

pub use recording::RecordingUnitOfWork;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::stock::{
        ensure_default_warehouse, MoveLine, NewPartner, NewProduct, Partner, Product,
        SqliteStockStore, StockStore, Warehouse,
    };

    /// An in-memory store holding the default warehouse.
    pub fn store_with_warehouse() -> (SqliteStockStore, Warehouse) {
        let store = SqliteStockStore::in_memory().expect("in-memory store");
        let warehouse = ensure_default_warehouse(&store)
            .expect("seed warehouse")
            .expect("store was empty");
        (store, warehouse)
    }

    /// Create `count` products named "Product 1", "Product 2", ...
    pub fn products(store: &dyn StockStore, count: usize) -> Vec<Product> {
        (1..=count)
            .map(|i| {
                store
                    .create_product(NewProduct {
                        name: format!("Product {}", i),
                        default_code: Some(format!("P{}", i)),
                    })
                    .expect("create product")
            })
            .collect()
    }

    pub fn partner(store: &dyn StockStore, name: &str) -> Partner {
        store
            .create_partner(NewPartner {
                name: name.to_string(),
            })
            .expect("create partner")
    }

    /// A detached move-line value for helper tests.
    pub fn move_line(id: i64, product_id: i64, company_id: i64) -> MoveLine {
        MoveLine {
            id,
            move_id: id,
            picking_id: 1,
            product_id,
            quantity_done: 1.0,
            company_id,
            location_id: 1,
            location_dest_id: 2,
            owner_id: None,
            lot_id: None,
            lot_name: None,
            result_package_id: None,
            result_package_name: None,
        }
    }
}
