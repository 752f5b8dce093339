//! First-run seeding of a minimal warehouse.

use tracing::info;

use super::{
    Company, Location, LocationUsage, NewCompany, NewLocation, NewOperationType, OperationType,
    PickingKind, StockError, StockStore, UnitOfWork,
};

/// Records created by [`ensure_default_warehouse`].
#[derive(Debug, Clone)]
pub struct Warehouse {
    pub company: Company,
    pub stock: Location,
    pub vendors: Location,
    pub customers: Location,
    pub receipts: OperationType,
    pub delivery: OperationType,
    pub internal: OperationType,
}

/// Seed a company, its stock, vendor and customer locations, and the three
/// standard operation types.
///
/// Does nothing and returns `None` when any operation type already exists.
/// The records are written in one unit of work, so a failed run leaves
/// nothing behind.
pub fn ensure_default_warehouse(store: &dyn StockStore) -> Result<Option<Warehouse>, StockError> {
    if !store.list_operation_types()?.is_empty() {
        return Ok(None);
    }

    let mut uow = store.begin()?;
    let warehouse = seed_warehouse(&mut *uow)?;
    uow.commit()?;

    info!("Seeded default warehouse for company '{}'", warehouse.company.name);
    Ok(Some(warehouse))
}

/// Write the default warehouse records through `uow`.
pub fn seed_warehouse(uow: &mut dyn UnitOfWork) -> Result<Warehouse, StockError> {
    let company = uow.create_company(NewCompany {
        name: "My Company".to_string(),
    })?;

    let location = |name: &str, usage: LocationUsage, company_id: Option<i64>| NewLocation {
        name: name.to_string(),
        usage,
        company_id,
    };
    let stock = uow.create_location(location(
        "WH/Stock",
        LocationUsage::Internal,
        Some(company.id),
    ))?;
    let vendors = uow.create_location(location("Partners/Vendors", LocationUsage::Supplier, None))?;
    let customers =
        uow.create_location(location("Partners/Customers", LocationUsage::Customer, None))?;

    let operation_type = |name: &str, kind: PickingKind, prefix: &str, from: i64, to: i64| {
        NewOperationType {
            name: name.to_string(),
            kind,
            sequence_prefix: prefix.to_string(),
            default_location_id: Some(from),
            default_location_dest_id: Some(to),
            company_id: company.id,
        }
    };
    let receipts = uow.create_operation_type(operation_type(
        "Receipts",
        PickingKind::Incoming,
        "WH/IN/",
        vendors.id,
        stock.id,
    ))?;
    let delivery = uow.create_operation_type(operation_type(
        "Delivery Orders",
        PickingKind::Outgoing,
        "WH/OUT/",
        stock.id,
        customers.id,
    ))?;
    let internal = uow.create_operation_type(operation_type(
        "Internal Transfers",
        PickingKind::Internal,
        "WH/INT/",
        stock.id,
        stock.id,
    ))?;

    Ok(Warehouse {
        company,
        stock,
        vendors,
        customers,
        receipts,
        delivery,
        internal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::SqliteStockStore;
    use crate::testing::RecordingUnitOfWork;

    #[test]
    fn test_seeds_empty_store() {
        let store = SqliteStockStore::in_memory().unwrap();
        let warehouse = ensure_default_warehouse(&store).unwrap().unwrap();

        assert_eq!(warehouse.company.name, "My Company");
        assert_eq!(warehouse.delivery.sequence_prefix, "WH/OUT/");
        assert_eq!(warehouse.delivery.default_location_id, Some(warehouse.stock.id));
        assert_eq!(
            warehouse.receipts.default_location_id,
            Some(warehouse.vendors.id)
        );
        assert_eq!(store.list_operation_types().unwrap().len(), 3);
        assert_eq!(store.list_locations().unwrap().len(), 3);
    }

    #[test]
    fn test_failed_seed_leaves_nothing_behind() {
        let store = SqliteStockStore::in_memory().unwrap();
        {
            let mut uow =
                RecordingUnitOfWork::new(store.begin().unwrap()).fail_on("create_operation_type");
            assert!(seed_warehouse(&mut uow).is_err());
        }
        assert!(store.list_companies().unwrap().is_empty());
        assert!(store.list_locations().unwrap().is_empty());

        assert!(ensure_default_warehouse(&store).unwrap().is_some());
        assert_eq!(store.list_companies().unwrap().len(), 1);
        assert_eq!(store.list_locations().unwrap().len(), 3);
    }

    #[test]
    fn test_is_idempotent() {
        let store = SqliteStockStore::in_memory().unwrap();
        assert!(ensure_default_warehouse(&store).unwrap().is_some());
        assert!(ensure_default_warehouse(&store).unwrap().is_none());
        assert_eq!(store.list_companies().unwrap().len(), 1);
    }
}
