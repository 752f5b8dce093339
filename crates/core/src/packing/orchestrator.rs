//! Create a picking, fill it, optionally lot and confirm it, and pack it.

use tracing::debug;

use crate::stock::{
    MoveLine, NewLot, NewMove, NewMoveLine, NewPicking, Picking, Product, UnitOfWork,
};

use super::{PackLine, PackedPicking, PackedPickingRequest, PackingError};

/// Header values for the picking of `request`.
pub fn picking_values(request: &PackedPickingRequest, created_by: &str) -> NewPicking {
    NewPicking {
        operation_type_id: request.operation_type_id,
        owner_id: request.owner_id,
        location_id: request.location_id,
        location_dest_id: request.location_dest_id,
        created_by: created_by.to_string(),
    }
}

/// One move with a single move-line carrying the line's done quantity.
pub fn move_values(picking: &Picking, product: &Product, line: &PackLine) -> NewMove {
    NewMove {
        picking_id: picking.id,
        product_id: product.id,
        name: product.name.clone(),
        location_id: picking.location_id,
        location_dest_id: picking.location_dest_id,
        lines: vec![NewMoveLine {
            product_id: product.id,
            quantity_done: line.quantity,
        }],
    }
}

/// One lot request per move-line; `move_lines[i]` was created from `lines[i]`.
pub fn lot_values(move_lines: &[MoveLine], lines: &[PackLine]) -> Vec<NewLot> {
    move_lines
        .iter()
        .zip(lines)
        .map(|(move_line, line)| NewLot {
            name: line.usable_serial().map(str::to_string),
            product_id: move_line.product_id,
            company_id: move_line.company_id,
        })
        .collect()
}

/// Run the whole packing sequence inside `uow`.
///
/// The caller owns the unit of work: it commits on success and drops it on
/// error, which discards everything written here.
pub fn create_packed_picking(
    uow: &mut dyn UnitOfWork,
    request: &PackedPickingRequest,
    created_by: &str,
) -> Result<PackedPicking, PackingError> {
    if request.lines.is_empty() {
        return Err(PackingError::EmptyLines);
    }

    let picking = uow.create_picking(picking_values(request, created_by))?;
    debug!("Created picking {} for {} line(s)", picking.name, request.lines.len());

    // Kept in creation order; lots pair with these by index.
    let mut move_lines = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let product = uow.product(line.product_id)?;
        let created = uow.create_move(move_values(&picking, &product, line))?;
        move_lines.extend(created.lines);
    }

    let mut lots = Vec::new();
    if request.create_lots {
        lots = uow.create_lots(&lot_values(&move_lines, &request.lines))?;
        for (move_line, lot) in move_lines.iter().zip(&lots) {
            uow.assign_lot(move_line.id, lot.id)?;
        }
        debug!("Assigned {} lot(s) in {}", lots.len(), picking.name);
    }

    if request.set_ready {
        let state = uow.confirm_picking(picking.id)?;
        debug!("Picking {} is now {}", picking.name, state);
    }

    let mut package = uow.put_in_pack(picking.id)?;
    if let Some(name) = request
        .package_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
    {
        package = uow.rename_package(package.id, name)?;
    }
    debug!("Packed {} into {}", picking.name, package.name);

    let picking = uow.picking(picking.id)?;
    Ok(PackedPicking {
        picking,
        package,
        lots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::{PickingState, StockError, StockStore};
    use crate::testing::fixtures;

    #[test]
    fn test_lot_values_pair_by_position() {
        let lines = vec![
            PackLine::new(10, 1.0).with_serial("SER1"),
            PackLine::new(11, 2.0).with_serial(""),
            PackLine::new(12, 3.0),
        ];
        let move_lines: Vec<MoveLine> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| fixtures::move_line(i as i64 + 1, line.product_id, 4))
            .collect();

        let lots = lot_values(&move_lines, &lines);
        assert_eq!(lots.len(), 3);
        assert_eq!(lots[0].name.as_deref(), Some("SER1"));
        assert_eq!(lots[1].name, None);
        assert_eq!(lots[2].name, None);
        assert!(lots.iter().zip(&lines).all(|(lot, line)| lot.product_id == line.product_id));
        assert!(lots.iter().all(|lot| lot.company_id == 4));
    }

    #[test]
    fn test_empty_lines_write_nothing() {
        let (store, warehouse) = fixtures::store_with_warehouse();
        let request = PackedPickingRequest::new(warehouse.delivery.id, vec![]);

        let mut uow = store.begin().unwrap();
        let result = create_packed_picking(&mut *uow, &request, "tester");
        assert!(matches!(result, Err(PackingError::EmptyLines)));
        uow.commit().unwrap();

        assert_eq!(store.count_pickings(&Default::default()).unwrap(), 0);
    }

    #[test]
    fn test_packs_every_line() {
        let (store, warehouse) = fixtures::store_with_warehouse();
        let products = fixtures::products(&store, 2);
        let request = PackedPickingRequest::new(
            warehouse.delivery.id,
            vec![
                PackLine::new(products[0].id, 1.0),
                PackLine::new(products[1].id, 2.5),
            ],
        );

        let mut uow = store.begin().unwrap();
        let packed = create_packed_picking(&mut *uow, &request, "tester").unwrap();
        uow.commit().unwrap();

        assert_eq!(packed.picking.state, PickingState::Draft);
        assert!(packed.lots.is_empty());
        let lines: Vec<&MoveLine> = packed.picking.move_lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].quantity_done, 2.5);
        assert!(lines
            .iter()
            .all(|l| l.result_package_id == Some(packed.package.id)));
        assert_eq!(packed.picking.moves[0].name, products[0].name);
    }

    #[test]
    fn test_unknown_product_propagates() {
        let (store, warehouse) = fixtures::store_with_warehouse();
        let request =
            PackedPickingRequest::new(warehouse.delivery.id, vec![PackLine::new(999, 1.0)]);

        let mut uow = store.begin().unwrap();
        let result = create_packed_picking(&mut *uow, &request, "tester");
        assert!(matches!(
            result,
            Err(PackingError::Stock(StockError::NotFound {
                entity: "product",
                ..
            }))
        ));
    }

    #[test]
    fn test_blank_package_name_keeps_sequence_name() {
        let (store, warehouse) = fixtures::store_with_warehouse();
        let products = fixtures::products(&store, 1);
        let request = PackedPickingRequest::new(
            warehouse.delivery.id,
            vec![PackLine::new(products[0].id, 1.0)],
        )
        .with_package_name("   ");

        let mut uow = store.begin().unwrap();
        let packed = create_packed_picking(&mut *uow, &request, "tester").unwrap();
        assert_eq!(packed.package.name, "PACK0000001");
    }
}
