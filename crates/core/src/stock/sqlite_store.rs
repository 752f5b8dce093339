//! SQLite-backed stock store implementation.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::config::StockConfig;

use super::{
    Company, Location, Lot, Move, MoveLine, MoveState, NewCompany, NewLocation, NewLot, NewMove,
    NewOperationType, NewPartner, NewPicking, NewProduct, OperationType, Package, Partner, Picking,
    PickingFilter, PickingState, Product, Quant, StockError, StockStore, UnitOfWork,
};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const LOT_SEQUENCE: &str = "lot.serial";
const PACKAGE_SEQUENCE: &str = "package";

/// SQLite-backed stock store.
pub struct SqliteStockStore {
    conn: Mutex<Connection>,
    naming: StockConfig,
}

impl SqliteStockStore {
    /// Create a new SQLite stock store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StockError> {
        let conn = Connection::open(path).map_err(db)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite stock store (useful for testing).
    pub fn in_memory() -> Result<Self, StockError> {
        let conn = Connection::open_in_memory().map_err(db)?;
        Self::from_connection(conn)
    }

    /// Use custom sequence prefixes and paddings for generated names.
    pub fn with_naming(mut self, naming: StockConfig) -> Self {
        self.naming = naming;
        self
    }

    fn from_connection(conn: Connection) -> Result<Self, StockError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            naming: StockConfig::default(),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StockError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS partners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                default_code TEXT
            );

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                usage TEXT NOT NULL,
                company_id INTEGER REFERENCES companies(id)
            );

            CREATE TABLE IF NOT EXISTS operation_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                sequence_prefix TEXT NOT NULL,
                default_location_id INTEGER REFERENCES locations(id),
                default_location_dest_id INTEGER REFERENCES locations(id),
                company_id INTEGER NOT NULL REFERENCES companies(id)
            );

            CREATE TABLE IF NOT EXISTS pickings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                operation_type_id INTEGER NOT NULL REFERENCES operation_types(id),
                state TEXT NOT NULL,
                owner_id INTEGER REFERENCES partners(id),
                location_id INTEGER NOT NULL REFERENCES locations(id),
                location_dest_id INTEGER NOT NULL REFERENCES locations(id),
                company_id INTEGER NOT NULL REFERENCES companies(id),
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS moves (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                picking_id INTEGER NOT NULL REFERENCES pickings(id),
                product_id INTEGER NOT NULL REFERENCES products(id),
                name TEXT NOT NULL,
                quantity REAL NOT NULL,
                state TEXT NOT NULL,
                location_id INTEGER NOT NULL REFERENCES locations(id),
                location_dest_id INTEGER NOT NULL REFERENCES locations(id)
            );

            CREATE TABLE IF NOT EXISTS lots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                product_id INTEGER NOT NULL REFERENCES products(id),
                company_id INTEGER NOT NULL REFERENCES companies(id),
                created_at TEXT NOT NULL,
                UNIQUE (name, product_id, company_id)
            );

            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS move_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                move_id INTEGER NOT NULL REFERENCES moves(id),
                picking_id INTEGER NOT NULL REFERENCES pickings(id),
                product_id INTEGER NOT NULL REFERENCES products(id),
                quantity_done REAL NOT NULL,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                location_id INTEGER NOT NULL REFERENCES locations(id),
                location_dest_id INTEGER NOT NULL REFERENCES locations(id),
                owner_id INTEGER REFERENCES partners(id),
                lot_id INTEGER REFERENCES lots(id),
                result_package_id INTEGER REFERENCES packages(id)
            );

            CREATE TABLE IF NOT EXISTS quants (
                product_id INTEGER NOT NULL REFERENCES products(id),
                location_id INTEGER NOT NULL REFERENCES locations(id),
                quantity REAL NOT NULL,
                PRIMARY KEY (product_id, location_id)
            );

            CREATE TABLE IF NOT EXISTS sequences (
                code TEXT PRIMARY KEY,
                next_value INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pickings_state ON pickings(state);
            CREATE INDEX IF NOT EXISTS idx_pickings_operation_type ON pickings(operation_type_id);
            CREATE INDEX IF NOT EXISTS idx_moves_picking ON moves(picking_id);
            CREATE INDEX IF NOT EXISTS idx_move_lines_picking ON move_lines(picking_id);
            "#,
        )
        .map_err(db)?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StockError> {
        self.conn
            .lock()
            .map_err(|_| StockError::Database("stock connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &PickingFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(state) = filter.state {
            conditions.push("state = ?");
            params.push(Box::new(state.as_str()));
        }

        if let Some(operation_type_id) = filter.operation_type_id {
            conditions.push("operation_type_id = ?");
            params.push(Box::new(operation_type_id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl StockStore for SqliteStockStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StockError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(db)?;
        Ok(Box::new(SqliteUnitOfWork {
            conn,
            naming: &self.naming,
            finished: false,
        }))
    }

    fn create_company(&self, request: NewCompany) -> Result<Company, StockError> {
        insert_company(&*self.lock()?, request)
    }

    fn create_partner(&self, request: NewPartner) -> Result<Partner, StockError> {
        require_name("partner", &request.name)?;
        let conn = self.lock()?;
        conn.execute("INSERT INTO partners (name) VALUES (?)", params![request.name])
            .map_err(db)?;
        Ok(Partner {
            id: conn.last_insert_rowid(),
            name: request.name,
        })
    }

    fn create_product(&self, request: NewProduct) -> Result<Product, StockError> {
        require_name("product", &request.name)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO products (name, default_code) VALUES (?, ?)",
            params![request.name, request.default_code],
        )
        .map_err(db)?;
        Ok(Product {
            id: conn.last_insert_rowid(),
            name: request.name,
            default_code: request.default_code,
        })
    }

    fn create_location(&self, request: NewLocation) -> Result<Location, StockError> {
        insert_location(&*self.lock()?, request)
    }

    fn create_operation_type(
        &self,
        request: NewOperationType,
    ) -> Result<OperationType, StockError> {
        insert_operation_type(&*self.lock()?, request)
    }

    fn list_companies(&self) -> Result<Vec<Company>, StockError> {
        let conn = self.lock()?;
        query_all(&conn, "SELECT id, name FROM companies ORDER BY id", |row| {
            Ok(Company {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
    }

    fn list_partners(&self) -> Result<Vec<Partner>, StockError> {
        let conn = self.lock()?;
        query_all(&conn, "SELECT id, name FROM partners ORDER BY id", row_to_partner)
    }

    fn list_products(&self) -> Result<Vec<Product>, StockError> {
        let conn = self.lock()?;
        query_all(
            &conn,
            "SELECT id, name, default_code FROM products ORDER BY id",
            row_to_product,
        )
    }

    fn list_locations(&self) -> Result<Vec<Location>, StockError> {
        let conn = self.lock()?;
        query_all(
            &conn,
            "SELECT id, name, usage, company_id FROM locations ORDER BY id",
            row_to_location,
        )
    }

    fn list_operation_types(&self) -> Result<Vec<OperationType>, StockError> {
        let conn = self.lock()?;
        query_all(
            &conn,
            "SELECT id, name, kind, sequence_prefix, default_location_id, default_location_dest_id, company_id FROM operation_types ORDER BY id",
            row_to_operation_type,
        )
    }

    fn set_quant(
        &self,
        product_id: i64,
        location_id: i64,
        quantity: f64,
    ) -> Result<Quant, StockError> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(StockError::Validation(format!(
                "on-hand quantity must be a non-negative number, got {}",
                quantity
            )));
        }

        let conn = self.lock()?;
        fetch_product(&conn, product_id)?;
        fetch_location(&conn, location_id)?;

        conn.execute(
            "INSERT INTO quants (product_id, location_id, quantity) VALUES (?, ?, ?)
             ON CONFLICT(product_id, location_id) DO UPDATE SET quantity = excluded.quantity",
            params![product_id, location_id, quantity],
        )
        .map_err(db)?;

        Ok(Quant {
            product_id,
            location_id,
            quantity,
            reserved_quantity: reserved(&conn, product_id, location_id, None)?,
        })
    }

    fn quant(&self, product_id: i64, location_id: i64) -> Result<Quant, StockError> {
        let conn = self.lock()?;
        Ok(Quant {
            product_id,
            location_id,
            quantity: on_hand(&conn, product_id, location_id)?,
            reserved_quantity: reserved(&conn, product_id, location_id, None)?,
        })
    }

    fn get_picking(&self, id: i64) -> Result<Option<Picking>, StockError> {
        let conn = self.lock()?;
        load_picking(&conn, id)
    }

    fn list_pickings(&self, filter: &PickingFilter) -> Result<Vec<Picking>, StockError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT id FROM pickings {} ORDER BY id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            all_params.iter().map(|p| p.as_ref()).collect();

        let ids: Vec<i64> = {
            let mut stmt = conn.prepare(&sql).map_err(db)?;
            let rows = stmt
                .query_map(param_refs.as_slice(), |row| row.get(0))
                .map_err(db)?;
            rows.collect::<Result<_, _>>().map_err(db)?
        };

        let mut pickings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(picking) = load_picking(&conn, id)? {
                pickings.push(picking);
            }
        }
        Ok(pickings)
    }

    fn count_pickings(&self, filter: &PickingFilter) -> Result<i64, StockError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM pickings {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db)
    }
}

// ============================================================================
// Unit of Work
// ============================================================================

/// A unit of work holding the store's connection and an open transaction.
pub struct SqliteUnitOfWork<'a> {
    conn: MutexGuard<'a, Connection>,
    naming: &'a StockConfig,
    finished: bool,
}

impl SqliteUnitOfWork<'_> {
    fn picking_state(&self, picking_id: i64) -> Result<PickingState, StockError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM pickings WHERE id = ?",
                params![picking_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db)?;

        let raw = raw.ok_or_else(|| StockError::not_found("picking", picking_id))?;
        PickingState::from_str(&raw).map_err(StockError::Database)
    }

    fn ensure_open(&self, picking_id: i64, operation: &str) -> Result<PickingState, StockError> {
        let state = self.picking_state(picking_id)?;
        if state.is_terminal() {
            return Err(StockError::InvalidState {
                picking_id,
                state: state.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(state)
    }

    fn touch_picking(&self, picking_id: i64) -> Result<(), StockError> {
        self.conn
            .execute(
                "UPDATE pickings SET updated_at = ? WHERE id = ?",
                params![Utc::now().to_rfc3339(), picking_id],
            )
            .map_err(db)?;
        Ok(())
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn create_company(&mut self, request: NewCompany) -> Result<Company, StockError> {
        insert_company(&self.conn, request)
    }

    fn create_location(&mut self, request: NewLocation) -> Result<Location, StockError> {
        insert_location(&self.conn, request)
    }

    fn create_operation_type(
        &mut self,
        request: NewOperationType,
    ) -> Result<OperationType, StockError> {
        insert_operation_type(&self.conn, request)
    }

    fn product(&mut self, id: i64) -> Result<Product, StockError> {
        fetch_product(&self.conn, id)
    }

    fn create_picking(&mut self, request: NewPicking) -> Result<Picking, StockError> {
        let operation_type = fetch_operation_type(&self.conn, request.operation_type_id)?;

        let location_id = request
            .location_id
            .or(operation_type.default_location_id)
            .ok_or_else(|| {
                StockError::Validation(format!(
                    "a source location is required: operation type '{}' has no default",
                    operation_type.name
                ))
            })?;
        let location_dest_id = request
            .location_dest_id
            .or(operation_type.default_location_dest_id)
            .ok_or_else(|| {
                StockError::Validation(format!(
                    "a destination location is required: operation type '{}' has no default",
                    operation_type.name
                ))
            })?;

        fetch_location(&self.conn, location_id)?;
        fetch_location(&self.conn, location_dest_id)?;
        if let Some(owner_id) = request.owner_id {
            fetch_partner(&self.conn, owner_id)?;
        }

        let number = next_sequence(
            &self.conn,
            &format!("picking.type.{}", operation_type.id),
        )?;
        let name = format_sequence(
            &operation_type.sequence_prefix,
            number,
            self.naming.picking_padding,
        );
        let now = Utc::now();

        self.conn
            .execute(
                "INSERT INTO pickings (name, operation_type_id, state, owner_id, location_id, location_dest_id, company_id, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    name,
                    operation_type.id,
                    PickingState::Draft.as_str(),
                    request.owner_id,
                    location_id,
                    location_dest_id,
                    operation_type.company_id,
                    request.created_by,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(db)?;

        let id = self.conn.last_insert_rowid();
        debug!("Created picking {} ({})", name, id);

        Ok(Picking {
            id,
            name,
            operation_type_id: operation_type.id,
            state: PickingState::Draft,
            owner_id: request.owner_id,
            location_id,
            location_dest_id,
            company_id: operation_type.company_id,
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
            moves: Vec::new(),
        })
    }

    fn create_move(&mut self, request: NewMove) -> Result<Move, StockError> {
        self.ensure_open(request.picking_id, "add moves to")?;
        fetch_product(&self.conn, request.product_id)?;
        fetch_location(&self.conn, request.location_id)?;
        fetch_location(&self.conn, request.location_dest_id)?;

        if request.lines.is_empty() {
            return Err(StockError::Validation(
                "a move needs at least one move-line".to_string(),
            ));
        }
        for line in &request.lines {
            if line.product_id != request.product_id {
                return Err(StockError::Validation(format!(
                    "move-line product {} does not match move product {}",
                    line.product_id, request.product_id
                )));
            }
            if !line.quantity_done.is_finite() || line.quantity_done < 0.0 {
                return Err(StockError::Validation(format!(
                    "done quantity must be a non-negative number, got {}",
                    line.quantity_done
                )));
            }
        }

        let (company_id, owner_id): (i64, Option<i64>) = self
            .conn
            .query_row(
                "SELECT company_id, owner_id FROM pickings WHERE id = ?",
                params![request.picking_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db)?;

        let demand: f64 = request.lines.iter().map(|l| l.quantity_done).sum();

        self.conn
            .execute(
                "INSERT INTO moves (picking_id, product_id, name, quantity, state, location_id, location_dest_id) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    request.picking_id,
                    request.product_id,
                    request.name,
                    demand,
                    MoveState::Draft.as_str(),
                    request.location_id,
                    request.location_dest_id,
                ],
            )
            .map_err(db)?;
        let move_id = self.conn.last_insert_rowid();

        let mut lines = Vec::with_capacity(request.lines.len());
        for line in request.lines {
            self.conn
                .execute(
                    "INSERT INTO move_lines (move_id, picking_id, product_id, quantity_done, company_id, location_id, location_dest_id, owner_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        move_id,
                        request.picking_id,
                        line.product_id,
                        line.quantity_done,
                        company_id,
                        request.location_id,
                        request.location_dest_id,
                        owner_id,
                    ],
                )
                .map_err(db)?;

            lines.push(MoveLine {
                id: self.conn.last_insert_rowid(),
                move_id,
                picking_id: request.picking_id,
                product_id: line.product_id,
                quantity_done: line.quantity_done,
                company_id,
                location_id: request.location_id,
                location_dest_id: request.location_dest_id,
                owner_id,
                lot_id: None,
                lot_name: None,
                result_package_id: None,
                result_package_name: None,
            });
        }

        Ok(Move {
            id: move_id,
            picking_id: request.picking_id,
            product_id: request.product_id,
            name: request.name,
            quantity: demand,
            state: MoveState::Draft,
            location_id: request.location_id,
            location_dest_id: request.location_dest_id,
            lines,
        })
    }

    fn create_lots(&mut self, requests: &[NewLot]) -> Result<Vec<Lot>, StockError> {
        let mut lots = Vec::with_capacity(requests.len());

        for request in requests {
            fetch_product(&self.conn, request.product_id)?;
            fetch_company(&self.conn, request.company_id)?;

            let name = match &request.name {
                Some(name) if name.trim().is_empty() => {
                    return Err(StockError::Validation(
                        "lot name cannot be empty".to_string(),
                    ));
                }
                Some(name) => name.clone(),
                None => {
                    let number = next_sequence(&self.conn, LOT_SEQUENCE)?;
                    format_sequence("", number, self.naming.lot_padding)
                }
            };

            let exists: bool = self
                .conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM lots WHERE name = ? AND product_id = ? AND company_id = ?)",
                    params![name, request.product_id, request.company_id],
                    |row| row.get(0),
                )
                .map_err(db)?;
            if exists {
                return Err(StockError::Conflict(format!(
                    "lot '{}' already exists for product {} in company {}",
                    name, request.product_id, request.company_id
                )));
            }

            let now = Utc::now();
            self.conn
                .execute(
                    "INSERT INTO lots (name, product_id, company_id, created_at) VALUES (?, ?, ?, ?)",
                    params![name, request.product_id, request.company_id, now.to_rfc3339()],
                )
                .map_err(db)?;

            lots.push(Lot {
                id: self.conn.last_insert_rowid(),
                name,
                product_id: request.product_id,
                company_id: request.company_id,
                created_at: now,
            });
        }

        Ok(lots)
    }

    fn assign_lot(&mut self, move_line_id: i64, lot_id: i64) -> Result<(), StockError> {
        let line_product: Option<i64> = self
            .conn
            .query_row(
                "SELECT product_id FROM move_lines WHERE id = ?",
                params![move_line_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db)?;
        let line_product = line_product.ok_or_else(|| StockError::not_found("move-line", move_line_id))?;

        let lot_product: Option<i64> = self
            .conn
            .query_row(
                "SELECT product_id FROM lots WHERE id = ?",
                params![lot_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db)?;
        let lot_product = lot_product.ok_or_else(|| StockError::not_found("lot", lot_id))?;

        if line_product != lot_product {
            return Err(StockError::Validation(format!(
                "lot {} belongs to product {}, move-line {} moves product {}",
                lot_id, lot_product, move_line_id, line_product
            )));
        }

        self.conn
            .execute(
                "UPDATE move_lines SET lot_id = ? WHERE id = ?",
                params![lot_id, move_line_id],
            )
            .map_err(db)?;
        Ok(())
    }

    fn confirm_picking(&mut self, picking_id: i64) -> Result<PickingState, StockError> {
        self.ensure_open(picking_id, "confirm")?;

        let moves: Vec<(i64, i64, f64, i64, String)> = {
            let mut stmt = self
                .conn
                .prepare(
                    "SELECT id, product_id, quantity, location_id, state FROM moves WHERE picking_id = ? AND state NOT IN ('done', 'cancelled') ORDER BY id",
                )
                .map_err(db)?;
            let rows = stmt
                .query_map(params![picking_id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })
                .map_err(db)?;
            rows.collect::<Result<_, _>>().map_err(db)?
        };

        if moves.is_empty() {
            return Err(StockError::Validation(format!(
                "picking {} has no moves to confirm",
                picking_id
            )));
        }

        // Demand is reserved per product and source location across the whole picking.
        let mut demand: HashMap<(i64, i64), f64> = HashMap::new();
        for (_, product_id, quantity, location_id, _) in &moves {
            *demand.entry((*product_id, *location_id)).or_default() += quantity;
        }

        let mut all_assigned = true;
        for (move_id, product_id, _, location_id, state) in &moves {
            let state = MoveState::from_str(state).map_err(StockError::Database)?;
            let new_state = if state == MoveState::Assigned {
                MoveState::Assigned
            } else {
                let source = fetch_location(&self.conn, *location_id)?;
                let required = demand[&(*product_id, *location_id)];
                if !source.usage.tracks_stock()
                    || available(&self.conn, *product_id, *location_id, picking_id)? >= required
                {
                    MoveState::Assigned
                } else {
                    MoveState::Confirmed
                }
            };

            if new_state != MoveState::Assigned {
                all_assigned = false;
            }

            self.conn
                .execute(
                    "UPDATE moves SET state = ? WHERE id = ?",
                    params![new_state.as_str(), move_id],
                )
                .map_err(db)?;
        }

        let picking_state = if all_assigned {
            PickingState::Assigned
        } else {
            PickingState::Confirmed
        };

        self.conn
            .execute(
                "UPDATE pickings SET state = ?, updated_at = ? WHERE id = ?",
                params![picking_state.as_str(), Utc::now().to_rfc3339(), picking_id],
            )
            .map_err(db)?;

        debug!("Confirmed picking {}: {}", picking_id, picking_state);
        Ok(picking_state)
    }

    fn put_in_pack(&mut self, picking_id: i64) -> Result<Package, StockError> {
        self.ensure_open(picking_id, "put in pack")?;

        let line_ids: Vec<i64> = {
            let mut stmt = self
                .conn
                .prepare(
                    "SELECT id FROM move_lines WHERE picking_id = ? AND quantity_done > 0 AND result_package_id IS NULL ORDER BY id",
                )
                .map_err(db)?;
            let rows = stmt
                .query_map(params![picking_id], |row| row.get(0))
                .map_err(db)?;
            rows.collect::<Result<_, _>>().map_err(db)?
        };

        if line_ids.is_empty() {
            return Err(StockError::Validation(format!(
                "nothing to pack in picking {}: add done quantities first",
                picking_id
            )));
        }

        let number = next_sequence(&self.conn, PACKAGE_SEQUENCE)?;
        let name = format_sequence(
            &self.naming.package_prefix,
            number,
            self.naming.package_padding,
        );
        let now = Utc::now();

        self.conn
            .execute(
                "INSERT INTO packages (name, created_at) VALUES (?, ?)",
                params![name, now.to_rfc3339()],
            )
            .map_err(db)?;
        let package_id = self.conn.last_insert_rowid();

        for line_id in &line_ids {
            self.conn
                .execute(
                    "UPDATE move_lines SET result_package_id = ? WHERE id = ?",
                    params![package_id, line_id],
                )
                .map_err(db)?;
        }
        self.touch_picking(picking_id)?;

        debug!(
            "Packed {} move-line(s) of picking {} into {}",
            line_ids.len(),
            picking_id,
            name
        );

        Ok(Package {
            id: package_id,
            name,
            created_at: now,
        })
    }

    fn rename_package(&mut self, package_id: i64, name: &str) -> Result<Package, StockError> {
        require_name("package", name)?;

        let changed = self
            .conn
            .execute(
                "UPDATE packages SET name = ? WHERE id = ?",
                params![name, package_id],
            )
            .map_err(db)?;
        if changed == 0 {
            return Err(StockError::not_found("package", package_id));
        }

        self.conn
            .query_row(
                "SELECT id, name, created_at FROM packages WHERE id = ?",
                params![package_id],
                |row| {
                    Ok(Package {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: parse_timestamp(&row.get::<_, String>(2)?),
                    })
                },
            )
            .map_err(db)
    }

    fn picking(&mut self, picking_id: i64) -> Result<Picking, StockError> {
        load_picking(&self.conn, picking_id)?
            .ok_or_else(|| StockError::not_found("picking", picking_id))
    }

    fn commit(mut self: Box<Self>) -> Result<(), StockError> {
        self.conn.execute_batch("COMMIT").map_err(db)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Rolled back uncommitted stock unit of work"),
            Err(e) => warn!("Failed to roll back stock unit of work: {}", e),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn db(e: rusqlite::Error) -> StockError {
    StockError::Database(e.to_string())
}

fn require_name(entity: &str, name: &str) -> Result<(), StockError> {
    if name.trim().is_empty() {
        return Err(StockError::Validation(format!(
            "{} name cannot be empty",
            entity
        )));
    }
    Ok(())
}

/// Take the next value of a named sequence, starting at 1.
fn insert_company(conn: &Connection, request: NewCompany) -> Result<Company, StockError> {
    require_name("company", &request.name)?;
    conn.execute(
        "INSERT INTO companies (name) VALUES (?)",
        params![request.name],
    )
    .map_err(db)?;
    Ok(Company {
        id: conn.last_insert_rowid(),
        name: request.name,
    })
}

fn insert_location(conn: &Connection, request: NewLocation) -> Result<Location, StockError> {
    require_name("location", &request.name)?;
    if let Some(company_id) = request.company_id {
        fetch_company(conn, company_id)?;
    }
    conn.execute(
        "INSERT INTO locations (name, usage, company_id) VALUES (?, ?, ?)",
        params![request.name, request.usage.as_str(), request.company_id],
    )
    .map_err(db)?;
    Ok(Location {
        id: conn.last_insert_rowid(),
        name: request.name,
        usage: request.usage,
        company_id: request.company_id,
    })
}

fn insert_operation_type(
    conn: &Connection,
    request: NewOperationType,
) -> Result<OperationType, StockError> {
    require_name("operation type", &request.name)?;
    fetch_company(conn, request.company_id)?;
    for location_id in [request.default_location_id, request.default_location_dest_id]
        .into_iter()
        .flatten()
    {
        fetch_location(conn, location_id)?;
    }

    conn.execute(
        "INSERT INTO operation_types (name, kind, sequence_prefix, default_location_id, default_location_dest_id, company_id) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            request.name,
            request.kind.as_str(),
            request.sequence_prefix,
            request.default_location_id,
            request.default_location_dest_id,
            request.company_id,
        ],
    )
    .map_err(db)?;

    Ok(OperationType {
        id: conn.last_insert_rowid(),
        name: request.name,
        kind: request.kind,
        sequence_prefix: request.sequence_prefix,
        default_location_id: request.default_location_id,
        default_location_dest_id: request.default_location_dest_id,
        company_id: request.company_id,
    })
}

fn next_sequence(conn: &Connection, code: &str) -> Result<i64, StockError> {
    conn.query_row(
        "INSERT INTO sequences (code, next_value) VALUES (?, 2)
         ON CONFLICT(code) DO UPDATE SET next_value = next_value + 1
         RETURNING next_value - 1",
        params![code],
        |row| row.get(0),
    )
    .map_err(db)
}

fn format_sequence(prefix: &str, number: i64, padding: usize) -> String {
    format!("{}{:0width$}", prefix, number, width = padding)
}

fn on_hand(conn: &Connection, product_id: i64, location_id: i64) -> Result<f64, StockError> {
    let quantity: Option<f64> = conn
        .query_row(
            "SELECT quantity FROM quants WHERE product_id = ? AND location_id = ?",
            params![product_id, location_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db)?;
    Ok(quantity.unwrap_or(0.0))
}

/// Quantity held by assigned moves of open pickings, optionally ignoring one picking.
fn reserved(
    conn: &Connection,
    product_id: i64,
    location_id: i64,
    except_picking: Option<i64>,
) -> Result<f64, StockError> {
    conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0.0) FROM moves
         WHERE product_id = ? AND location_id = ? AND state = 'assigned' AND picking_id != ?",
        params![product_id, location_id, except_picking.unwrap_or(0)],
        |row| row.get(0),
    )
    .map_err(db)
}

/// On-hand quantity not yet reserved by another picking.
fn available(
    conn: &Connection,
    product_id: i64,
    location_id: i64,
    picking_id: i64,
) -> Result<f64, StockError> {
    Ok(on_hand(conn, product_id, location_id)?
        - reserved(conn, product_id, location_id, Some(picking_id))?)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn query_all<T, F>(conn: &Connection, sql: &str, map: F) -> Result<Vec<T>, StockError>
where
    F: FnMut(&Row) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(db)?;
    let rows = stmt.query_map([], map).map_err(db)?;
    rows.collect::<Result<_, _>>().map_err(db)
}

fn row_to_partner(row: &Row) -> rusqlite::Result<Partner> {
    Ok(Partner {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn row_to_product(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        default_code: row.get(2)?,
    })
}

fn row_to_location(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        usage: parse_column(row, 2)?,
        company_id: row.get(3)?,
    })
}

fn row_to_operation_type(row: &Row) -> rusqlite::Result<OperationType> {
    Ok(OperationType {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: parse_column(row, 2)?,
        sequence_prefix: row.get(3)?,
        default_location_id: row.get(4)?,
        default_location_dest_id: row.get(5)?,
        company_id: row.get(6)?,
    })
}

fn fetch_one<T, F>(
    conn: &Connection,
    entity: &'static str,
    sql: &str,
    id: i64,
    map: F,
) -> Result<T, StockError>
where
    F: FnOnce(&Row) -> rusqlite::Result<T>,
{
    conn.query_row(sql, params![id], map)
        .optional()
        .map_err(db)?
        .ok_or_else(|| StockError::not_found(entity, id))
}

fn fetch_company(conn: &Connection, id: i64) -> Result<Company, StockError> {
    fetch_one(conn, "company", "SELECT id, name FROM companies WHERE id = ?", id, |row| {
        Ok(Company {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })
}

fn fetch_partner(conn: &Connection, id: i64) -> Result<Partner, StockError> {
    fetch_one(
        conn,
        "partner",
        "SELECT id, name FROM partners WHERE id = ?",
        id,
        row_to_partner,
    )
}

fn fetch_product(conn: &Connection, id: i64) -> Result<Product, StockError> {
    fetch_one(
        conn,
        "product",
        "SELECT id, name, default_code FROM products WHERE id = ?",
        id,
        row_to_product,
    )
}

fn fetch_location(conn: &Connection, id: i64) -> Result<Location, StockError> {
    fetch_one(
        conn,
        "location",
        "SELECT id, name, usage, company_id FROM locations WHERE id = ?",
        id,
        row_to_location,
    )
}

fn fetch_operation_type(conn: &Connection, id: i64) -> Result<OperationType, StockError> {
    fetch_one(
        conn,
        "operation type",
        "SELECT id, name, kind, sequence_prefix, default_location_id, default_location_dest_id, company_id FROM operation_types WHERE id = ?",
        id,
        row_to_operation_type,
    )
}

/// Load a picking with its moves and move-lines, in creation order.
fn load_picking(conn: &Connection, id: i64) -> Result<Option<Picking>, StockError> {
    let header = conn
        .query_row(
            "SELECT id, name, operation_type_id, state, owner_id, location_id, location_dest_id, company_id, created_by, created_at, updated_at FROM pickings WHERE id = ?",
            params![id],
            |row| {
                Ok(Picking {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    operation_type_id: row.get(2)?,
                    state: parse_column(row, 3)?,
                    owner_id: row.get(4)?,
                    location_id: row.get(5)?,
                    location_dest_id: row.get(6)?,
                    company_id: row.get(7)?,
                    created_by: row.get(8)?,
                    created_at: parse_timestamp(&row.get::<_, String>(9)?),
                    updated_at: parse_timestamp(&row.get::<_, String>(10)?),
                    moves: Vec::new(),
                })
            },
        )
        .optional()
        .map_err(db)?;

    let Some(mut picking) = header else {
        return Ok(None);
    };

    let mut moves: Vec<Move> = {
        let mut stmt = conn
            .prepare(
                "SELECT id, picking_id, product_id, name, quantity, state, location_id, location_dest_id FROM moves WHERE picking_id = ? ORDER BY id",
            )
            .map_err(db)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(Move {
                    id: row.get(0)?,
                    picking_id: row.get(1)?,
                    product_id: row.get(2)?,
                    name: row.get(3)?,
                    quantity: row.get(4)?,
                    state: parse_column(row, 5)?,
                    location_id: row.get(6)?,
                    location_dest_id: row.get(7)?,
                    lines: Vec::new(),
                })
            })
            .map_err(db)?;
        rows.collect::<Result<_, _>>().map_err(db)?
    };

    let lines: Vec<MoveLine> = {
        let mut stmt = conn
            .prepare(
                "SELECT ml.id, ml.move_id, ml.picking_id, ml.product_id, ml.quantity_done, ml.company_id, ml.location_id, ml.location_dest_id, ml.owner_id, ml.lot_id, l.name, ml.result_package_id, p.name
                 FROM move_lines ml
                 LEFT JOIN lots l ON l.id = ml.lot_id
                 LEFT JOIN packages p ON p.id = ml.result_package_id
                 WHERE ml.picking_id = ?
                 ORDER BY ml.id",
            )
            .map_err(db)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(MoveLine {
                    id: row.get(0)?,
                    move_id: row.get(1)?,
                    picking_id: row.get(2)?,
                    product_id: row.get(3)?,
                    quantity_done: row.get(4)?,
                    company_id: row.get(5)?,
                    location_id: row.get(6)?,
                    location_dest_id: row.get(7)?,
                    owner_id: row.get(8)?,
                    lot_id: row.get(9)?,
                    lot_name: row.get(10)?,
                    result_package_id: row.get(11)?,
                    result_package_name: row.get(12)?,
                })
            })
            .map_err(db)?;
        rows.collect::<Result<_, _>>().map_err(db)?
    };

    let index: HashMap<i64, usize> = moves.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
    for line in lines {
        if let Some(&i) = index.get(&line.move_id) {
            moves[i].lines.push(line);
        }
    }

    picking.moves = moves;
    Ok(Some(picking))
}
