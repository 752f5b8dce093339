pub mod audit;
pub mod config;
pub mod metrics;
pub mod packing;
pub mod stock;
pub mod testing;
pub mod wizard;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use config::{
    config_path, load_config, load_config_from_str, validate_config, AuthMethod, Config,
    ConfigError, SanitizedConfig, StockConfig,
};
pub use packing::{
    create_packed_picking, PackLine, PackedPicking, PackedPickingRequest, PackingError,
    PackingService,
};
pub use stock::{
    ensure_default_warehouse, Picking, PickingFilter, PickingState, SqliteStockStore, StockError,
    StockStore, UnitOfWork,
};
pub use wizard::{
    form_definition, PackProductsLine, PackProductsWizard, WindowAction, WizardContext,
    WizardOutcome,
};
