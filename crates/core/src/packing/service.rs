use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::metrics;
use crate::stock::{Picking, StockError, StockStore};

use super::{create_packed_picking, PackedPicking, PackedPickingRequest, PackingError};

/// Runs packed picking requests against a stock store, one unit of work each.
#[derive(Clone)]
pub struct PackingService {
    store: Arc<dyn StockStore>,
    audit: Option<AuditHandle>,
}

impl PackingService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store, audit: None }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn store(&self) -> &Arc<dyn StockStore> {
        &self.store
    }

    /// Create, fill and pack a picking, committing only if every step succeeds.
    pub fn create_packed_picking(
        &self,
        request: &PackedPickingRequest,
        requested_by: &str,
    ) -> Result<Picking, PackingError> {
        let timer = metrics::PACK_DURATION.start_timer();
        metrics::PACK_LINES.observe(request.lines.len() as f64);

        let result = self.run(request, requested_by);
        timer.observe_duration();

        match result {
            Ok(packed) => {
                self.record_success(request, requested_by, &packed);
                Ok(packed.picking)
            }
            Err(e) => {
                self.record_failure(request, requested_by, &e);
                Err(e)
            }
        }
    }

    fn run(
        &self,
        request: &PackedPickingRequest,
        requested_by: &str,
    ) -> Result<PackedPicking, PackingError> {
        if request.lines.is_empty() {
            return Err(PackingError::EmptyLines);
        }

        let mut uow = self.store.begin()?;
        let packed = create_packed_picking(&mut *uow, request, requested_by)?;
        uow.commit()?;
        Ok(packed)
    }

    fn record_success(
        &self,
        request: &PackedPickingRequest,
        requested_by: &str,
        packed: &PackedPicking,
    ) {
        metrics::PACKED_PICKINGS.with_label_values(&["success"]).inc();
        metrics::PACKAGES_CREATED.inc();
        metrics::LOTS_CREATED.inc_by(packed.lots.len() as u64);

        info!(
            "Packed picking {} ({} line(s), state {}) into {} for {}",
            packed.picking.name,
            request.lines.len(),
            packed.picking.state,
            packed.package.name,
            requested_by
        );

        if let Some(ref audit) = self.audit {
            audit.try_emit(AuditEvent::PickingPacked {
                picking_id: packed.picking.id,
                picking_name: packed.picking.name.clone(),
                operation_type_id: request.operation_type_id,
                requested_by: requested_by.to_string(),
                line_count: request.lines.len() as u32,
                lot_names: packed.lots.iter().map(|lot| lot.name.clone()).collect(),
                package_name: packed.package.name.clone(),
                state: packed.picking.state.to_string(),
            });
        }
    }

    fn record_failure(
        &self,
        request: &PackedPickingRequest,
        requested_by: &str,
        error: &PackingError,
    ) {
        let result = match error {
            PackingError::Stock(StockError::Database(_)) => "failed",
            _ => "rejected",
        };
        metrics::PACKED_PICKINGS.with_label_values(&[result]).inc();

        warn!(
            "Packed picking for operation type {} by {} rolled back: {}",
            request.operation_type_id, requested_by, error
        );

        if let Some(ref audit) = self.audit {
            audit.try_emit(AuditEvent::PackedPickingFailed {
                operation_type_id: request.operation_type_id,
                requested_by: requested_by.to_string(),
                line_count: request.lines.len() as u32,
                error: error.to_string(),
            });
        }
    }
}
